use std::fmt;

use super::keys::KeyCombo;

/// What a keystroke-injection primitive is asked to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPayload<'a> {
    Text(&'a str),
    Combo(&'a KeyCombo),
}

impl fmt::Display for KeyPayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Combo(combo) => write!(f, "{combo}"),
        }
    }
}

/// Host-platform facilities the runner drives.
///
/// Both calls are fire-and-forget: `true` only means the platform call itself
/// did not fail, not that the target application processed the input.
pub trait InputPrimitives {
    /// Activate a window whose title matches `title_pattern`.
    fn focus_window(&mut self, title_pattern: &str) -> bool;

    /// Inject `payload` into whichever window holds focus.
    fn send(&mut self, payload: &KeyPayload<'_>) -> bool;
}

impl<T: InputPrimitives + ?Sized> InputPrimitives for &mut T {
    fn focus_window(&mut self, title_pattern: &str) -> bool {
        (**self).focus_window(title_pattern)
    }

    fn send(&mut self, payload: &KeyPayload<'_>) -> bool {
        (**self).send(payload)
    }
}

/// Adapts a `focus_fn` / `key_send_fn` closure pair to [`InputPrimitives`].
pub struct FnPrimitives<F, K> {
    focus_fn: F,
    key_send_fn: K,
}

impl<F, K> FnPrimitives<F, K>
where
    F: FnMut(&str) -> bool,
    K: FnMut(&KeyPayload<'_>) -> bool,
{
    pub fn new(focus_fn: F, key_send_fn: K) -> Self {
        Self {
            focus_fn,
            key_send_fn,
        }
    }
}

impl<F, K> InputPrimitives for FnPrimitives<F, K>
where
    F: FnMut(&str) -> bool,
    K: FnMut(&KeyPayload<'_>) -> bool,
{
    fn focus_window(&mut self, title_pattern: &str) -> bool {
        (self.focus_fn)(title_pattern)
    }

    fn send(&mut self, payload: &KeyPayload<'_>) -> bool {
        (self.key_send_fn)(payload)
    }
}
