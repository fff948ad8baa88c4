use anyhow::{Context, Result};
use enigo::Keyboard as _;
use enigo::{Direction, Enigo, Key, Settings};
use tracing::{debug, info, trace, warn};

use crate::driver::{InputPrimitives, KeyCombo, KeyPayload, Modifiers, NamedKey};
use crate::utils::window;

/// Enigo-backed input primitives with optional dry-run mode.
/// In dry-run mode, primitives are only logged, always succeed, and no real
/// input is simulated.
pub struct ActionExecutor {
    dry_run: bool,
    enigo: Option<Enigo>,
}

impl ActionExecutor {
    /// Create a new executor.
    /// - dry_run: when true, only logs instead of simulating real input.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            enigo: None,
        }
    }

    /// Returns whether the executor is currently in dry-run mode.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Enable or disable dry-run mode dynamically.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Type literal text (unicode) into the focused window.
    pub fn type_text(&mut self, text: &str) -> Result<()> {
        if self.dry_run {
            info!(target: "keypilot::actions", %text, "DRY-RUN type_text");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "keypilot::actions", %text, "type_text");
        enigo
            .text(text)
            .with_context(|| format!("Failed to type {text:?}"))?;
        Ok(())
    }

    /// Press the combo's modifiers, click its key `repeat` times, then release
    /// the modifiers in reverse order. Modifiers are released even when a
    /// click fails.
    pub fn key_combo(&mut self, combo: &KeyCombo) -> Result<()> {
        if self.dry_run {
            info!(target: "keypilot::actions", %combo, "DRY-RUN key_combo");
            return Ok(());
        }
        let modifiers = modifier_keys(combo.modifiers);
        let key = map_key(combo.key);
        let enigo = self.ensure_enigo()?;
        trace!(target: "keypilot::actions", %combo, "key_combo");

        for (held, modifier) in modifiers.iter().enumerate() {
            if let Err(e) = enigo.key(*modifier, Direction::Press) {
                release(enigo, &modifiers[..held]);
                return Err(e).with_context(|| format!("Failed to press modifier for {combo}"));
            }
        }
        let mut clicked = Ok(());
        for _ in 0..combo.repeat {
            if let Err(e) = enigo.key(key, Direction::Click) {
                clicked = Err(e);
                break;
            }
        }
        release(enigo, &modifiers);
        clicked.with_context(|| format!("Failed to send {combo}"))
    }

    /// Try to focus a window with title containing the substring.
    /// Returns true if a window was focused (always true in dry-run mode).
    pub fn focus_window(&self, title_contains: &str) -> bool {
        if self.dry_run {
            info!(target: "keypilot::actions", %title_contains, "DRY-RUN focus_window");
            return true;
        }
        trace!(target: "keypilot::actions", %title_contains, "focus_window");
        let focused = window::focus_window(title_contains);
        if focused {
            debug!(target: "keypilot::actions", %title_contains, "focus_window: focused=true");
        } else {
            warn!(target: "keypilot::actions", %title_contains, "focus_window: no match");
        }
        focused
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            trace!(target: "keypilot::actions", "Initializing Enigo");
            self.enigo =
                Some(Enigo::new(&Settings::default()).context("Failed to initialize Enigo")?);
        }
        self.enigo
            .as_mut()
            .context("Enigo connection unavailable")
    }
}

impl InputPrimitives for ActionExecutor {
    fn focus_window(&mut self, title_pattern: &str) -> bool {
        ActionExecutor::focus_window(self, title_pattern)
    }

    fn send(&mut self, payload: &KeyPayload<'_>) -> bool {
        let sent = match payload {
            KeyPayload::Text(text) => self.type_text(text),
            KeyPayload::Combo(combo) => self.key_combo(combo),
        };
        match sent {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "keypilot::actions", %payload, error = %format!("{err:#}"), "Injection failed");
                false
            }
        }
    }
}

fn release(enigo: &mut Enigo, modifiers: &[Key]) {
    for modifier in modifiers.iter().rev() {
        if let Err(e) = enigo.key(*modifier, Direction::Release) {
            warn!(target: "keypilot::actions", error = %e, "Failed to release modifier");
        }
    }
}

fn modifier_keys(modifiers: Modifiers) -> Vec<Key> {
    let mut keys = Vec::with_capacity(3);
    if modifiers.ctrl {
        keys.push(Key::Control);
    }
    if modifiers.shift {
        keys.push(Key::Shift);
    }
    if modifiers.alt {
        keys.push(Key::Alt);
    }
    keys
}

fn map_key(key: NamedKey) -> Key {
    match key {
        NamedKey::Enter => Key::Return,
        NamedKey::Tab => Key::Tab,
        NamedKey::Delete => Key::Delete,
        NamedKey::Backspace => Key::Backspace,
        NamedKey::Escape => Key::Escape,
        NamedKey::Home => Key::Home,
        NamedKey::End => Key::End,
        NamedKey::PageUp => Key::PageUp,
        NamedKey::PageDown => Key::PageDown,
        NamedKey::Space => Key::Space,
        NamedKey::Up => Key::UpArrow,
        NamedKey::Down => Key::DownArrow,
        NamedKey::Left => Key::LeftArrow,
        NamedKey::Right => Key::RightArrow,
        NamedKey::F(n) => match n {
            1 => Key::F1,
            2 => Key::F2,
            3 => Key::F3,
            4 => Key::F4,
            5 => Key::F5,
            6 => Key::F6,
            7 => Key::F7,
            8 => Key::F8,
            9 => Key::F9,
            10 => Key::F10,
            11 => Key::F11,
            _ => Key::F12,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_primitives_always_succeed() {
        let mut exec = ActionExecutor::new(true);
        assert!(InputPrimitives::focus_window(&mut exec, "Fourth Shift"));
        assert!(exec.send(&KeyPayload::Text("ABC")));
        let combo = KeyCombo::parse("CTRL+HOME").unwrap();
        assert!(exec.send(&KeyPayload::Combo(&combo)));
    }

    #[test]
    fn modifiers_are_pressed_in_ctrl_shift_alt_order() {
        let combo = KeyCombo::parse("ALT+CTRL+SHIFT+END").unwrap();
        assert_eq!(
            modifier_keys(combo.modifiers),
            vec![Key::Control, Key::Shift, Key::Alt]
        );
        assert!(modifier_keys(Modifiers::default()).is_empty());
    }

    #[test]
    fn maps_registry_keys() {
        assert_eq!(map_key(NamedKey::Enter), Key::Return);
        assert_eq!(map_key(NamedKey::Down), Key::DownArrow);
        assert_eq!(map_key(NamedKey::F(7)), Key::F7);
    }
}
