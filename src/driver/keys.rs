//! Symbolic key registry.
//!
//! Key combos are written the way data-entry macros usually spell them:
//! `ENTER`, `SHIFT+TAB`, `CTRL+HOME`, `DOWN*3`, or the legacy braced form
//! `{DOWN 3}`. Names are case-insensitive. Anything not in the registry is
//! rejected when the step is built, never at run time.

use std::fmt;
use std::str::FromStr;

use super::step::StepError;

/// Highest repeat count accepted for a single combo.
pub const MAX_REPEAT: u16 = 99;

/// Non-modifier keys known to the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Tab,
    Delete,
    Backspace,
    Escape,
    Home,
    End,
    PageUp,
    PageDown,
    Space,
    Up,
    Down,
    Left,
    Right,
    /// Function key `F1`..=`F12`.
    F(u8),
}

impl NamedKey {
    fn lookup(name: &str) -> Option<Self> {
        let key = match name {
            "ENTER" | "RETURN" => Self::Enter,
            "TAB" => Self::Tab,
            "DELETE" | "DEL" => Self::Delete,
            "BACKSPACE" | "BS" => Self::Backspace,
            "ESC" | "ESCAPE" => Self::Escape,
            "HOME" => Self::Home,
            "END" => Self::End,
            "PGUP" | "PAGEUP" => Self::PageUp,
            "PGDN" | "PAGEDOWN" => Self::PageDown,
            "SPACE" => Self::Space,
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            other => {
                let n: u8 = other.strip_prefix('F')?.parse().ok()?;
                if !(1..=12).contains(&n) {
                    return None;
                }
                Self::F(n)
            }
        };
        Some(key)
    }

    /// Canonical registry name.
    pub fn name(&self) -> String {
        match self {
            Self::Enter => "ENTER".into(),
            Self::Tab => "TAB".into(),
            Self::Delete => "DELETE".into(),
            Self::Backspace => "BACKSPACE".into(),
            Self::Escape => "ESC".into(),
            Self::Home => "HOME".into(),
            Self::End => "END".into(),
            Self::PageUp => "PGUP".into(),
            Self::PageDown => "PGDN".into(),
            Self::Space => "SPACE".into(),
            Self::Up => "UP".into(),
            Self::Down => "DOWN".into(),
            Self::Left => "LEFT".into(),
            Self::Right => "RIGHT".into(),
            Self::F(n) => format!("F{n}"),
        }
    }
}

/// Modifier keys held down while the main key is clicked.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.shift || self.alt)
    }
}

/// A validated key combination, e.g. `CTRL+HOME` or `DOWN*3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: NamedKey,
    /// How many times the combo is clicked (always >= 1).
    pub repeat: u16,
}

impl KeyCombo {
    /// Single unmodified click of `key`.
    pub fn plain(key: NamedKey) -> Self {
        Self {
            modifiers: Modifiers::default(),
            key,
            repeat: 1,
        }
    }

    /// Parse a symbolic key name against the registry.
    pub fn parse(symbolic: &str) -> Result<Self, StepError> {
        let unknown = || StepError::UnknownKey(symbolic.to_string());

        let mut body = symbolic.trim().to_ascii_uppercase();
        if body.is_empty() {
            return Err(unknown());
        }
        let braced = body.starts_with('{') && body.ends_with('}') && body.len() >= 2;
        if braced {
            body = body[1..body.len() - 1].trim().to_string();
        }

        // Repeat count: `DOWN*3`, or `{DOWN 3}` in the braced form.
        let (combo_part, repeat) = match body.split_once('*') {
            Some((combo, count)) => (combo.trim().to_string(), Some(count.trim().to_string())),
            None if braced => match body.rsplit_once(' ') {
                Some((combo, count)) => (combo.trim().to_string(), Some(count.to_string())),
                None => (body.clone(), None),
            },
            None => (body.clone(), None),
        };

        let repeat = match repeat {
            Some(count) => {
                let n: u16 = count
                    .parse()
                    .map_err(|_| StepError::InvalidRepeat(symbolic.to_string()))?;
                if n == 0 || n > MAX_REPEAT {
                    return Err(StepError::InvalidRepeat(symbolic.to_string()));
                }
                n
            }
            None => 1,
        };

        let mut modifiers = Modifiers::default();
        let mut parts: Vec<&str> = combo_part.split('+').map(str::trim).collect();
        let key_name = parts.pop().filter(|k| !k.is_empty()).ok_or_else(unknown)?;
        for m in parts {
            match m {
                "CTRL" | "CONTROL" => modifiers.ctrl = true,
                "SHIFT" => modifiers.shift = true,
                "ALT" => modifiers.alt = true,
                _ => return Err(unknown()),
            }
        }
        let key = NamedKey::lookup(key_name).ok_or_else(unknown)?;

        Ok(Self {
            modifiers,
            key,
            repeat,
        })
    }
}

impl FromStr for KeyCombo {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("CTRL+")?;
        }
        if self.modifiers.shift {
            f.write_str("SHIFT+")?;
        }
        if self.modifiers.alt {
            f.write_str("ALT+")?;
        }
        f.write_str(&self.key.name())?;
        if self.repeat > 1 {
            write!(f, "*{}", self.repeat)?;
        }
        Ok(())
    }
}
