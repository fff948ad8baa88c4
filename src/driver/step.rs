//! Action steps and immutable sequences.
//!
//! Steps are validated when they are pushed into a [`SequenceBuilder`]; a
//! [`Sequence`] that exists is therefore always runnable.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::keys::KeyCombo;

/// Construction-time rejection of a malformed step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    #[error("invalid repeat count in '{0}' (expected 1..=99)")]
    InvalidRepeat(String),

    #[error("send_text literal is empty")]
    EmptyText,

    #[error("window title pattern is empty")]
    EmptyWindowTitle,

    #[error("poll interval {poll_ms}ms exceeds readiness timeout {timeout_ms}ms")]
    PollExceedsTimeout { poll_ms: u64, timeout_ms: u64 },
}

/// Rules applied while building a sequence.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StepRules {
    /// Accept `SendText("")`. Off by default: an empty field usually means a
    /// missing cell rather than an intentional blank.
    pub allow_empty_text: bool,
}

/// A single unit of work for the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStep {
    FocusWindow { title_pattern: String },
    SendText { literal: String },
    SendKeyCombo { combo: KeyCombo },
    WaitFixed { duration: Duration },
    WaitUntilReady { timeout: Duration, poll_interval: Duration },
}

impl ActionStep {
    pub fn focus_window(title_pattern: impl Into<String>) -> Self {
        Self::FocusWindow {
            title_pattern: title_pattern.into(),
        }
    }

    pub fn send_text(literal: impl Into<String>) -> Self {
        Self::SendText {
            literal: literal.into(),
        }
    }

    /// Parse `symbolic` against the key registry.
    pub fn send_key(symbolic: &str) -> Result<Self, StepError> {
        Ok(Self::SendKeyCombo {
            combo: KeyCombo::parse(symbolic)?,
        })
    }

    pub fn wait_fixed(duration_ms: u64) -> Self {
        Self::WaitFixed {
            duration: Duration::from_millis(duration_ms),
        }
    }

    pub fn wait_until_ready(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self::WaitUntilReady {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Short kind label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FocusWindow { .. } => "focus_window",
            Self::SendText { .. } => "send_text",
            Self::SendKeyCombo { .. } => "send_key",
            Self::WaitFixed { .. } => "wait_fixed",
            Self::WaitUntilReady { .. } => "wait_until_ready",
        }
    }

    /// Check this step against `rules`.
    pub fn validate(&self, rules: &StepRules) -> Result<(), StepError> {
        match self {
            Self::FocusWindow { title_pattern } if title_pattern.trim().is_empty() => {
                Err(StepError::EmptyWindowTitle)
            }
            Self::SendText { literal } if literal.is_empty() && !rules.allow_empty_text => {
                Err(StepError::EmptyText)
            }
            Self::WaitUntilReady {
                timeout,
                poll_interval,
            } if poll_interval > timeout => Err(StepError::PollExceedsTimeout {
                poll_ms: poll_interval.as_millis() as u64,
                timeout_ms: timeout.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FocusWindow { title_pattern } => write!(f, "focus_window {title_pattern:?}"),
            Self::SendText { literal } => write!(f, "send_text {literal:?}"),
            Self::SendKeyCombo { combo } => write!(f, "send_key {combo}"),
            Self::WaitFixed { duration } => write!(f, "wait_fixed {}ms", duration.as_millis()),
            Self::WaitUntilReady {
                timeout,
                poll_interval,
            } => write!(
                f,
                "wait_until_ready timeout={}ms poll={}ms",
                timeout.as_millis(),
                poll_interval.as_millis()
            ),
        }
    }
}

/// An ordered, immutable list of steps. Insertion order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    steps: Vec<ActionStep>,
}

impl Sequence {
    /// Validate every step with default rules and build a sequence.
    pub fn new(steps: Vec<ActionStep>) -> Result<Self, StepError> {
        let mut builder = SequenceBuilder::new(StepRules::default());
        for step in steps {
            builder.push(step)?;
        }
        Ok(builder.build())
    }

    pub fn steps(&self) -> &[ActionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActionStep> {
        self.steps.iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a ActionStep;
    type IntoIter = std::slice::Iter<'a, ActionStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Accumulates validated steps into a [`Sequence`].
#[derive(Debug, Default)]
pub struct SequenceBuilder {
    rules: StepRules,
    steps: Vec<ActionStep>,
}

impl SequenceBuilder {
    pub fn new(rules: StepRules) -> Self {
        Self {
            rules,
            steps: Vec::new(),
        }
    }

    pub fn rules(&self) -> &StepRules {
        &self.rules
    }

    /// Validate and append a step.
    pub fn push(&mut self, step: ActionStep) -> Result<&mut Self, StepError> {
        step.validate(&self.rules)?;
        self.steps.push(step);
        Ok(self)
    }

    /// Chaining variant of [`push`](Self::push).
    pub fn step(mut self, step: ActionStep) -> Result<Self, StepError> {
        self.push(step)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn build(self) -> Sequence {
        Sequence { steps: self.steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_insertion_order() {
        let seq = SequenceBuilder::default()
            .step(ActionStep::focus_window("Fourth Shift"))
            .unwrap()
            .step(ActionStep::send_text("ABC"))
            .unwrap()
            .step(ActionStep::send_key("ENTER").unwrap())
            .unwrap()
            .build();
        let kinds: Vec<_> = seq.iter().map(ActionStep::kind).collect();
        assert_eq!(kinds, ["focus_window", "send_text", "send_key"]);
    }

    #[test]
    fn empty_text_depends_on_rules() {
        assert_eq!(
            Sequence::new(vec![ActionStep::send_text("")]),
            Err(StepError::EmptyText)
        );
        let mut lenient = SequenceBuilder::new(StepRules {
            allow_empty_text: true,
        });
        assert!(lenient.push(ActionStep::send_text("")).is_ok());
    }

    #[test]
    fn rejects_poll_interval_longer_than_timeout() {
        let err = Sequence::new(vec![ActionStep::wait_until_ready(100, 250)]).unwrap_err();
        assert_eq!(
            err,
            StepError::PollExceedsTimeout {
                poll_ms: 250,
                timeout_ms: 100
            }
        );
        assert!(Sequence::new(vec![ActionStep::wait_until_ready(100, 100)]).is_ok());
    }

    #[test]
    fn rejects_blank_window_title() {
        assert_eq!(
            Sequence::new(vec![ActionStep::focus_window("  ")]),
            Err(StepError::EmptyWindowTitle)
        );
    }

    #[test]
    fn unknown_key_fails_before_any_sequence_exists() {
        assert!(matches!(
            ActionStep::send_key("CTRL+WHATEVER"),
            Err(StepError::UnknownKey(_))
        ));
    }

    #[test]
    fn display_is_one_line_per_step() {
        assert_eq!(
            ActionStep::send_key("ctrl+home").unwrap().to_string(),
            "send_key CTRL+HOME"
        );
        assert_eq!(ActionStep::wait_fixed(300).to_string(), "wait_fixed 300ms");
    }
}
