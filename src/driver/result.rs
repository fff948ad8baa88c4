//! Per-step outcomes and the overall run result.

use std::time::Duration;

use thiserror::Error;

/// Run-time failure of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    #[error("window not found: {title_pattern}")]
    WindowNotFound { title_pattern: String },

    #[error("injection transport error while sending {payload}")]
    InjectionTransportError { payload: String },

    #[error("readiness timeout")]
    ReadinessTimeout { timeout: Duration },
}

impl StepFailure {
    /// Whether this failure stops the run under the given policy.
    pub fn is_fatal(&self, readiness_timeout_fatal: bool) -> bool {
        match self {
            Self::ReadinessTimeout { .. } => readiness_timeout_fatal,
            Self::WindowNotFound { .. } | Self::InjectionTransportError { .. } => true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

/// Lifecycle of one run: `Idle -> InProgress -> Finished | Cancelled`.
///
/// `Idle` and `InProgress` only exist while a runner is working; a returned
/// [`RunResult`] always carries a terminal state (see [`RunState::is_terminal`]).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Not started.
    #[default]
    Idle,
    /// Steps are being executed.
    InProgress,
    /// Every step was attempted or the run stopped on a fatal failure.
    Finished,
    /// The cancellation token was observed before the sequence ended.
    Cancelled,
}

impl RunState {
    /// Whether a run in this state has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step_index: usize,
    pub status: StepStatus,
    pub error: Option<StepFailure>,
}

impl StepOutcome {
    pub fn completed(step_index: usize) -> Self {
        Self {
            step_index,
            status: StepStatus::Completed,
            error: None,
        }
    }

    pub fn skipped(step_index: usize) -> Self {
        Self {
            step_index,
            status: StepStatus::Skipped,
            error: None,
        }
    }

    pub fn failed(step_index: usize, error: StepFailure) -> Self {
        Self {
            step_index,
            status: StepStatus::Failed,
            error: Some(error),
        }
    }

    /// Human-readable failure detail, if any.
    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Ordered outcomes of one run: exactly one entry per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub outcomes: Vec<StepOutcome>,
    pub state: RunState,
    /// Set when a fatal failure stopped the run.
    pub failed: bool,
    pub elapsed: Duration,
}

impl RunResult {
    /// Finished without a fatal failure and without cancellation.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Finished && !self.failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    /// The first failed step, fatal or not.
    pub fn first_failure(&self) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.status == StepStatus::Failed)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_timeout_detail_is_stable() {
        let failure = StepFailure::ReadinessTimeout {
            timeout: Duration::from_millis(500),
        };
        assert_eq!(
            StepOutcome::failed(2, failure).error_detail().as_deref(),
            Some("readiness timeout")
        );
    }

    #[test]
    fn fatality_policy() {
        let timeout = StepFailure::ReadinessTimeout {
            timeout: Duration::ZERO,
        };
        assert!(!timeout.is_fatal(false));
        assert!(timeout.is_fatal(true));
        let focus = StepFailure::WindowNotFound {
            title_pattern: "X".into(),
        };
        assert!(focus.is_fatal(false));
    }

    #[test]
    fn only_finished_and_cancelled_are_terminal() {
        assert_eq!(RunState::default(), RunState::Idle);
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::InProgress.is_terminal());
        assert!(RunState::Finished.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
    }
}
