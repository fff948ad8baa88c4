//! Readiness probes.
//!
//! A probe answers "can the target take more input yet?" during a
//! `WaitUntilReady` step. How that is judged is application specific; this
//! module ships only the generic probes.

use std::time::{Duration, Instant};

/// Polled repeatedly by the runner while a `WaitUntilReady` step is active.
pub trait ReadinessProbe {
    /// Called once at the start of each `WaitUntilReady` step.
    fn begin(&mut self, _poll_interval: Duration) {}

    /// Returns true once the target is judged ready for further input.
    fn poll(&mut self) -> bool;
}

impl<F> ReadinessProbe for F
where
    F: FnMut() -> bool,
{
    fn poll(&mut self) -> bool {
        self()
    }
}

/// Ready on the first poll.
#[derive(Debug, Copy, Clone, Default)]
pub struct AlwaysReady;

impl ReadinessProbe for AlwaysReady {
    fn poll(&mut self) -> bool {
        true
    }
}

/// Default probe: ready once a grace period has passed since the step began.
///
/// Without an explicit grace period, the step's own poll interval is used,
/// so the step completes on the first poll after one interval.
#[derive(Debug, Clone, Default)]
pub struct GracePeriodProbe {
    grace: Option<Duration>,
    active: Duration,
    started: Option<Instant>,
}

impl GracePeriodProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed grace period instead of the poll interval.
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            grace: Some(grace),
            ..Self::default()
        }
    }
}

impl ReadinessProbe for GracePeriodProbe {
    fn begin(&mut self, poll_interval: Duration) {
        self.active = self.grace.unwrap_or(poll_interval);
        self.started = Some(Instant::now());
    }

    fn poll(&mut self) -> bool {
        let started = *self.started.get_or_insert_with(Instant::now);
        started.elapsed() >= self.active
    }
}
