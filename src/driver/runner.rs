use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::host::{InputPrimitives, KeyPayload};
use super::probe::ReadinessProbe;
use super::result::{RunResult, RunState, StepFailure, StepOutcome};
use super::step::{ActionStep, Sequence};
use super::token::CancellationToken;

/// Default slice length for cancellable waits.
pub const DEFAULT_WAIT_CHUNK: Duration = Duration::from_millis(500);

/// Floor applied to readiness poll intervals so a zero interval cannot spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Runner policy knobs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Longest uninterrupted sleep; cancellation is checked between chunks.
    pub wait_chunk: Duration,
    /// Abort the run when a `WaitUntilReady` step times out.
    pub readiness_timeout_fatal: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            wait_chunk: DEFAULT_WAIT_CHUNK,
            readiness_timeout_fatal: false,
        }
    }
}

/// How a single step ended.
enum StepEnd {
    Done(StepOutcome),
    /// Cancellation was observed while the step was waiting.
    Interrupted,
}

/// Executes a [`Sequence`] one step at a time against host primitives.
///
/// Cancellation is observed between steps and between wait chunks, never in
/// the middle of an injection call. The runner keeps no state across runs.
#[derive(Debug, Clone, Default)]
pub struct SequenceRunner {
    options: RunnerOptions,
}

impl SequenceRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run `sequence` to completion, failure or cancellation.
    pub fn execute<P, R>(
        &self,
        sequence: &Sequence,
        cancellation: &CancellationToken,
        primitives: &mut P,
        probe: &mut R,
    ) -> RunResult
    where
        P: InputPrimitives + ?Sized,
        R: ReadinessProbe + ?Sized,
    {
        self.execute_with(sequence, cancellation, primitives, probe, |_| {})
    }

    /// Like [`execute`](Self::execute), streaming each outcome to `observer`
    /// as soon as it is known.
    pub fn execute_with<P, R, O>(
        &self,
        sequence: &Sequence,
        cancellation: &CancellationToken,
        primitives: &mut P,
        probe: &mut R,
        mut observer: O,
    ) -> RunResult
    where
        P: InputPrimitives + ?Sized,
        R: ReadinessProbe + ?Sized,
        O: FnMut(&StepOutcome),
    {
        let started = Instant::now();
        let total = sequence.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut failed = false;

        if sequence.is_empty() {
            debug!(target: "keypilot::runner", "Empty sequence; nothing to run");
            return RunResult {
                outcomes,
                state: RunState::Finished,
                failed,
                elapsed: started.elapsed(),
            };
        }

        let mut state = RunState::InProgress;
        info!(target: "keypilot::runner", steps = total, "Run started");

        for (index, step) in sequence.iter().enumerate() {
            if cancellation.is_signaled() {
                info!(target: "keypilot::runner", step_index = index, "Cancellation observed");
                state = RunState::Cancelled;
                break;
            }

            trace!(target: "keypilot::runner", step_index = index, kind = step.kind(), %step, "Running step");
            match self.run_step(index, step, cancellation, primitives, probe) {
                StepEnd::Interrupted => {
                    info!(target: "keypilot::runner", step_index = index, "Cancelled during wait");
                    state = RunState::Cancelled;
                    break;
                }
                StepEnd::Done(outcome) => {
                    let fatal = match &outcome.error {
                        Some(err) => {
                            let fatal = err.is_fatal(self.options.readiness_timeout_fatal);
                            warn!(
                                target: "keypilot::runner",
                                step_index = index, error = %err, fatal,
                                "Step failed"
                            );
                            fatal
                        }
                        None => {
                            debug!(target: "keypilot::runner", step_index = index, "Step completed");
                            false
                        }
                    };
                    observer(&outcome);
                    outcomes.push(outcome);
                    if fatal {
                        failed = true;
                        break;
                    }
                }
            }
        }

        for index in outcomes.len()..total {
            let outcome = StepOutcome::skipped(index);
            observer(&outcome);
            outcomes.push(outcome);
        }

        if state == RunState::InProgress {
            state = RunState::Finished;
        }
        debug_assert!(state.is_terminal());
        let elapsed = started.elapsed();
        info!(
            target: "keypilot::runner",
            ?state, failed, elapsed_ms = elapsed.as_millis() as u64,
            "Run ended"
        );

        RunResult {
            outcomes,
            state,
            failed,
            elapsed,
        }
    }

    fn run_step<P, R>(
        &self,
        index: usize,
        step: &ActionStep,
        cancellation: &CancellationToken,
        primitives: &mut P,
        probe: &mut R,
    ) -> StepEnd
    where
        P: InputPrimitives + ?Sized,
        R: ReadinessProbe + ?Sized,
    {
        match step {
            ActionStep::FocusWindow { title_pattern } => {
                if primitives.focus_window(title_pattern) {
                    StepEnd::Done(StepOutcome::completed(index))
                } else {
                    StepEnd::Done(StepOutcome::failed(
                        index,
                        StepFailure::WindowNotFound {
                            title_pattern: title_pattern.clone(),
                        },
                    ))
                }
            }
            ActionStep::SendText { literal } => {
                self.send(index, &KeyPayload::Text(literal), primitives)
            }
            ActionStep::SendKeyCombo { combo } => {
                self.send(index, &KeyPayload::Combo(combo), primitives)
            }
            ActionStep::WaitFixed { duration } => {
                if self.sleep_cancellable(*duration, cancellation) {
                    StepEnd::Done(StepOutcome::completed(index))
                } else {
                    StepEnd::Interrupted
                }
            }
            ActionStep::WaitUntilReady {
                timeout,
                poll_interval,
            } => self.wait_until_ready(index, *timeout, *poll_interval, cancellation, probe),
        }
    }

    fn send<P>(&self, index: usize, payload: &KeyPayload<'_>, primitives: &mut P) -> StepEnd
    where
        P: InputPrimitives + ?Sized,
    {
        if primitives.send(payload) {
            StepEnd::Done(StepOutcome::completed(index))
        } else {
            StepEnd::Done(StepOutcome::failed(
                index,
                StepFailure::InjectionTransportError {
                    payload: payload.to_string(),
                },
            ))
        }
    }

    fn wait_until_ready<R>(
        &self,
        index: usize,
        timeout: Duration,
        poll_interval: Duration,
        cancellation: &CancellationToken,
        probe: &mut R,
    ) -> StepEnd
    where
        R: ReadinessProbe + ?Sized,
    {
        probe.begin(poll_interval);
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            if cancellation.is_signaled() {
                return StepEnd::Interrupted;
            }
            polls += 1;
            if probe.poll() {
                trace!(target: "keypilot::runner", step_index = index, polls, "Target ready");
                return StepEnd::Done(StepOutcome::completed(index));
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return StepEnd::Done(StepOutcome::failed(
                    index,
                    StepFailure::ReadinessTimeout { timeout },
                ));
            }
            if !self.sleep_cancellable(poll_interval.min(timeout - elapsed), cancellation) {
                return StepEnd::Interrupted;
            }
        }
    }

    /// Blocking sleep in `wait_chunk` slices. Returns false if cancellation
    /// was observed after any slice.
    fn sleep_cancellable(&self, total: Duration, cancellation: &CancellationToken) -> bool {
        let chunk = self.options.wait_chunk.max(MIN_POLL_INTERVAL);
        let deadline = Instant::now() + total;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(chunk));
            if cancellation.is_signaled() {
                return false;
            }
        }
    }
}
