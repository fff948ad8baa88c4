use anyhow::{Context, Result, bail};
use rand::random_range;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, MAX_BLOCK_DEPTH, StepDef};
use crate::driver::{
    ActionStep, CancellationToken, GracePeriodProbe, RunResult, RunnerOptions, Sequence,
    SequenceBuilder, SequenceRunner, StepRules,
};
use crate::executor::actions::ActionExecutor;
use crate::utils::interpolation::{self, Scope};

/// Runtime is responsible for:
/// - expanding config steps and records into one immutable `Sequence`
/// - deriving runner policy and the readiness probe from settings
/// - executing the sequence against the Enigo-backed `ActionExecutor`
pub struct Runtime {
    config: Config,
    executor: ActionExecutor,
}

impl Runtime {
    /// Create a new runtime with the given config and dry-run mode.
    pub fn new(config: Config, dry_run: bool) -> Self {
        Self {
            config,
            executor: ActionExecutor::new(dry_run),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Enable or disable dry-run mode at runtime.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.executor.set_dry_run(dry_run);
    }

    /// Is dry-run currently enabled?
    pub fn is_dry_run(&self) -> bool {
        self.executor.is_dry_run()
    }

    /// Runner configured from `settings`.
    pub fn runner(&self) -> SequenceRunner {
        let settings = &self.config.settings;
        SequenceRunner::new(RunnerOptions {
            wait_chunk: Duration::from_millis(settings.wait_chunk_ms),
            readiness_timeout_fatal: settings.readiness_timeout_fatal,
        })
    }

    /// Default readiness probe, honouring `readiness_grace_ms`.
    pub fn probe(&self) -> GracePeriodProbe {
        match self.config.settings.readiness_grace_ms {
            Some(ms) => GracePeriodProbe::with_grace(Duration::from_millis(ms)),
            None => GracePeriodProbe::new(),
        }
    }

    /// Expand `steps`, then `per_record` once for every record, into a sequence.
    pub fn build_sequence(&self, records: &[Value]) -> Result<Sequence> {
        let mut builder = SequenceBuilder::new(StepRules {
            allow_empty_text: self.config.settings.allow_empty_text,
        });

        let outside = Scope {
            record: &Value::Null,
            globals: &self.config.globals,
            index: 0,
            count: records.len(),
        };
        self.expand(&self.config.steps, &outside, &mut builder, 0)
            .context("Failed to plan `steps`")?;

        if !records.is_empty() && self.config.per_record.is_empty() {
            warn!(
                target: "keypilot::runtime",
                records = records.len(),
                "Records were supplied but `per_record` is empty"
            );
        }
        for (idx, record) in records.iter().enumerate() {
            let scope = Scope {
                record,
                globals: &self.config.globals,
                index: idx + 1,
                count: records.len(),
            };
            self.expand(&self.config.per_record, &scope, &mut builder, 0)
                .with_context(|| format!("Failed to plan record {}", idx + 1))?;
        }

        debug!(
            target: "keypilot::runtime",
            steps = builder.len(),
            records = records.len(),
            "Sequence planned"
        );
        Ok(builder.build())
    }

    /// Plan and execute a run.
    pub fn run(&mut self, records: &[Value], cancellation: &CancellationToken) -> Result<RunResult> {
        let sequence = self.build_sequence(records)?;
        info!(
            target: "keypilot::runtime",
            steps = sequence.len(),
            records = records.len(),
            dry_run = self.is_dry_run(),
            "Starting run"
        );
        Ok(self.run_sequence(&sequence, cancellation))
    }

    /// Execute an already planned sequence.
    pub fn run_sequence(&mut self, sequence: &Sequence, cancellation: &CancellationToken) -> RunResult {
        let runner = self.runner();
        let mut probe = self.probe();
        runner.execute(sequence, cancellation, &mut self.executor, &mut probe)
    }

    fn expand(
        &self,
        steps: &[StepDef],
        scope: &Scope<'_>,
        builder: &mut SequenceBuilder,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_BLOCK_DEPTH {
            bail!("Maximum block nesting depth ({MAX_BLOCK_DEPTH}) exceeded (possible cycle)");
        }
        for (idx, step) in steps.iter().enumerate() {
            self.expand_step(step, scope, builder, depth)
                .with_context(|| format!("at step {idx}"))?;
        }
        Ok(())
    }

    fn expand_step(
        &self,
        step: &StepDef,
        scope: &Scope<'_>,
        builder: &mut SequenceBuilder,
        depth: usize,
    ) -> Result<()> {
        let action = match step {
            StepDef::FocusWindow { title } => ActionStep::focus_window(render(title, scope)),
            StepDef::SendText {
                text,
                skip_if_empty,
            } => {
                let literal = render(text, scope);
                if literal.is_empty() && *skip_if_empty {
                    trace!(target: "keypilot::runtime", template = %text, "Skipping empty send_text");
                    return Ok(());
                }
                ActionStep::send_text(literal)
            }
            StepDef::SendKey { key } => ActionStep::send_key(key)?,
            StepDef::WaitMs { ms } => ActionStep::wait_fixed(*ms),
            StepDef::WaitRandMs { min, max } => {
                let (lo, hi) = if min <= max { (*min, *max) } else { (*max, *min) };
                let delay = if lo == hi { lo } else { random_range(lo..=hi) };
                trace!(target: "keypilot::runtime", min = lo, max = hi, delay, "wait_rand_ms planned");
                ActionStep::wait_fixed(delay)
            }
            StepDef::WaitUntilReady {
                timeout_ms,
                poll_ms,
            } => ActionStep::wait_until_ready(*timeout_ms, *poll_ms),
            StepDef::Use { name } => {
                let inner = self
                    .config
                    .blocks
                    .get(name)
                    .with_context(|| format!("Referenced block '{name}' not found"))?;
                trace!(target: "keypilot::runtime", %name, depth, "Expanding block");
                return self
                    .expand(inner, scope, builder, depth + 1)
                    .with_context(|| format!("inside block '{name}'"));
            }
        };
        builder.push(action)?;
        Ok(())
    }
}

/// Render a template, warning when tokens survive (usually a missing field).
fn render(template: &str, scope: &Scope<'_>) -> String {
    let out = interpolation::render(template, scope);
    if interpolation::has_tokens(&out) {
        warn!(
            target: "keypilot::runtime",
            %template, rendered = %out, record = scope.index,
            "Unresolved template token"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::driver::StepStatus;
    use serde_json::json;

    fn runtime(json: &str) -> Runtime {
        Runtime::new(load_from_str(json).unwrap(), true)
    }

    fn lines(seq: &Sequence) -> Vec<String> {
        seq.iter().map(ToString::to_string).collect()
    }

    const ENTRY: &str = r#"{
        "globals": { "site": "WH1" },
        "blocks": { "next_field": [{ "type": "send_key", "key": "TAB" }] },
        "steps": [
            { "type": "focus_window", "title": "Fourth Shift" },
            { "type": "send_key", "key": "CTRL+HOME" }
        ],
        "per_record": [
            { "type": "send_text", "text": "{{item|upper}}" },
            { "type": "use", "name": "next_field" },
            { "type": "send_text", "text": "{{qty|int}}@{{@site}}" },
            { "type": "send_key", "key": "ENTER" },
            { "type": "wait_ms", "ms": 5 }
        ]
    }"#;

    #[test]
    fn expands_setup_then_each_record_in_order() {
        let rt = runtime(ENTRY);
        let records = vec![json!({"item":"a-1","qty":3}), json!({"item":"b-2","qty":"4.0"})];
        let seq = rt.build_sequence(&records).unwrap();
        assert_eq!(
            lines(&seq),
            [
                "focus_window \"Fourth Shift\"",
                "send_key CTRL+HOME",
                "send_text \"A-1\"",
                "send_key TAB",
                "send_text \"3@WH1\"",
                "send_key ENTER",
                "wait_fixed 5ms",
                "send_text \"B-2\"",
                "send_key TAB",
                "send_text \"4@WH1\"",
                "send_key ENTER",
                "wait_fixed 5ms",
            ]
        );
    }

    #[test]
    fn no_records_means_setup_only() {
        let seq = runtime(ENTRY).build_sequence(&[]).unwrap();
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn empty_text_is_rejected_unless_skipped_or_allowed() {
        let strict = runtime(r#"{ "per_record": [{ "type": "send_text", "text": "{{note}}" }] }"#);
        let err = strict.build_sequence(&[json!({"note": ""})]).unwrap_err();
        assert!(format!("{err:#}").contains("record 1"));

        let skipping = runtime(
            r#"{ "per_record": [{ "type": "send_text", "text": "{{note}}", "skip_if_empty": true }] }"#,
        );
        assert!(skipping.build_sequence(&[json!({"note": ""})]).unwrap().is_empty());

        let lenient = runtime(
            r#"{ "settings": { "allow_empty_text": true },
                 "per_record": [{ "type": "send_text", "text": "{{note}}" }] }"#,
        );
        assert_eq!(lenient.build_sequence(&[json!({"note": ""})]).unwrap().len(), 1);
    }

    #[test]
    fn random_waits_stay_within_bounds() {
        let rt = runtime(r#"{ "steps": [{ "type": "wait_rand_ms", "min": 30, "max": 10 }] }"#);
        for _ in 0..20 {
            let seq = rt.build_sequence(&[]).unwrap();
            match &seq.steps()[0] {
                ActionStep::WaitFixed { duration } => {
                    let ms = duration.as_millis();
                    assert!((10..=30).contains(&ms));
                }
                other => panic!("unexpected step {other}"),
            }
        }
    }

    #[test]
    fn settings_drive_runner_options() {
        let rt = runtime(r#"{ "settings": { "wait_chunk_ms": 40, "readiness_timeout_fatal": true } }"#);
        let runner = rt.runner();
        assert_eq!(runner.options().wait_chunk, Duration::from_millis(40));
        assert!(runner.options().readiness_timeout_fatal);
    }

    #[test]
    fn dry_run_completes_every_step() {
        let mut rt = runtime(ENTRY);
        let records = vec![json!({"item":"a-1","qty":3})];
        let result = rt.run(&records, &CancellationToken::new()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.count(StepStatus::Completed), 7);
    }

    #[test]
    fn cancelled_token_skips_the_whole_run() {
        let mut rt = runtime(ENTRY);
        let token = CancellationToken::new();
        token.signal();
        let result = rt.run(&[json!({"item":"a","qty":1})], &token).unwrap();
        assert!(result.is_cancelled());
        assert_eq!(result.count(StepStatus::Skipped), 7);
    }
}
