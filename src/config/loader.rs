use anyhow::{Context, Result, anyhow, bail};
use schemars::{Schema, schema_for};
use serde_valid::Validate;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::{Config, StepDef};
use crate::driver::KeyCombo;

/// Maximum nesting depth of `use` references (protects against cycles).
pub const MAX_BLOCK_DEPTH: usize = 64;

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Config> {
    let cfg: Config =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)
        .with_context(|| format!("Invalid config file {}", path_ref.display()))?;
    debug!(target: "keypilot::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let bytes = tokio::fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!(target: "keypilot::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Config model.
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Write the JSON Schema for the Config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Sanity checks that do not depend on record data:
/// - settings ranges
/// - every `use` names an existing block, without cycles
/// - every `send_key` parses against the key registry
/// - `wait_until_ready` poll interval does not exceed its timeout
/// - inline records are JSON objects
///
/// Checks that depend on rendered text (empty `send_text`, empty window
/// title) run when the sequence is planned.
pub fn validate_config(cfg: &Config) -> Result<()> {
    cfg.settings
        .validate()
        .map_err(|e| anyhow!("Invalid settings: {e}"))?;
    cfg.settings.kill_combo().context("Invalid settings.kill_key")?;

    let block_names = cfg.blocks.keys().cloned().collect::<BTreeSet<_>>();

    for (name, steps) in &cfg.blocks {
        validate_steps(cfg, steps, &block_names, 0)
            .with_context(|| format!("Invalid step in block '{name}'"))?;
    }
    validate_steps(cfg, &cfg.steps, &block_names, 0).context("Invalid step in `steps`")?;
    validate_steps(cfg, &cfg.per_record, &block_names, 0)
        .context("Invalid step in `per_record`")?;

    for (idx, record) in cfg.records.iter().enumerate() {
        if !record.is_object() {
            bail!("Inline record {} is not a JSON object", idx + 1);
        }
    }

    Ok(())
}

fn validate_steps(
    cfg: &Config,
    steps: &[StepDef],
    block_names: &BTreeSet<String>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_BLOCK_DEPTH {
        bail!("Maximum block nesting depth ({MAX_BLOCK_DEPTH}) exceeded (possible cycle)");
    }
    for (idx, step) in steps.iter().enumerate() {
        validate_step(cfg, step, block_names, depth)
            .with_context(|| format!("at step {idx}"))?;
    }
    Ok(())
}

fn validate_step(
    cfg: &Config,
    step: &StepDef,
    block_names: &BTreeSet<String>,
    depth: usize,
) -> Result<()> {
    match step {
        StepDef::Use { name } => {
            if !block_names.contains(name) {
                bail!("Referenced block '{name}' was not found in `blocks`");
            }
            if let Some(inner) = cfg.blocks.get(name) {
                validate_steps(cfg, inner, block_names, depth + 1)
                    .with_context(|| format!("inside block '{name}'"))?;
            }
        }
        StepDef::SendKey { key } => {
            let combo = KeyCombo::parse(key)?;
            // Synthetic input updates the async key state, so sending the kill
            // key would cancel the run it belongs to.
            let sends_kill_key = matches!(
                cfg.settings.kill_combo(),
                Ok(Some(kill)) if kill.key == combo.key && kill.modifiers == combo.modifiers
            );
            if sends_kill_key {
                bail!("send_key '{key}' is the configured kill key; change settings.kill_key");
            }
        }
        StepDef::WaitUntilReady {
            timeout_ms,
            poll_ms,
        } => {
            if poll_ms > timeout_ms {
                bail!("poll_ms ({poll_ms}) exceeds timeout_ms ({timeout_ms})");
            }
        }
        StepDef::FocusWindow { .. }
        | StepDef::SendText { .. }
        | StepDef::WaitMs { .. }
        | StepDef::WaitRandMs { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_config_with_defaults() {
        let cfg = load_from_str(
            r#"{
                "steps": [{ "type": "focus_window", "title": "Fourth Shift" }],
                "per_record": [
                    { "type": "send_text", "text": "{{item}}" },
                    { "type": "send_key", "key": "TAB" },
                    { "type": "wait_ms", "ms": 200 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.settings.wait_chunk_ms, 500);
        assert!(!cfg.settings.readiness_timeout_fatal);
        assert_eq!(cfg.per_record.len(), 3);
        assert_eq!(
            cfg.per_record[0],
            StepDef::SendText {
                text: "{{item}}".into(),
                skip_if_empty: false
            }
        );
    }

    #[test]
    fn rejects_unknown_key_names() {
        let err = load_from_str(r#"{ "steps": [{ "type": "send_key", "key": "ENTRE" }] }"#)
            .unwrap_err();
        assert!(format!("{err:#}").contains("unknown key name 'ENTRE'"));
    }

    #[test]
    fn rejects_negative_durations() {
        assert!(load_from_str(r#"{ "steps": [{ "type": "wait_ms", "ms": -5 }] }"#).is_err());
    }

    #[test]
    fn rejects_poll_longer_than_timeout() {
        let err = load_from_str(
            r#"{ "steps": [{ "type": "wait_until_ready", "timeout_ms": 100, "poll_ms": 200 }] }"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("exceeds timeout_ms"));
    }

    #[test]
    fn rejects_missing_and_cyclic_blocks() {
        assert!(load_from_str(r#"{ "steps": [{ "type": "use", "name": "nope" }] }"#).is_err());

        let err = load_from_str(
            r#"{
                "blocks": { "a": [{ "type": "use", "name": "b" }], "b": [{ "type": "use", "name": "a" }] },
                "steps": [{ "type": "use", "name": "a" }]
            }"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("nesting depth"));
    }

    #[test]
    fn kill_key_defaults_to_escape_and_can_be_disabled() {
        let cfg = load_from_str("{}").unwrap();
        assert_eq!(cfg.settings.kill_key.as_deref(), Some("ESC"));
        assert_eq!(
            cfg.settings.kill_combo().unwrap(),
            Some(KeyCombo::plain(crate::driver::NamedKey::Escape))
        );

        let cfg = load_from_str(r#"{ "settings": { "kill_key": null } }"#).unwrap();
        assert_eq!(cfg.settings.kill_combo().unwrap(), None);
    }

    #[test]
    fn rejects_unknown_kill_key() {
        let err = load_from_str(r#"{ "settings": { "kill_key": "PANIC" } }"#).unwrap_err();
        assert!(format!("{err:#}").contains("kill_key"));
    }

    #[test]
    fn rejects_sending_the_kill_key() {
        let sends_esc = r#"{
            "blocks": { "close": [{ "type": "send_key", "key": "{ESC 2}" }] },
            "steps": [{ "type": "use", "name": "close" }]
        }"#;
        let err = load_from_str(sends_esc).unwrap_err();
        assert!(format!("{err:#}").contains("kill key"));

        let moved = r#"{
            "settings": { "kill_key": "CTRL+F12" },
            "steps": [{ "type": "send_key", "key": "ESC" }, { "type": "send_key", "key": "F12" }]
        }"#;
        assert!(load_from_str(moved).is_ok());
    }

    #[test]
    fn rejects_zero_wait_chunk() {
        assert!(load_from_str(r#"{ "settings": { "wait_chunk_ms": 0 } }"#).is_err());
    }

    #[test]
    fn rejects_non_object_inline_records() {
        assert!(load_from_str(r#"{ "records": [{ "item": "A" }, 3] }"#).is_err());
    }

    #[test]
    fn schema_mentions_step_types() {
        let mut out = Vec::new();
        write_schema_to_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("wait_until_ready"));
        assert!(text.contains("per_record"));
    }
}
