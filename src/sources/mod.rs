/*!
Record sources.

Records are the rows a data-entry run types into the target application, one
JSON object per row. This module defines the `RecordSource` trait, the shared
parser, and the concrete sources:

- `file.rs`         -> `FileSource`  (JSON array or NDJSON file)
- `stdin_source.rs` -> `StdinSource` (the same formats from standard input)
- `InlineSource`    -> records embedded in the config

Accepted formats:
- a JSON array of objects: `[{"item":"A"},{"item":"B"}]`
- newline-delimited JSON objects, blank lines ignored

Records are loaded completely before a run starts; a sequence is immutable once
it is submitted, so there is no streaming ingestion.
*/

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::info;

use crate::config::Config;

pub mod file;
pub mod stdin_source;

pub use file::FileSource;
pub use stdin_source::StdinSource;

/// Trait implemented by all record sources.
///
/// Sources are loaded on a blocking thread, hence `Send + Sync`.
pub trait RecordSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Load every record.
    fn load(&self) -> Result<Vec<Value>>;
}

/// Records embedded in the config file.
#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    records: Vec<Value>,
}

impl InlineSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }
}

impl RecordSource for InlineSource {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn load(&self) -> Result<Vec<Value>> {
        ensure_objects(&self.records)?;
        Ok(self.records.clone())
    }
}

/// Pick the source for a run: `--records -` reads stdin, any other value is a
/// file path, and without the flag the config's inline records are used.
pub fn select_source(records_arg: Option<&str>, cfg: &Config) -> Box<dyn RecordSource> {
    match records_arg {
        Some("-") => Box::new(StdinSource::new()),
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(InlineSource::new(cfg.records.clone())),
    }
}

/// Load records through `source`, logging the count.
pub fn load_records(source: &dyn RecordSource) -> Result<Vec<Value>> {
    let records = source
        .load()
        .with_context(|| format!("Failed to load records from {} source", source.name()))?;
    info!(
        target: "keypilot::sources",
        source = source.name(),
        records = records.len(),
        "Records loaded"
    );
    Ok(records)
}

/// Parse a JSON array or NDJSON text into records.
pub fn parse_records(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let records = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Value>>(trimmed).context("Failed to parse JSON array of records")?
    } else {
        let mut out = Vec::new();
        for (idx, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("Malformed JSON record on line {}", idx + 1))?;
            out.push(value);
        }
        out
    };

    ensure_objects(&records)?;
    Ok(records)
}

fn ensure_objects(records: &[Value]) -> Result<()> {
    if let Some(idx) = records.iter().position(|r| !r.is_object()) {
        bail!("Record {} is not a JSON object", idx + 1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_arrays() {
        let records = parse_records(r#"[{"item":"A"},{"item":"B"}]"#).unwrap();
        assert_eq!(records, vec![json!({"item":"A"}), json!({"item":"B"})]);
    }

    #[test]
    fn parses_ndjson_skipping_blank_lines() {
        let records = parse_records("{\"item\":\"A\"}\n\n  {\"item\":\"B\"}\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn blank_input_has_no_records() {
        assert!(parse_records("  \n ").unwrap().is_empty());
    }

    #[test]
    fn malformed_line_names_its_line_number() {
        let err = parse_records("{\"item\":\"A\"}\n{oops}\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn records_must_be_objects() {
        assert!(parse_records("[1, 2]").is_err());
        assert!(InlineSource::new(vec![json!("x")]).load().is_err());
    }

    #[test]
    fn selects_sources_from_the_flag() {
        let mut cfg = Config::default();
        cfg.records.push(json!({"item":"A"}));
        assert_eq!(select_source(Some("-"), &cfg).name(), "stdin");
        assert_eq!(select_source(Some("rows.json"), &cfg).name(), "file");
        let inline = select_source(None, &cfg);
        assert_eq!(inline.name(), "inline");
        assert_eq!(load_records(inline.as_ref()).unwrap().len(), 1);
    }
}
