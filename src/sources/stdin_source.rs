//! Stdin record source.
//!
//! Reads standard input to EOF and parses it like a records file, so shell
//! pipelines work:
//!     jq -c '.[]' rows.json | keypilot --config entry.json --records -

use std::io::{self, Read};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::trace;

use super::{RecordSource, parse_records};

/// Source that reads records from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    /// Construct a new `StdinSource`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Read and parse records from any reader.
    pub fn load_from<R: Read>(mut reader: R) -> Result<Vec<Value>> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .context("Failed to read records from stdin")?;
        trace!(target: "keypilot::sources", bytes = text.len(), "Read stdin to EOF");
        parse_records(&text)
    }
}

impl RecordSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn load(&self) -> Result<Vec<Value>> {
        Self::load_from(io::stdin().lock())
    }
}
