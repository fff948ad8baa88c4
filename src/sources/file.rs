//! File record source.
//!
//! Reads a whole file once and parses it as a JSON array or NDJSON. A missing
//! or unreadable file is an error: a data-entry run with silently missing rows
//! is worse than no run.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use super::{RecordSource, parse_records};

/// Source that loads records from a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Vec<Value>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read records file {}", self.path.display()))?;
        debug!(
            target: "keypilot::sources",
            path = %self.path.display(), bytes = text.len(),
            "Read records file"
        );
        parse_records(&text)
            .with_context(|| format!("Invalid records file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_ndjson_from_disk() {
        let path = std::env::temp_dir().join(format!("keypilot-records-{}.ndjson", std::process::id()));
        fs::write(&path, "{\"item\":\"A\"}\n{\"item\":\"B\"}\n").unwrap();
        let records = FileSource::new(&path).load().unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["item"], "B");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = FileSource::new("/definitely/not/here.json").load().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read records file"));
    }
}
