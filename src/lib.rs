#![deny(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Keypilot: a cancellable, record-driven keystroke sequencer for keyboard-only
//! terminal applications.
//!
//! A run is an ordered list of input steps (focus a window, type text, send a
//! key combo, wait, wait until ready) executed blindly against an application
//! that gives no feedback. The crate is organized as:
//! - `driver`: the sequencing core (steps, cancellation token, readiness probes, runner).
//! - `config`: configuration models, loader, and schema helpers.
//! - `executor`: Enigo-backed primitives, sequence planning, kill-switch watchers.
//! - `sources`: record sources (file, stdin, inline).
//! - `utils`: template interpolation and window helpers.
//!
//! Use `keypilot::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: sequencing core.
pub mod driver;
/// Public module: host primitives, runtime and watchers.
pub mod executor;
/// Public module: record sources (file, stdin, inline).
pub mod sources;
/// Public module: utilities (interpolation, window helpers).
pub mod utils;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a simple level name (trace|debug|info|warn|error).
pub fn parse_level(name: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match name.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging).
/// - `level` wins when given and valid.
/// - Otherwise honors the `RUST_LOG` environment variable as a simple level.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<&str>) {
    let level = level
        .and_then(parse_level)
        .or_else(|| std::env::var("RUST_LOG").ok().as_deref().and_then(parse_level))
        .unwrap_or(tracing::Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use keypilot::prelude::*;`
pub mod prelude {
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    pub use serde::{Deserialize, Serialize};

    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use std::time::Duration;

    pub use crate as keypilot;
    pub use crate::driver::{
        ActionStep, CancellationToken, FnPrimitives, GracePeriodProbe, InputPrimitives,
        KeyPayload, ReadinessProbe, RunResult, RunState, RunnerOptions, Sequence,
        SequenceBuilder, SequenceRunner, StepOutcome, StepStatus,
    };

    pub use crate::{config, driver, executor, sources, utils};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("WARNING"), Some(tracing::Level::WARN));
        assert_eq!(parse_level(" debug "), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn version_matches_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
