//! Utilities for Keypilot.
//!
//! Submodules:
//! - `interpolation`: renders `{{field}}`, `{{@global}}` and filtered tokens against a record.
//! - `window`: OS-specific window focusing and global key state (unsupported platforms report "not found" / unavailable).

pub mod interpolation;
pub mod window;
