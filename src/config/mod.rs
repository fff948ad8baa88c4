//! Configuration module for Keypilot.
//!
//! This module wires together the data models and loading/validation helpers.
//!
//! Example:
//! use keypilot::config::{Config, load_from_path};
//!
//! let cfg = load_from_path("config/default.json")?;

pub mod loader;
pub mod models;

pub use models::{Blocks, Config, GlobalsMap, RunSettings, StepDef};

pub use loader::{
    MAX_BLOCK_DEPTH, generate_schema, load_from_path, load_from_path_async, load_from_reader,
    load_from_str, validate_config, write_schema_to_writer,
};
