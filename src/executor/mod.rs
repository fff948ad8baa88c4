#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Keypilot.

This module wires the driver core to the host:
- `actions`: Enigo-backed input primitives (typing, key combos, window focus)
- `runtime`: expands config and records into a `Sequence` and runs it
- `watcher`: Ctrl+C, kill-key hotkey and deadline kill switches

Typical usage:
- Construct a `Runtime` with a loaded `Config`.
- Spawn watchers on a shared `CancellationToken`.
- Call `Runtime::run` with the records on a blocking thread.

Example:
```no_run
use keypilot::config::Config;
use keypilot::driver::CancellationToken;
use keypilot::executor::Runtime;
use serde_json::json;

let cfg: Config = Default::default();
let mut rt = Runtime::new(cfg, true); // dry-run mode
let records = vec![json!({"item": "A-100"})];
let result = rt.run(&records, &CancellationToken::new())?;
assert!(result.is_success());
# Ok::<(), anyhow::Error>(())
```
*/

pub mod actions;
pub mod runtime;
pub mod watcher;

pub use actions::ActionExecutor;
pub use runtime::Runtime;
pub use watcher::{spawn_deadline, spawn_hotkey_watcher, spawn_interrupt_watcher};
