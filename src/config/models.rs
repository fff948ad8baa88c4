use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::collections::BTreeMap;

use crate::driver::{KeyCombo, StepError};

/// Root configuration for Keypilot.
///
/// Deserialized from a JSON file. It describes:
/// - run `settings` (wait chunking, readiness policy, text rules, deadline)
/// - `globals` available to interpolation as `{{@key}}`
/// - reusable named step `blocks`
/// - `steps` run once, before any record
/// - `per_record` template steps repeated for every input record
/// - optional inline `records`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct Config {
    /// Runner policy.
    #[serde(default)]
    pub settings: RunSettings,

    /// Global values accessible via interpolation (e.g., `{{@warehouse}}`).
    #[serde(default)]
    pub globals: GlobalsMap,

    /// Reusable named step lists. Reference one with `{ "type": "use", "name": "..." }`.
    #[serde(default)]
    pub blocks: Blocks,

    /// Steps executed once, before the records.
    #[serde(default)]
    pub steps: Vec<StepDef>,

    /// Steps executed once per record, with `{{field}}` bound to that record.
    #[serde(default)]
    pub per_record: Vec<StepDef>,

    /// Records embedded in the config. Replaced by `--records` when given.
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
}

/// Named reusable step lists.
pub type Blocks = BTreeMap<String, Vec<StepDef>>;

/// Global variables.
pub type GlobalsMap = BTreeMap<String, serde_json::Value>;

/// Runner policy as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq, Eq)]
pub struct RunSettings {
    /// Longest uninterrupted sleep in milliseconds (default: 500).
    #[serde(default = "default_wait_chunk_ms")]
    #[validate(minimum = 1)]
    pub wait_chunk_ms: u64,

    /// Abort the whole run when a `wait_until_ready` step times out (default: false).
    #[serde(default)]
    pub readiness_timeout_fatal: bool,

    /// Accept `send_text` steps whose rendered text is empty (default: false).
    #[serde(default)]
    pub allow_empty_text: bool,

    /// Fixed grace period for the default readiness probe. When unset the
    /// step's own poll interval is used.
    #[serde(default)]
    pub readiness_grace_ms: Option<u64>,

    /// Cancel the run after this many milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    /// Global kill key, watched even while the target window has focus
    /// (default: `"ESC"`; `null` disables it). Windows only.
    #[serde(default = "default_kill_key")]
    pub kill_key: Option<String>,
}

impl RunSettings {
    /// The parsed kill key, if one is configured.
    pub fn kill_combo(&self) -> Result<Option<KeyCombo>, StepError> {
        self.kill_key.as_deref().map(KeyCombo::parse).transpose()
    }
}

fn default_wait_chunk_ms() -> u64 {
    500
}

fn default_kill_key() -> Option<String> {
    Some("ESC".into())
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            wait_chunk_ms: default_wait_chunk_ms(),
            readiness_timeout_fatal: false,
            allow_empty_text: false,
            readiness_grace_ms: None,
            deadline_ms: None,
            kill_key: default_kill_key(),
        }
    }
}

/// Step definition.
///
/// `focus_window.title` and `send_text.text` support interpolation:
/// - record fields: `{{field}}`, `{{order.qty}}`
/// - globals: `{{@key}}`
/// - record position: `{{#index}}`, `{{#count}}`
/// - filters: `{{qty|int}}`, `{{price|fixed:2}}`, `{{code|trim|upper}}`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDef {
    /// Activate the window whose title contains `title` (case-insensitive).
    FocusWindow { title: String },

    /// Type literal text into the focused window.
    SendText {
        text: String,
        /// Drop this step when the rendered text is empty (default: false).
        #[serde(default)]
        skip_if_empty: bool,
    },

    /// Send a symbolic key combo, e.g. "ENTER", "SHIFT+TAB", "CTRL+HOME", "DOWN*3".
    SendKey { key: String },

    /// Sleep for a fixed duration in milliseconds.
    WaitMs { ms: u64 },

    /// Sleep for a random duration in milliseconds within [min, max], chosen when
    /// the sequence is planned.
    WaitRandMs { min: u64, max: u64 },

    /// Poll the readiness probe every `poll_ms` until ready or `timeout_ms` elapses.
    WaitUntilReady { timeout_ms: u64, poll_ms: u64 },

    /// Inline the steps of a named block.
    Use { name: String },
}
