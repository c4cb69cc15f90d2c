//! Hot-reloaded engine settings.
//!
//! Settings live in a small JSON document (usually `settings.json` next to the
//! workspace). The engine re-reads it at the start of every run, so edits to
//! enabled tools, prompts or token limits apply to the next message without a
//! restart.
//!
//! ```json
//! {
//!   "max_iterations": 25,
//!   "max_tokens": 4096,
//!   "summary": { "keep_messages": 20 },
//!   "modes": {
//!     "outline": { "enabled_tools": ["read_file", "list_files", "ask_user"] },
//!     "writing": { "prompt": "Write in first person.", "max_tokens": 8192 }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use scribe_core::mode::Mode;
use scribe_core::prompts;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_ITERATIONS: usize = 25;
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_KEEP_MESSAGES: usize = 20;

/// Per-mode overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModeSettings {
    /// Tool names exposed in this mode. `None` exposes every catalog tool.
    #[serde(default)]
    pub enabled_tools: Option<Vec<String>>,
    /// Replaces the built-in system instructions when non-blank.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummarySettings {
    /// Trailing messages kept verbatim when history is folded into the summary.
    #[serde(default = "default_keep_messages")]
    pub keep_messages: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            keep_messages: DEFAULT_KEEP_MESSAGES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub modes: HashMap<Mode, ModeSettings>,
    /// Model calls allowed per run before the engine gives up.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub summary: SummarySettings,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_keep_messages() -> usize {
    DEFAULT_KEEP_MESSAGES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            modes: HashMap::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: DEFAULT_MAX_TOKENS,
            summary: SummarySettings::default(),
        }
    }
}

impl Settings {
    pub fn mode(&self, mode: Mode) -> Option<&ModeSettings> {
        self.modes.get(&mode)
    }

    /// Enabled tool names for `mode`, or `None` when every tool is allowed.
    pub fn enabled_tools(&self, mode: Mode) -> Option<&[String]> {
        self.mode(mode)
            .and_then(|settings| settings.enabled_tools.as_deref())
    }

    pub fn system_prompt(&self, mode: Mode) -> String {
        let custom = self.mode(mode).and_then(|settings| settings.prompt.as_deref());
        prompts::prompt_for(mode, custom)
    }

    pub fn max_tokens(&self, mode: Mode) -> u32 {
        self.mode(mode)
            .and_then(|settings| settings.max_tokens)
            .unwrap_or(self.max_tokens)
    }

    /// Overrides for one mode, used by tests and embedders.
    pub fn with_mode(mut self, mode: Mode, settings: ModeSettings) -> Self {
        self.modes.insert(mode, settings);
        self
    }
}

/// Where settings come from.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// Re-read from disk on every run.
    File(PathBuf),
    Fixed(Settings),
}

impl Default for SettingsSource {
    fn default() -> Self {
        SettingsSource::Fixed(Settings::default())
    }
}

impl SettingsSource {
    /// Current settings. A missing file yields defaults; an unreadable or
    /// malformed one is logged and also yields defaults, so a bad edit never
    /// takes the engine down.
    pub async fn load(&self) -> Settings {
        let path = match self {
            SettingsSource::Fixed(settings) => return settings.clone(),
            SettingsSource::File(path) => path,
        };

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file; using defaults");
                return Settings::default();
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read settings; using defaults");
                return Settings::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Malformed settings file; using defaults");
                Settings::default()
            }
        }
    }
}
