//! Runtime configuration loaded from `foreman.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::compact::CompactionConfig;
use crate::error::Error;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct ForemanConfig {
    /// Directory where task directories are created. Default: `./tasks`.
    #[serde(default = "default_tasks_root")]
    pub tasks_root: PathBuf,
    /// Directory for JSONL trace files. Tracing is off when unset.
    pub trace_dir: Option<PathBuf>,
    /// Main agent system prompt.
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub compaction: CompactionToml,
}

fn default_tasks_root() -> PathBuf {
    PathBuf::from("tasks")
}

/// Compaction thresholds as they appear in the TOML file.
#[derive(Debug, Deserialize)]
pub struct CompactionToml {
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_trigger_ratio")]
    pub trigger_ratio: f64,
    #[serde(default = "default_preserve_ratio")]
    pub preserve_ratio: f64,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

fn default_context_window() -> usize {
    200_000
}

fn default_trigger_ratio() -> f64 {
    0.75
}

fn default_preserve_ratio() -> f64 {
    0.25
}

fn default_chars_per_token() -> usize {
    4
}

impl Default for CompactionToml {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            trigger_ratio: default_trigger_ratio(),
            preserve_ratio: default_preserve_ratio(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

impl From<CompactionToml> for CompactionConfig {
    fn from(toml: CompactionToml) -> Self {
        Self {
            context_window: toml.context_window,
            trigger_ratio: toml.trigger_ratio,
            preserve_ratio: toml.preserve_ratio,
            chars_per_token: toml.chars_per_token,
        }
    }
}

impl ForemanConfig {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}
