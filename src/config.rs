use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid editor config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Size caps for embedded block payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadLimits {
    pub max_structural_bytes: usize,
    pub max_auxiliary_bytes: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_structural_bytes: 1024 * 1024, // 1 MB
            max_auxiliary_bytes: 500 * 1024,   // 500 KB
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo entries.
    pub history_depth: usize,
    /// Typing pause after which the next keystroke starts a new undo entry.
    pub coalesce_window_ms: u64,
    /// Scheme prepended to links typed without one.
    pub default_link_scheme: String,
    pub link_protocols: Vec<String>,
    pub embed_protocols: Vec<String>,
    pub limits: PayloadLimits,
    pub focus_delay_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            coalesce_window_ms: 500,
            default_link_scheme: "https".to_string(),
            link_protocols: ["http", "https", "mailto", "tel"]
                .map(String::from)
                .to_vec(),
            embed_protocols: ["http", "https"].map(String::from).to_vec(),
            limits: PayloadLimits::default(),
            focus_delay_ms: 0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let mut config: EditorConfig = serde_json::from_str(input)?;
        config.history_depth = config.history_depth.max(1);
        Ok(config)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }
}
