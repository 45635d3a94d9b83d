use serde::{Deserialize, Serialize};
use tavern_session::DEFAULT_WINDOW;

/// Where and how to reach the text-generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Scheme, host and port; `/generate` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for one generation call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Model used when a chat request names none. Falls back to
    /// [`crate::assembler::DEFAULT_MODEL`] when unset.
    #[serde(default)]
    pub default_model: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:5050".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            default_model: None,
        }
    }
}

impl BackendConfig {
    /// Full URL of the generation endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url.trim_end_matches('/'))
    }
}

/// Session memory tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Messages kept per session.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Append the character's answer to the session after a successful turn.
    #[serde(default = "default_record_replies")]
    pub record_replies: bool,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_record_replies() -> bool {
    true
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            record_replies: default_record_replies(),
        }
    }
}
