use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tavern_core::ChatMessage;

/// Overview of one stored session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// The session key (`characterID_userID`).
    pub key: String,
    /// Number of messages currently in the window.
    pub message_count: usize,
    /// Most recent message, if any.
    pub last_message: Option<ChatMessage>,
    /// Last modification time of the session file.
    pub updated_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Whether this session belongs to the given character.
    pub fn belongs_to(&self, character_id: &str) -> bool {
        self.key.starts_with(&crate::key::character_prefix(character_id))
    }
}
