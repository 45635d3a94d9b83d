use serde::{Deserialize, Serialize};

/// The role of the participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The character answering through the generation backend.
    Assistant,
}

/// A single entry of a session log.
///
/// Older session files stored bare strings; those still decode and are
/// treated as user messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "StoredMessage")]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredMessage {
    Full { role: Role, content: String },
    Legacy(String),
}

impl From<StoredMessage> for ChatMessage {
    fn from(stored: StoredMessage) -> Self {
        match stored {
            StoredMessage::Full { role, content } => Self { role, content },
            StoredMessage::Legacy(content) => Self::user(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hey")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hey"}"#);
    }

    #[test]
    fn legacy_string_entries_decode_as_user() {
        let messages: Vec<ChatMessage> =
            serde_json::from_str(r#"["hi", {"role":"assistant","content":"hello"}]"#).unwrap();
        assert_eq!(messages[0], ChatMessage::user("hi"));
        assert_eq!(messages[1], ChatMessage::assistant("hello"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result: Result<ChatMessage, _> =
            serde_json::from_str(r#"{"role":"system","content":"x"}"#);
        assert!(result.is_err());
    }
}
