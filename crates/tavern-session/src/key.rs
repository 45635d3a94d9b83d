use std::fmt;
use tavern_core::{TavernError, TavernResult};

/// Separator between the character id and the user id in a session key.
pub const SEPARATOR: char = '_';

/// Deterministic identifier of a (character, user) conversation.
///
/// The key is `characterID + "_" + userID`. It doubles as the file stem of
/// the session log, so it must stay stable across restarts and must never
/// contain a path separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    key: String,
    character_len: usize,
}

impl SessionKey {
    /// Derive the key for a character/user pair.
    pub fn new(character_id: &str, user_id: &str) -> TavernResult<Self> {
        validate_id("character id", character_id)?;
        validate_id("user id", user_id)?;
        Ok(Self {
            key: format!("{character_id}{SEPARATOR}{user_id}"),
            character_len: character_id.len(),
        })
    }

    /// The full key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The character half of the key.
    pub fn character_id(&self) -> &str {
        &self.key[..self.character_len]
    }

    /// The user half of the key.
    pub fn user_id(&self) -> &str {
        &self.key[self.character_len + SEPARATOR.len_utf8()..]
    }

    /// File name of the session log inside the history directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.key)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Prefix shared by every session key that belongs to `character_id`.
///
/// The trailing separator keeps `c1` from matching sessions of `c10`.
pub fn character_prefix(character_id: &str) -> String {
    format!("{character_id}{SEPARATOR}")
}

/// Check that `value` can be one half of a session key: non-blank, with no
/// path separator, NUL, or `.`/`..` component. `label` names the value in the
/// error message.
pub fn validate_id(label: &str, value: &str) -> TavernResult<()> {
    if value.trim().is_empty() {
        return Err(TavernError::InvalidInput(format!("{label} must not be empty")));
    }
    if value.contains(['/', '\\', '\0']) || value == "." || value == ".." {
        return Err(TavernError::InvalidInput(format!(
            "{label} '{value}' cannot be used in a session file name"
        )));
    }
    Ok(())
}
