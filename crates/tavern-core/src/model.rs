use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A record that can live in an entity store: serializable and keyed by a
/// stable string id.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Human-readable label used in errors and logs (`"character"`).
    const KIND: &'static str;

    /// The stable key of this record.
    fn id(&self) -> &str;
}

/// A character the user can chat with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    /// Stable unique id, usually `name_timestamp`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// One-line hook; sent to the backend as the personality.
    #[serde(default)]
    pub tagline: String,
    /// Public description.
    #[serde(default)]
    pub description: String,
    /// First message shown in a new chat.
    #[serde(default)]
    pub greeting: String,
    /// Long-form definition; sent to the backend as the background.
    #[serde(default)]
    pub definition: String,
    /// Web path of the character image.
    #[serde(default)]
    pub img: String,
    /// Tag category → tag values.
    #[serde(default)]
    pub tags: BTreeMap<String, BTreeSet<String>>,
}

impl Character {
    /// Returns the image path if it points at a user-supplied file rather
    /// than the bundled placeholder.
    pub fn custom_image(&self) -> Option<&str> {
        let img = self.img.trim();
        if img.is_empty() || img.contains("placeholder") {
            None
        } else {
            Some(img)
        }
    }
}

impl Entity for Character {
    const KIND: &'static str = "character";

    fn id(&self) -> &str {
        &self.id
    }
}

/// The identity a user presents to a character.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    /// Stable unique id; matches the user id of a chat turn.
    pub id: String,
    /// Name the character addresses the user by.
    #[serde(default, alias = "displayName")]
    pub display_name: String,
    /// What the character knows about the user.
    #[serde(default)]
    pub background: String,
    /// Web path of the persona avatar.
    #[serde(default)]
    pub img: String,
}

impl Entity for Persona {
    const KIND: &'static str = "persona";

    fn id(&self) -> &str {
        &self.id
    }
}
