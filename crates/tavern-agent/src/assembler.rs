use serde::Serialize;
use tavern_core::{Character, ChatMessage, Persona};

/// Model requested when neither the caller nor the configuration names one.
pub const DEFAULT_MODEL: &str = "dolphin-mistral";

/// Discriminator expected by the backend for roleplay prompts.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Roleplay as a stored character.
    Character,
}

/// Persona fields sent to the backend. Present only when a persona was
/// resolved, so an absent persona leaves no keys behind.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PersonaFields {
    /// Persona id (the user id).
    pub persona_id: String,
    /// Persona display name.
    pub user_persona_name: String,
    /// Persona background text.
    pub user_persona_background: String,
}

/// One generation call's payload. Built per turn and never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Backend model identifier, never empty.
    pub model: String,
    /// Character id.
    pub character_id: String,
    /// Character display name.
    pub character_name: String,
    /// Character description.
    pub character_description: String,
    /// Carries the character's tagline.
    pub character_personality: String,
    /// Carries the character's definition.
    pub character_background: String,
    /// The new user message.
    pub user_message: String,
    /// Session window, already including `user_message`.
    pub memory: Vec<ChatMessage>,
    /// Style hint, omitted when blank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Persona keys, flattened into the top level when present.
    #[serde(flatten)]
    pub persona: Option<PersonaFields>,
}

/// Combine a character, an optional persona, and the session window into a
/// backend request. Pure: no I/O.
///
/// An empty `model` resolves to [`DEFAULT_MODEL`]; an empty `style` is
/// omitted from the payload.
pub fn assemble(
    character: &Character,
    persona: Option<&Persona>,
    memory: Vec<ChatMessage>,
    question: &str,
    style: &str,
    model: &str,
) -> GenerationRequest {
    let model = match model.trim() {
        "" => DEFAULT_MODEL.to_string(),
        m => m.to_string(),
    };
    let style = match style.trim() {
        "" => None,
        s => Some(s.to_string()),
    };

    GenerationRequest {
        kind: RequestKind::Character,
        model,
        character_id: character.id.clone(),
        character_name: character.name.clone(),
        character_description: character.description.clone(),
        character_personality: character.tagline.clone(),
        character_background: character.definition.clone(),
        user_message: question.to_string(),
        memory,
        style,
        persona: persona.map(|p| PersonaFields {
            persona_id: p.id.clone(),
            user_persona_name: p.display_name.clone(),
            user_persona_background: p.background.clone(),
        }),
    }
}
