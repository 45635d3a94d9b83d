use crate::assembler::assemble;
use crate::client::{GenerationClient, GenerationOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tavern_core::{Character, ChatMessage, Persona, TavernError, TavernResult};
use tavern_session::{validate_id, SessionKey, SessionMemory};
use tavern_store::{EntityStore, UpsertOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One user turn in a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Character being talked to.
    pub character_id: String,
    /// Speaking user; also the id of their persona, if any.
    pub user_id: String,
    /// The user's message.
    pub question: String,
    /// Free-form style hint forwarded to the backend when non-empty.
    #[serde(default)]
    pub style: String,
    /// Backend model; empty means the configured default.
    #[serde(default)]
    pub model: String,
}

/// Behaviour switches for [`ChatService`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Model used when a turn names none.
    pub default_model: Option<String>,
    /// Append successful answers to the session as assistant messages.
    pub record_replies: bool,
    /// Root that character `img` paths are resolved against on delete.
    /// `None` disables image cleanup.
    pub assets_dir: Option<PathBuf>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_model: None,
            record_replies: true,
            assets_dir: None,
        }
    }
}

/// What a character delete removed.
#[derive(Debug, Clone, Serialize)]
pub struct CharacterDeletion {
    /// The removed record.
    pub character: Character,
    /// Session logs purged with it.
    pub sessions_removed: usize,
    /// Whether a custom image file was deleted.
    pub image_removed: bool,
}

/// A stored session joined with its character, when that still exists.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Stored key (`characterID_userID`).
    pub session_key: String,
    /// Owning character, when it still exists.
    pub character_id: Option<String>,
    /// User half of the key, when the owner is known.
    pub user_id: Option<String>,
    /// Display name of the owning character.
    pub character_name: Option<String>,
    /// Image of the owning character, if it has one.
    pub img: Option<String>,
    /// Messages in the stored window.
    pub message_count: usize,
    /// Most recent message.
    pub last_message: Option<ChatMessage>,
    /// Last write to the session log.
    pub updated_at: DateTime<Utc>,
}

/// Orchestrates stores, session memory, and the generation backend.
///
/// Turn order is append user message, assemble, dispatch. A hard
/// generation failure leaves the user message recorded.
pub struct ChatService {
    characters: Arc<dyn EntityStore<Character>>,
    personas: Arc<dyn EntityStore<Persona>>,
    sessions: Arc<dyn SessionMemory>,
    client: Arc<dyn GenerationClient>,
    settings: ChatSettings,
}

impl ChatService {
    /// Wire the service over its stores and backend client.
    pub fn new(
        characters: Arc<dyn EntityStore<Character>>,
        personas: Arc<dyn EntityStore<Persona>>,
        sessions: Arc<dyn SessionMemory>,
        client: Arc<dyn GenerationClient>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            characters,
            personas,
            sessions,
            client,
            settings,
        }
    }

    /// Active behaviour switches.
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Run one chat turn and return the backend's outcome.
    ///
    /// Model-side failures come back as [`GenerationOutcome::ModelError`];
    /// transport failures and cancellation are `Err(Generation)`.
    pub async fn chat(
        &self,
        turn: ChatTurn,
        cancel: &CancellationToken,
    ) -> TavernResult<GenerationOutcome> {
        if turn.question.trim().is_empty() {
            return Err(TavernError::InvalidInput("question must not be empty".into()));
        }

        let character = self.characters.get(&turn.character_id).await?;
        let key = SessionKey::new(&turn.character_id, &turn.user_id)?;
        let persona = self.resolve_persona(&turn.user_id).await?;

        info!(
            session_key = %key,
            persona = persona.is_some(),
            "Starting chat turn"
        );

        let memory = self
            .sessions
            .append(&key, ChatMessage::user(&turn.question))
            .await?;

        let model = match turn.model.trim() {
            "" => self.settings.default_model.clone().unwrap_or_default(),
            m => m.to_string(),
        };
        let request = assemble(
            &character,
            persona.as_ref(),
            memory,
            &turn.question,
            &turn.style,
            &model,
        );

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(session_key = %key, "Chat turn cancelled; user message kept");
                return Err(TavernError::Generation("generation cancelled".into()));
            }
            result = self.client.generate(&request) => match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(session_key = %key, error = %e, "Generation failed; user message kept");
                    return Err(e);
                }
            },
        };

        if let GenerationOutcome::Answer(text) = &outcome {
            if self.settings.record_replies {
                // Best-effort: the answer is returned even if it cannot be recorded.
                if let Err(e) = self.sessions.append(&key, ChatMessage::assistant(text)).await {
                    warn!(session_key = %key, error = %e, "Failed to record reply");
                }
            }
        }

        debug!(session_key = %key, model_error = outcome.is_model_error(), "Chat turn finished");
        Ok(outcome)
    }

    async fn resolve_persona(&self, user_id: &str) -> TavernResult<Option<Persona>> {
        match self.personas.get(user_id).await {
            Ok(p) => Ok(Some(p)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Forget one (character, user) conversation.
    pub async fn reset_session(&self, character_id: &str, user_id: &str) -> TavernResult<()> {
        let key = SessionKey::new(character_id, user_id)?;
        self.sessions.reset(&key).await?;
        info!(session_key = %key, "Session reset");
        Ok(())
    }

    /// Insert or replace a character. Its id must be usable in a session key.
    pub async fn upsert_character(&self, character: Character) -> TavernResult<UpsertOutcome> {
        validate_id("character id", &character.id)?;
        self.characters.upsert(character).await
    }

    /// Delete a character, then its sessions, then its custom image.
    pub async fn delete_character(&self, id: &str) -> TavernResult<CharacterDeletion> {
        let character = self.characters.delete_by_id(id).await?;
        let sessions_removed = self.sessions.purge_by_character(id).await?;
        let image_removed = match character.custom_image() {
            Some(img) => self.remove_image(img).await,
            None => false,
        };

        info!(
            character_id = %id,
            sessions_removed,
            image_removed,
            "Character deleted"
        );
        Ok(CharacterDeletion {
            character,
            sessions_removed,
            image_removed,
        })
    }

    /// Best-effort image cleanup; failures are logged, never returned.
    async fn remove_image(&self, img: &str) -> bool {
        let Some(root) = &self.settings.assets_dir else {
            return false;
        };
        let Some(path) = resolve_asset(root, img) else {
            warn!(img = %img, "Refusing to remove image outside the assets directory");
            return false;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove character image");
                false
            }
        }
    }

    /// Look up one character; `NotFound` when absent.
    pub async fn get_character(&self, id: &str) -> TavernResult<Character> {
        self.characters.get(id).await
    }

    /// Every stored character, in file order.
    pub async fn list_characters(&self) -> TavernResult<Vec<Character>> {
        self.characters.load_all().await
    }

    /// Insert or replace a persona. Persona ids double as user ids, so the
    /// same session-key rule applies.
    pub async fn upsert_persona(&self, persona: Persona) -> TavernResult<UpsertOutcome> {
        validate_id("persona id", &persona.id)?;
        self.personas.upsert(persona).await
    }

    /// Delete a persona. Sessions are left untouched.
    pub async fn delete_persona(&self, id: &str) -> TavernResult<Persona> {
        self.personas.delete_by_id(id).await
    }

    /// Look up one persona; `NotFound` when absent.
    pub async fn get_persona(&self, id: &str) -> TavernResult<Persona> {
        self.personas.get(id).await
    }

    /// Every stored persona, in file order.
    pub async fn list_personas(&self) -> TavernResult<Vec<Persona>> {
        self.personas.load_all().await
    }

    /// Stored sessions, newest first, with character name and image filled
    /// in when the owning character is still known.
    pub async fn list_history(&self) -> TavernResult<Vec<HistoryEntry>> {
        let summaries = self.sessions.list().await?;
        let characters = self.characters.load_all().await?;

        Ok(summaries
            .into_iter()
            .map(|summary| {
                // Longest id wins so "a_1" does not shadow "a_1_b".
                let owner = characters
                    .iter()
                    .filter(|c| summary.belongs_to(&c.id))
                    .max_by_key(|c| c.id.len());
                let user_id = owner.map(|c| summary.key[c.id.len() + 1..].to_string());

                HistoryEntry {
                    character_id: owner.map(|c| c.id.clone()),
                    user_id,
                    character_name: owner.map(|c| c.name.clone()),
                    img: owner.map(|c| c.img.clone()).filter(|s| !s.is_empty()),
                    message_count: summary.message_count,
                    last_message: summary.last_message,
                    updated_at: summary.updated_at,
                    session_key: summary.key,
                }
            })
            .collect())
    }
}

/// Join a web-style image path onto the assets root, rejecting anything
/// that could escape it.
fn resolve_asset(root: &Path, img: &str) -> Option<PathBuf> {
    let relative = Path::new(img.trim_start_matches('/'));
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (safe && relative.components().next().is_some()).then(|| root.join(relative))
}
