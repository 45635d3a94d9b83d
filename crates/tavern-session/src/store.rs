use crate::key::{character_prefix, SessionKey};
use crate::session::SessionSummary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tavern_core::{ChatMessage, TavernError, TavernResult};
use tracing::{debug, info, warn};

/// Number of messages a session keeps unless configured otherwise.
pub const DEFAULT_WINDOW: usize = 5;

/// Bounded per-(character, user) conversation memory.
///
/// Sessions are soft state: reading a missing or corrupted log yields an
/// empty window rather than an error.
#[async_trait]
pub trait SessionMemory: Send + Sync {
    /// Current window of a session, oldest first.
    async fn load(&self, key: &SessionKey) -> Vec<ChatMessage>;

    /// Append one message, evict the oldest beyond the window, persist, and
    /// return the resulting window. This is the only write path.
    async fn append(&self, key: &SessionKey, message: ChatMessage)
        -> TavernResult<Vec<ChatMessage>>;

    /// Forget a session. Resetting an unknown session is not an error.
    async fn reset(&self, key: &SessionKey) -> TavernResult<()>;

    /// Remove every session of a character. Returns how many logs were removed.
    async fn purge_by_character(&self, character_id: &str) -> TavernResult<usize>;

    /// Summaries of all stored sessions, most recently updated first.
    async fn list(&self) -> TavernResult<Vec<SessionSummary>>;
}

/// Session memory with one JSON array file per session.
///
/// Every read goes to the file under the session's own lock, so a reset
/// made by another process (e.g. `tavern reset` next to `tavern serve`) is
/// seen by the next load or append.
pub struct FileSessionMemory {
    dir: PathBuf,
    window: usize,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileSessionMemory {
    /// Open (and create if needed) the history directory with the default window.
    pub async fn new(dir: PathBuf) -> TavernResult<Self> {
        Self::with_window(dir, DEFAULT_WINDOW).await
    }

    /// Open the history directory keeping at most `window` messages per
    /// session. A zero window is a configuration error.
    pub async fn with_window(dir: PathBuf, window: usize) -> TavernResult<Self> {
        if window == 0 {
            return Err(TavernError::Config(
                "session window must hold at least one message".to_string(),
            ));
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            window,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Messages kept per session.
    pub fn window(&self) -> usize {
        self.window
    }

    /// The history directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lock entry for `key` once nobody else holds or waits on it.
    /// Callers must have dropped their own guard and `Arc` first.
    fn release_lock(&self, key: &str) {
        let mut locks = self.locks.lock();
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().len()
    }

    async fn read_file(&self, path: &Path) -> Vec<ChatMessage> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable session log, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed session log, treating as empty");
                Vec::new()
            }
        }
    }

    async fn write_file(&self, path: &Path, messages: &[ChatMessage]) -> TavernResult<()> {
        let json = serde_json::to_string_pretty(messages)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Keep only the most recent `window` messages.
    fn truncate(&self, messages: &mut Vec<ChatMessage>) {
        if messages.len() > self.window {
            let excess = messages.len() - self.window;
            messages.drain(..excess);
        }
    }

    async fn remove_file(path: &Path) -> TavernResult<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// File stems of every `*.json` session log in the history directory.
    async fn stored_keys(&self) -> TavernResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    keys.push(stem.to_string());
                }
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl SessionMemory for FileSessionMemory {
    async fn load(&self, key: &SessionKey) -> Vec<ChatMessage> {
        let lock = self.key_lock(key.as_str());
        let messages = {
            let _guard = lock.lock().await;
            self.read_file(&self.session_path(key)).await
        };
        drop(lock);
        self.release_lock(key.as_str());
        messages
    }

    async fn append(
        &self,
        key: &SessionKey,
        message: ChatMessage,
    ) -> TavernResult<Vec<ChatMessage>> {
        let lock = self.key_lock(key.as_str());
        let result = {
            let _guard = lock.lock().await;
            let path = self.session_path(key);
            let mut messages = self.read_file(&path).await;
            messages.push(message);
            self.truncate(&mut messages);
            self.write_file(&path, &messages).await.map(|()| messages)
        };
        drop(lock);
        self.release_lock(key.as_str());

        let messages = result?;
        debug!(session_key = %key, len = messages.len(), "Session appended");
        Ok(messages)
    }

    async fn reset(&self, key: &SessionKey) -> TavernResult<()> {
        let lock = self.key_lock(key.as_str());
        let result = {
            let _guard = lock.lock().await;
            Self::remove_file(&self.session_path(key)).await
        };
        drop(lock);
        self.release_lock(key.as_str());

        let removed = result?;
        info!(session_key = %key, removed, "Session reset");
        Ok(())
    }

    async fn purge_by_character(&self, character_id: &str) -> TavernResult<usize> {
        if character_id.trim().is_empty() {
            return Err(TavernError::InvalidInput(
                "character id must not be empty".to_string(),
            ));
        }
        let prefix = character_prefix(character_id);

        let mut removed = 0;
        for key in self.stored_keys().await? {
            if !key.starts_with(&prefix) {
                continue;
            }
            let lock = self.key_lock(&key);
            let result = {
                let _guard = lock.lock().await;
                Self::remove_file(&self.dir.join(format!("{key}.json"))).await
            };
            drop(lock);
            self.release_lock(&key);

            if result? {
                removed += 1;
            }
        }

        info!(character_id = %character_id, removed, "Character sessions purged");
        Ok(removed)
    }

    async fn list(&self) -> TavernResult<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for key in self.stored_keys().await? {
            let path = self.dir.join(format!("{key}.json"));
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let updated_at: DateTime<Utc> = metadata.modified()?.into();
            let messages = self.read_file(&path).await;

            summaries.push(SessionSummary {
                key,
                message_count: messages.len(),
                last_message: messages.last().cloned(),
                updated_at,
            });
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
