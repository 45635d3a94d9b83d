use async_trait::async_trait;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tavern_core::{Entity, TavernError, TavernResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What an [`EntityStore::upsert`] call did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record had this id; the entity was appended.
    Inserted,
    /// The first record with this id was replaced in place.
    Replaced,
}

/// A collection of uniquely-identified records.
///
/// Every mutation is a read-modify-write over the whole collection; there
/// are no partial writes. Deleting never cascades: callers use the returned
/// entity to clean up whatever depended on it.
#[async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    /// Every stored record, in insertion order.
    async fn load_all(&self) -> TavernResult<Vec<T>>;

    /// Replace the record with the same id, or append it.
    async fn upsert(&self, entity: T) -> TavernResult<UpsertOutcome>;

    /// Remove the record with this id and return it.
    async fn delete_by_id(&self, id: &str) -> TavernResult<T>;

    /// Look up a single record. Absence is [`TavernError::NotFound`].
    async fn get(&self, id: &str) -> TavernResult<T> {
        self.load_all()
            .await?
            .into_iter()
            .find(|e| e.id() == id)
            .ok_or_else(|| TavernError::not_found(T::KIND, id))
    }
}

/// Entity store backed by one pretty-printed JSON array file.
///
/// Mutations are serialized by an async lock around the read-modify-write
/// cycle, and the file is replaced through a temporary sibling + rename so
/// readers never observe a half-written array.
pub struct JsonEntityStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> JsonEntityStore<T> {
    /// Store backed by `path`. Nothing is read or created until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _entity: PhantomData,
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> TavernResult<Vec<T>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|e| {
            TavernError::Decode(format!("{} ({}): {e}", self.path.display(), T::KIND))
        })
    }

    async fn write_file(&self, entities: &[T]) -> TavernResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(entities)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = entities.len(), "Entity file written");
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> EntityStore<T> for JsonEntityStore<T> {
    async fn load_all(&self) -> TavernResult<Vec<T>> {
        self.read_file().await
    }

    async fn upsert(&self, entity: T) -> TavernResult<UpsertOutcome> {
        if entity.id().trim().is_empty() {
            return Err(TavernError::InvalidInput(format!(
                "{} id must not be empty",
                T::KIND
            )));
        }

        let _guard = self.write_lock.lock().await;
        let mut entities = self.read_file().await?;

        let outcome = match entities.iter_mut().find(|e| e.id() == entity.id()) {
            Some(slot) => {
                *slot = entity;
                UpsertOutcome::Replaced
            }
            None => {
                entities.push(entity);
                UpsertOutcome::Inserted
            }
        };

        self.write_file(&entities).await?;
        info!(kind = T::KIND, outcome = ?outcome, total = entities.len(), "Entity saved");
        Ok(outcome)
    }

    async fn delete_by_id(&self, id: &str) -> TavernResult<T> {
        let _guard = self.write_lock.lock().await;
        let entities = self.read_file().await?;

        let mut removed = None;
        let mut kept = Vec::with_capacity(entities.len());
        for entity in entities {
            if removed.is_none() && entity.id() == id {
                removed = Some(entity);
            } else if entity.id() != id {
                kept.push(entity);
            }
        }

        let Some(removed) = removed else {
            return Err(TavernError::not_found(T::KIND, id));
        };

        self.write_file(&kept).await?;
        info!(kind = T::KIND, id = %id, "Entity deleted");
        Ok(removed)
    }
}
