//! File-backed entity stores for characters and personas.
//!
//! - [`EntityStore`] — load-all / upsert / delete contract over any [`tavern_core::Entity`].
//! - [`JsonEntityStore`] — one pretty-printed JSON array file per entity type.

pub mod store;

pub use store::{EntityStore, JsonEntityStore, UpsertOutcome};
