//! Sliding-window conversation memory, one JSON log per (character, user).

pub mod key;
pub mod session;
pub mod store;

pub use key::{character_prefix, validate_id, SessionKey};
pub use session::SessionSummary;
pub use store::{FileSessionMemory, SessionMemory, DEFAULT_WINDOW};
