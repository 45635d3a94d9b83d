//! Core types and error definitions for Tavern.
//!
//! This crate provides the foundational types shared across all Tavern crates.
//!
//! # Main types
//!
//! - [`TavernError`] — Unified error enum for all Tavern subsystems.
//! - [`TavernResult`] — Convenience alias for `Result<T, TavernError>`.
//! - [`Entity`] — A record keyed by a stable string id, storable in an entity store.
//! - [`Character`] / [`Persona`] — The two stored entity kinds.
//! - [`ChatMessage`] / [`Role`] — One entry of a session log.

pub mod error;
pub mod message;
pub mod model;

pub use error::{TavernError, TavernResult};
pub use message::{ChatMessage, Role};
pub use model::{Character, Entity, Persona};
