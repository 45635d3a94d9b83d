//! Prompt assembly, the generation backend client, and the chat service
//! that ties stores and session memory together.

pub mod assembler;
pub mod client;
pub mod config;
pub mod service;

pub use assembler::{assemble, GenerationRequest, PersonaFields, RequestKind, DEFAULT_MODEL};
pub use client::{decode_envelope, GenerationClient, GenerationOutcome, HttpGenerationClient};
pub use config::{BackendConfig, MemoryConfig};
pub use service::{CharacterDeletion, ChatService, ChatSettings, ChatTurn, HistoryEntry};
