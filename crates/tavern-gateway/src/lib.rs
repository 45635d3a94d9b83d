//! HTTP host for the chat service.

pub mod error;
mod middleware;
mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, GatewayServer};
