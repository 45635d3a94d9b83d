use crate::middleware::trace_requests;
use crate::routes;
use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tavern_agent::ChatService;
use tokio_util::sync::CancellationToken;

/// Shared application state.
pub struct AppState {
    /// Operations behind every route.
    pub service: Arc<ChatService>,
    /// Cancelled on shutdown; in-flight generations observe a child token.
    pub shutdown: CancellationToken,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router with a shutdown token nobody cancels.
    pub fn build(service: Arc<ChatService>) -> Router {
        Self::build_with_shutdown(service, CancellationToken::new())
    }

    /// Build the router; cancelling `shutdown` aborts pending generation calls.
    pub fn build_with_shutdown(service: Arc<ChatService>, shutdown: CancellationToken) -> Router {
        let state = Arc::new(AppState { service, shutdown });

        Router::new()
            .route("/health", get(routes::health))
            .route("/ask", post(routes::ask))
            .route("/reset", post(routes::reset))
            .route("/save-character", post(routes::save_character))
            .route("/delete-character", post(routes::delete_character))
            .route("/characters", get(routes::list_characters))
            .route("/characters/{id}", get(routes::get_character))
            .route("/save-persona", post(routes::save_persona))
            .route("/delete-persona", post(routes::delete_persona))
            .route("/personas", get(routes::list_personas))
            .route("/personas/{id}", get(routes::get_persona))
            .route("/history", get(routes::history))
            .layer(axum_mw::from_fn(trace_requests))
            .with_state(state)
    }
}
