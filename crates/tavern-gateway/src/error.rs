use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tavern_core::TavernError;
use tracing::{error, warn};

/// Error returned by every handler; renders as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Failure reported by the chat service.
    Service(TavernError),
    /// Request body could not be parsed.
    BadRequest(String),
}

impl From<TavernError> for ApiError {
    fn from(e: TavernError) -> Self {
        ApiError::Service(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl ApiError {
    /// HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(e) => match e {
                TavernError::NotFound { .. } => StatusCode::NOT_FOUND,
                TavernError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                TavernError::Generation(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Service(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
