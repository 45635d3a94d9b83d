use crate::assembler::GenerationRequest;
use crate::config::BackendConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tavern_core::{TavernError, TavernResult};
use tracing::{debug, warn};

/// Result of a generation call that reached the backend and got a
/// well-formed answer back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The character's reply.
    Answer(String),
    /// The backend reported its own failure (`status != "success"`).
    ModelError(String),
}

impl GenerationOutcome {
    /// Text shown to the user. Model-side failures are rendered inline
    /// instead of surfacing as transport errors.
    pub fn text(&self) -> String {
        match self {
            Self::Answer(text) => text.clone(),
            Self::ModelError(detail) => format!("[Erreur modèle: {detail}]"),
        }
    }

    /// True for a backend-reported failure.
    pub fn is_model_error(&self) -> bool {
        matches!(self, Self::ModelError(_))
    }
}

/// Something that turns a [`GenerationRequest`] into a reply.
///
/// `Err` is reserved for hard failures: unreachable backend, timeout,
/// non-2xx status, or an unreadable body.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send one request and wait for the reply.
    async fn generate(&self, request: &GenerationRequest) -> TavernResult<GenerationOutcome>;
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    response: Option<serde_json::Value>,
}

/// Decode the backend's `{status, response}` envelope.
///
/// A missing `status` counts as success. Any shape other than a JSON object
/// with a string `response` on success is a hard failure.
pub fn decode_envelope(body: &[u8]) -> TavernResult<GenerationOutcome> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| TavernError::Generation(format!("unreadable backend response: {e}")))?;

    match envelope.status.as_deref() {
        Some(status) if status != "success" => {
            let detail = match envelope.response {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Null) | None => format!("status {status}"),
                Some(other) => other.to_string(),
            };
            Ok(GenerationOutcome::ModelError(detail))
        }
        _ => match envelope.response {
            Some(serde_json::Value::String(text)) => Ok(GenerationOutcome::Answer(text)),
            Some(_) => Err(TavernError::Generation(
                "backend 'response' field is not a string".into(),
            )),
            None => Err(TavernError::Generation(
                "backend response has no 'response' field".into(),
            )),
        },
    }
}

/// HTTP client for a `POST {base_url}/generate` backend.
pub struct HttpGenerationClient {
    url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpGenerationClient {
    /// Build a client whose every call is bounded by `config.timeout_secs`.
    pub fn new(config: &BackendConfig) -> TavernResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TavernError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: config.generate_url(),
            timeout,
            http,
        })
    }

    /// Endpoint requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> TavernResult<GenerationOutcome> {
        debug!(
            url = %self.url,
            model = %request.model,
            character_id = %request.character_id,
            memory = request.memory.len(),
            "Sending generation request"
        );

        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TavernError::Generation(format!(
                        "backend timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    TavernError::Generation(format!("backend unreachable: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TavernError::Generation(format!(
                "backend error {status}: {error_body}"
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| TavernError::Generation(format!("failed to read backend body: {e}")))?;

        let outcome = decode_envelope(&body)?;
        if let GenerationOutcome::ModelError(detail) = &outcome {
            warn!(model = %request.model, detail = %detail, "Backend reported a model error");
        }
        Ok(outcome)
    }
}
