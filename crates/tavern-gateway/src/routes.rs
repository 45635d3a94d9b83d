use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tavern_agent::{ChatTurn, HistoryEntry};
use tavern_core::{Character, Persona};
use tracing::info;

type Body<T> = Result<Json<T>, JsonRejection>;
type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub character_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCharacterRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePersonaRequest {
    #[serde(rename = "personaId")]
    pub persona_id: String,
}

fn status(value: &str) -> Json<Value> {
    Json(json!({ "status": value }))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "service": "tavern"}))
}

/// `POST /ask`: one chat turn. Model-side failures come back as a normal
/// answer; transport failures map to 502.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Body<ChatTurn>,
) -> ApiResult<Json<AskResponse>> {
    let Json(turn) = payload?;
    let cancel = state.shutdown.child_token();
    let outcome = state.service.chat(turn, &cancel).await?;
    Ok(Json(AskResponse {
        answer: outcome.text(),
    }))
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    payload: Body<ResetRequest>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    state
        .service
        .reset_session(&req.character_id, &req.user_id)
        .await?;
    Ok(status("reset"))
}

pub async fn save_character(
    State(state): State<Arc<AppState>>,
    payload: Body<Character>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(character) = payload?;
    let id = character.id.clone();
    let outcome = state.service.upsert_character(character).await?;
    info!(character_id = %id, outcome = ?outcome, "Character saved");
    Ok((StatusCode::CREATED, status("saved")))
}

pub async fn delete_character(
    State(state): State<Arc<AppState>>,
    payload: Body<DeleteCharacterRequest>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let deletion = state.service.delete_character(&req.id).await?;
    Ok(Json(json!({
        "status": "deleted",
        "sessions_removed": deletion.sessions_removed,
        "image_removed": deletion.image_removed,
    })))
}

pub async fn list_characters(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Character>>> {
    Ok(Json(state.service.list_characters().await?))
}

pub async fn get_character(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Character>> {
    Ok(Json(state.service.get_character(&id).await?))
}

pub async fn save_persona(
    State(state): State<Arc<AppState>>,
    payload: Body<Persona>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(persona) = payload?;
    let id = persona.id.clone();
    let outcome = state.service.upsert_persona(persona).await?;
    info!(persona_id = %id, outcome = ?outcome, "Persona saved");
    Ok((StatusCode::CREATED, status("saved")))
}

pub async fn delete_persona(
    State(state): State<Arc<AppState>>,
    payload: Body<DeletePersonaRequest>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    state.service.delete_persona(&req.persona_id).await?;
    Ok(status("deleted"))
}

pub async fn list_personas(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Persona>>> {
    Ok(Json(state.service.list_personas().await?))
}

pub async fn get_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Persona>> {
    Ok(Json(state.service.get_persona(&id).await?))
}

pub async fn history(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<HistoryEntry>>> {
    Ok(Json(state.service.list_history().await?))
}
