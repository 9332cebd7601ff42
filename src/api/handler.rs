use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::LeaderboardService;
use crate::models::{AddScore, ScoreEntry};

/// Header carrying the submitting client's identity.
pub const CLIENT_ID_HEADER: &str = "ClientId";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeaderboardService>,
    pub version: String,
}

impl AppState {
    pub fn new(service: Arc<LeaderboardService>, version: impl Into<String>) -> Self {
        Self {
            service,
            version: version.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    #[serde(rename = "topPlayers")]
    pub top_players: Vec<ScoreEntry>,
}

pub async fn version_handler(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.version.clone(),
    })
}

pub async fn health_handler(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.service.health().await?;
    Ok("OK")
}

#[tracing::instrument(skip(state, headers, body))]
pub async fn save_score_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ScoreRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let command = score_command(&headers, body)?;
    info!(client_id = %command.client_id, score = command.score, "Saving score");

    state.service.add(&command).await?;
    Ok(Json(StatusResponse { status: "ok" }))
}

#[tracing::instrument(skip(state, headers, body))]
pub async fn save_score_ignore_duplicate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ScoreRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let command = score_command(&headers, body)?;
    info!(client_id = %command.client_id, score = command.score, "Saving duplicate-tolerant score");

    state.service.add_ignore_duplicate(&command).await?;
    Ok(Json(StatusResponse { status: "ok" }))
}

#[tracing::instrument(skip(state))]
pub async fn get_leaderboard_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let top_players = state.service.get_leaderboard().await?;
    Ok(Json(LeaderboardResponse { top_players }))
}

/// Combine the `ClientId` header and the JSON body into a submission.
///
/// The header is checked first so a missing identity is reported even when
/// the body is also bad.
fn score_command(
    headers: &HeaderMap,
    body: Result<Json<ScoreRequest>, JsonRejection>,
) -> ApiResult<AddScore> {
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} header is required", CLIENT_ID_HEADER)))?;

    let Json(request) = body?;

    Ok(AddScore::new(client_id, request.score))
}
