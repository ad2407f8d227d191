//! HTTP API for comparing and ranking items
//!
//! Every handler runs its engine call on the blocking pool, since collection
//! operations take a mutex and may touch the filesystem.

use crate::collection::CollectionManager;
use crate::error::{arena_error, ArenaError, Result};
use crate::service::app::AppState;
use crate::types::{ItemId, ItemStanding, MatchPair, TagStanding, VoteRequest};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Create the router for the `/api` routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/subsets", get(list_subsets))
        .route("/api/images/{subset}", get(list_images))
        .route("/api/match/{subset}", get(next_match))
        .route("/api/elo-rankings/{subset}", get(item_rankings))
        .route("/api/lora-rankings/{subset}", get(tag_rankings))
        .route("/api/vote/{subset}", post(record_vote))
        .route("/api/image/{subset}/{image}", delete(delete_image))
        .with_state(state)
}

/// Error returned by API handlers, rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match arena_error(&self.0) {
            Some(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(ArenaError::InsufficientItems { .. }) => StatusCode::CONFLICT,
            Some(ArenaError::InvalidRequest { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl From<ArenaError> for ApiError {
    fn from(error: ArenaError) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        } else {
            debug!("Request rejected ({}): {}", status, self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Run a manager operation on the blocking pool
async fn run_blocking<T, F>(state: &AppState, operation: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&CollectionManager) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let manager = state.manager();
    let result = tokio::task::spawn_blocking(move || operation(&manager))
        .await
        .map_err(|e| ArenaError::Internal {
            message: format!("Worker task failed: {}", e),
        })?;

    Ok(result?)
}

async fn list_subsets(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let subsets = run_blocking(&state, |manager| manager.list_collections()).await?;
    Ok(Json(subsets))
}

async fn list_images(
    State(state): State<Arc<AppState>>,
    Path(subset): Path<String>,
) -> ApiResult<Vec<ItemId>> {
    let items = run_blocking(&state, move |manager| manager.list_items(&subset)).await?;
    Ok(Json(items))
}

async fn next_match(
    State(state): State<Arc<AppState>>,
    Path(subset): Path<String>,
) -> ApiResult<MatchPair> {
    let pair = run_blocking(&state, move |manager| manager.next_pair(&subset)).await?;
    Ok(Json(pair))
}

async fn item_rankings(
    State(state): State<Arc<AppState>>,
    Path(subset): Path<String>,
) -> ApiResult<Vec<ItemStanding>> {
    let rankings = run_blocking(&state, move |manager| manager.item_rankings(&subset)).await?;
    Ok(Json(rankings))
}

async fn tag_rankings(
    State(state): State<Arc<AppState>>,
    Path(subset): Path<String>,
) -> ApiResult<Vec<TagStanding>> {
    let rankings = run_blocking(&state, move |manager| manager.tag_rankings(&subset)).await?;
    Ok(Json(rankings))
}

async fn record_vote(
    State(state): State<Arc<AppState>>,
    Path(subset): Path<String>,
    body: std::result::Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<serde_json::Value> {
    let Json(request) = body.map_err(|rejection| {
        warn!("Malformed vote for '{}': {}", subset, rejection.body_text());
        ArenaError::InvalidRequest {
            reason: rejection.body_text(),
        }
    })?;

    run_blocking(&state, move |manager| {
        manager.record_vote(&subset, &request.winner, &request.loser)
    })
    .await?;

    Ok(Json(json!({ "message": "Vote recorded" })))
}

async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path((subset, image)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    run_blocking(&state, move |manager| manager.delete_item(&subset, &image)).await?;
    Ok(Json(json!({ "message": "Image and caption deleted" })))
}
