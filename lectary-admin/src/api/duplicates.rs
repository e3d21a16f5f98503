//! Duplicate detection and merge API handlers
//!
//! GET /duplicates, POST /duplicates/merge, GET/POST /duplicates/history,
//! POST /duplicates/history/reset

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::history;
use crate::error::ApiResult;
use crate::models::{DetectionReport, EntityKind, HistoryAction, MergeHistoryEntry};
use crate::services::{DuplicateDetector, MergeEngine};
use crate::AppState;

pub fn duplicate_routes() -> Router<AppState> {
    Router::new()
        .route("/duplicates", get(detect_duplicates))
        .route("/duplicates/merge", post(merge_entities))
        .route("/duplicates/history", get(list_history).post(record_history))
        .route("/duplicates/history/reset", post(reset_history))
}

/// POST /duplicates/merge request
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub keep_id: i64,
    pub keep_type: EntityKind,
    pub delete_id: i64,
    pub delete_type: EntityKind,
}

/// POST /duplicates/history request
#[derive(Debug, Deserialize)]
pub struct RecordHistoryRequest {
    pub group_sig: String,
    pub action: HistoryAction,
    #[serde(default)]
    pub keep_type: Option<EntityKind>,
}

/// GET /duplicates/history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<MergeHistoryEntry>,
}

/// GET /duplicates
///
/// Run a detection pass: fresh exact/similar groups minus declined ones,
/// with approved groups auto-merged and reported separately.
async fn detect_duplicates(State(state): State<AppState>) -> ApiResult<Json<DetectionReport>> {
    let detector = DuplicateDetector::new(state.db.clone(), state.storage.clone());
    let report = detector.detect().await?;

    Ok(Json(report))
}

/// POST /duplicates/merge
async fn merge_entities(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Json<Value>> {
    let engine = MergeEngine::new(state.db.clone(), state.storage.clone());
    engine
        .merge(
            request.keep_id,
            request.keep_type,
            request.delete_id,
            request.delete_type,
        )
        .await?;

    Ok(Json(json!({ "status": "merged" })))
}

/// POST /duplicates/history
async fn record_history(
    State(state): State<AppState>,
    Json(request): Json<RecordHistoryRequest>,
) -> ApiResult<Json<Value>> {
    history::record_decision(&state.db, &request.group_sig, request.action, request.keep_type)
        .await?;

    Ok(Json(json!({ "status": "recorded" })))
}

/// GET /duplicates/history
async fn list_history(State(state): State<AppState>) -> ApiResult<Json<HistoryResponse>> {
    let entries = history::list_decisions(&state.db).await?;
    Ok(Json(HistoryResponse { entries }))
}

/// POST /duplicates/history/reset
///
/// Clear the ledger so previously decided groups surface again.
async fn reset_history(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = history::reset(&state.db).await?;
    Ok(Json(json!({ "status": "reset", "removed": removed })))
}
