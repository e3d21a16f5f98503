//! Entity catalog API handlers
//!
//! Entity CRUD, soft delete into backup records, restore, and AI-assisted
//! description generation.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{backups, entities};
use crate::error::{ApiError, ApiResult};
use crate::models::{BackupRecord, Entity, EntityKind, EntityPatch};
use crate::services::{MetadataGenerator, RestoreEngine};
use crate::AppState;

pub fn entity_routes() -> Router<AppState> {
    Router::new()
        .route("/entities/:kind", post(create_entity).get(list_entities))
        .route(
            "/entities/:kind/:id",
            get(get_entity).patch(patch_entity).delete(soft_delete_entity),
        )
        .route("/entities/:kind/:id/describe", post(describe_entity))
        .route("/deleted", get(list_backups))
        .route("/deleted/:backup_id/restore", post(restore_entity))
}

fn parse_kind(kind: &str) -> Result<EntityKind, ApiError> {
    EntityKind::parse(kind)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown entity type: {}", kind)))
}

/// POST /entities/{kind} request
#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub display_name: String,
    #[serde(default)]
    pub hebrew_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// DELETE /entities/{kind}/{id} response
#[derive(Debug, Serialize)]
pub struct SoftDeleteResponse {
    pub backup_id: i64,
}

/// POST /deleted/{backup_id}/restore response
#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub new_id: i64,
}

/// GET /deleted response
#[derive(Debug, Serialize)]
pub struct ListBackupsResponse {
    pub backups: Vec<BackupRecord>,
}

/// POST /entities/{kind}
async fn create_entity(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<CreateEntityRequest>,
) -> ApiResult<Json<Entity>> {
    let kind = parse_kind(&kind)?;
    let id = entities::insert_entity(
        &state.db,
        kind,
        &request.display_name,
        request.hebrew_name.as_deref(),
        request.description.as_deref(),
    )
    .await?;

    let entity = entities::get_entity(&state.db, kind, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Created {} {} vanished", kind, id)))?;

    Ok(Json(entity))
}

/// GET /entities/{kind}
async fn list_entities(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<Entity>>> {
    let kind = parse_kind(&kind)?;
    let result = entities::list_entities(&state.db, kind).await?;
    Ok(Json(result))
}

/// GET /entities/{kind}/{id}
async fn get_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<Entity>> {
    let kind = parse_kind(&kind)?;
    let entity = entities::get_entity(&state.db, kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", kind, id)))?;

    Ok(Json(entity))
}

/// PATCH /entities/{kind}/{id}
async fn patch_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(patch): Json<EntityPatch>,
) -> ApiResult<Json<Entity>> {
    let kind = parse_kind(&kind)?;
    let entity = entities::update_entity(&state.db, kind, id, &patch).await?;
    Ok(Json(entity))
}

/// DELETE /entities/{kind}/{id}
///
/// Soft delete: snapshot into a backup record, then remove the entity and
/// its junction rows.
async fn soft_delete_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<SoftDeleteResponse>> {
    let kind = parse_kind(&kind)?;
    let engine = RestoreEngine::new(state.db.clone(), state.storage.clone());
    let backup_id = engine.soft_delete(kind, id).await?;

    Ok(Json(SoftDeleteResponse { backup_id }))
}

/// POST /entities/{kind}/{id}/describe
///
/// Generate a description through the completion service and store it on
/// the entity. Upstream failures surface as 502 with the raw message.
async fn describe_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<Entity>> {
    let kind = parse_kind(&kind)?;

    let client = state.completions.clone().ok_or_else(|| {
        ApiError::Conflict(
            "Completion service not configured: set the API key first".to_string(),
        )
    })?;

    let entity = entities::get_entity(&state.db, kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", kind, id)))?;

    let generator = MetadataGenerator::new(client);
    let description = generator
        .generate_description(kind, &entity.display_name, entity.hebrew_name.as_deref())
        .await?;

    let patch = EntityPatch {
        display_name: None,
        hebrew_name: None,
        description: Some(description),
    };
    let updated = entities::update_entity(&state.db, kind, id, &patch).await?;

    Ok(Json(updated))
}

/// GET /deleted
async fn list_backups(State(state): State<AppState>) -> ApiResult<Json<ListBackupsResponse>> {
    let result = backups::list_backups(&state.db).await?;
    Ok(Json(ListBackupsResponse { backups: result }))
}

/// POST /deleted/{backup_id}/restore
async fn restore_entity(
    State(state): State<AppState>,
    Path(backup_id): Path<i64>,
) -> ApiResult<Json<RestoreResponse>> {
    let engine = RestoreEngine::new(state.db.clone(), state.storage.clone());
    let new_id = engine.restore(backup_id).await?;

    Ok(Json(RestoreResponse { new_id }))
}
