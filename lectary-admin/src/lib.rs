//! lectary-admin library interface
//!
//! Exposes application state, the router, and all engine modules for
//! integration testing.

pub mod ai;
pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::ai::CompletionClient;
use crate::storage::ObjectStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Object store for entity images and course media
    pub storage: Arc<dyn ObjectStore>,
    /// Completion client; absent until an API key is configured
    pub completions: Option<Arc<CompletionClient>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        storage: Arc<dyn ObjectStore>,
        completions: Option<Arc<CompletionClient>>,
    ) -> Self {
        Self {
            db,
            storage,
            completions,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::duplicate_routes())
        .merge(api::entity_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
