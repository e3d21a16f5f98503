//! lectary-admin - Catalog Administration Service
//!
//! Backend for the lecture catalog admin panel: upload job queue for the
//! external transcription worker, duplicate detection and merge/restore
//! over the entity catalog, and AI-assisted metadata generation.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lectary_admin::ai::CompletionClient;
use lectary_admin::storage::FsObjectStore;
use lectary_admin::AppState;
use lectary_common::config;

const DEFAULT_PORT: u16 = 5810;

#[tokio::main]
async fn main() -> Result<()> {
    // Load TOML config before tracing so the log filter can come from it
    let toml_path = config::config_file_path();
    let toml_config = config::load_toml_config(&toml_path)?;

    let filter = toml_config
        .log_filter
        .clone()
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    info!("Starting lectary-admin");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and prepare the data folder
    let data_folder = config::resolve_data_folder(&toml_config);
    config::ensure_data_folder(&data_folder)?;
    info!("Data folder: {}", data_folder.display());

    // Open or create the database
    let db_path = config::database_path(&data_folder);
    let db = lectary_common::db::init_database(&db_path).await?;
    info!("Database connection established");

    // Object store for entity images and course media
    let storage = Arc::new(FsObjectStore::new(config::object_store_root(&data_folder))?);

    // Completion client: Database -> ENV -> TOML key resolution
    let completions = match config::resolve_completion_api_key(&db, &toml_config).await? {
        Some(key) => {
            info!("Completion service configured");
            Some(Arc::new(CompletionClient::new(
                key,
                toml_config.completion_base_url.clone(),
            )?))
        }
        None => {
            warn!(
                "Completion API key not configured; description generation disabled. \
                 Set {} or completion_api_key in {}",
                config::COMPLETION_API_KEY_ENV,
                toml_path.display()
            );
            None
        }
    };

    let state = AppState::new(db, storage, completions);
    let app = lectary_admin::build_router(state);

    let port = toml_config.port.unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
