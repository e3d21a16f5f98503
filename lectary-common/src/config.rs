//! Configuration loading and data-folder resolution
//!
//! Resolution priority for the data folder: environment variable, then the
//! TOML config file, then an OS-dependent default. The completion-service
//! API key resolves Database -> ENV -> TOML; the database copy is
//! authoritative once the key has been saved through the settings API.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV: &str = "LECTARY_DATA_FOLDER";

/// Environment variable carrying the completion-service API key
pub const COMPLETION_API_KEY_ENV: &str = "LECTARY_COMPLETION_API_KEY";

/// TOML configuration file contents (`~/.config/lectary/lectary-admin.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the database and object store
    pub data_folder: Option<String>,
    /// HTTP listen port
    pub port: Option<u16>,
    /// Completion-service API key
    pub completion_api_key: Option<String>,
    /// Completion-service base URL override
    pub completion_base_url: Option<String>,
    /// Log filter (tracing env-filter syntax)
    pub log_filter: Option<String>,
}

/// Default configuration file path for the platform
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("lectary").join("lectary-admin.toml"))
        .unwrap_or_else(|| PathBuf::from("lectary-admin.toml"))
}

/// Load the TOML config file, returning defaults when absent
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;

    Ok(())
}

/// Resolve the data folder
///
/// Priority:
/// 1. `LECTARY_DATA_FOLDER` environment variable
/// 2. `data_folder` in the TOML config file
/// 3. OS-dependent default (`~/.local/share/lectary` or equivalent)
pub fn resolve_data_folder(toml_config: &TomlConfig) -> PathBuf {
    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_folder()
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lectary"))
        .unwrap_or_else(|| PathBuf::from("./lectary_data"))
}

/// Ensure the data folder (and the object-store subdirectory) exists
pub fn ensure_data_folder(data_folder: &Path) -> Result<()> {
    std::fs::create_dir_all(data_folder)?;
    std::fs::create_dir_all(data_folder.join("objects"))?;
    Ok(())
}

/// Database file path inside the data folder
pub fn database_path(data_folder: &Path) -> PathBuf {
    data_folder.join("lectary.db")
}

/// Object-store root inside the data folder
pub fn object_store_root(data_folder: &Path) -> PathBuf {
    data_folder.join("objects")
}

/// Resolve the completion-service API key from tiered configuration
///
/// Priority: database setting, then environment variable, then TOML. Warns
/// when the key appears in multiple places since the lower tiers are then
/// silently shadowed.
pub async fn resolve_completion_api_key(
    db: &sqlx::SqlitePool,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'completion_api_key'")
            .fetch_optional(db)
            .await?
            .flatten();

    let env_key = std::env::var(COMPLETION_API_KEY_ENV).ok();
    let toml_key = toml_config.completion_api_key.clone();

    let mut sources = Vec::new();
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }
    if toml_key.as_deref().is_some_and(is_valid_key) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        tracing::warn!(
            "Completion API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for key in [db_key, env_key, toml_key].into_iter().flatten() {
        if is_valid_key(&key) {
            return Ok(Some(key));
        }
    }

    Ok(None)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
