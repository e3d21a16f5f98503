//! Settings database operations

use lectary_common::Result;
use sqlx::SqlitePool;

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Write a setting value (upsert)
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Stored completion-service API key, if configured
pub async fn get_completion_api_key(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, "completion_api_key").await
}

/// Persist the completion-service API key (authoritative tier)
pub async fn set_completion_api_key(pool: &SqlitePool, key: &str) -> Result<()> {
    set_setting(pool, "completion_api_key", key).await
}
