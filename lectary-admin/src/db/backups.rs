//! Soft-delete backup record operations

use lectary_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{BackupRecord, EntityKind, JunctionSnapshot};

fn backup_from_row(row: &SqliteRow) -> Result<BackupRecord> {
    let entity_type: String = row.get("entity_type");
    let entity_type = EntityKind::parse(&entity_type)
        .ok_or_else(|| Error::Internal(format!("Invalid entity_type in backup: {}", entity_type)))?;

    let junction_data: String = row.get("junction_data");
    let junction_data: Vec<JunctionSnapshot> = serde_json::from_str(&junction_data)
        .map_err(|e| Error::Internal(format!("Failed to deserialize junction_data: {}", e)))?;

    Ok(BackupRecord {
        id: row.get("id"),
        original_id: row.get("original_id"),
        entity_type,
        name: row.get("name"),
        hebrew_name: row.get("hebrew_name"),
        description: row.get("description"),
        junction_data,
        has_image: row.get::<i64, _>("has_image") != 0,
        deleted_at: row.get("deleted_at"),
    })
}

/// Write a backup record, returning its id
#[allow(clippy::too_many_arguments)]
pub async fn insert_backup(
    pool: &SqlitePool,
    original_id: i64,
    kind: EntityKind,
    name: &str,
    hebrew_name: Option<&str>,
    description: Option<&str>,
    junction_data: &[JunctionSnapshot],
    has_image: bool,
) -> Result<i64> {
    let junction_json = serde_json::to_string(junction_data)
        .map_err(|e| Error::Internal(format!("Failed to serialize junction_data: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO deleted_entities
            (original_id, entity_type, name, hebrew_name, description, junction_data, has_image)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(original_id)
    .bind(kind.as_str())
    .bind(name)
    .bind(hebrew_name)
    .bind(description)
    .bind(junction_json)
    .bind(has_image)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load one backup record
pub async fn get_backup(pool: &SqlitePool, id: i64) -> Result<Option<BackupRecord>> {
    let row = sqlx::query(
        "SELECT id, original_id, entity_type, name, hebrew_name, description, \
         junction_data, has_image, deleted_at FROM deleted_entities WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(backup_from_row).transpose()
}

/// All backup records, most recently deleted first
pub async fn list_backups(pool: &SqlitePool) -> Result<Vec<BackupRecord>> {
    let rows = sqlx::query(
        "SELECT id, original_id, entity_type, name, hebrew_name, description, \
         junction_data, has_image, deleted_at FROM deleted_entities ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(backup_from_row).collect()
}

/// Remove a consumed backup record
pub async fn delete_backup(pool: &SqlitePool, id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM deleted_entities WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
