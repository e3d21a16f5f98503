//! Entity catalog database operations
//!
//! CRUD over the seven entity tables plus their lecture junction tables.
//! Table and column names come from [`EntityKind`] metadata; values are
//! always bound.

use lectary_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::models::{Entity, EntityKind, EntityPatch, JunctionRow, Relationship};

/// Insert a new entity, returning the store-assigned id
pub async fn insert_entity(
    pool: &SqlitePool,
    kind: EntityKind,
    display_name: &str,
    hebrew_name: Option<&str>,
    description: Option<&str>,
) -> Result<i64> {
    if display_name.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "{} requires a non-empty {}",
            kind,
            kind.name_column()
        )));
    }

    let sql = format!(
        "INSERT INTO {table} ({name}, {hebrew}, description) VALUES (?, ?, ?)",
        table = kind.table(),
        name = kind.name_column(),
        hebrew = kind.hebrew_column(),
    );

    let result = sqlx::query(&sql)
        .bind(display_name.trim())
        .bind(hebrew_name)
        .bind(description)
        .execute(pool)
        .await?;

    let id = result.last_insert_rowid();
    tracing::debug!(kind = %kind, id, name = %display_name, "Created entity");

    Ok(id)
}

/// Load one entity by id
pub async fn get_entity(pool: &SqlitePool, kind: EntityKind, id: i64) -> Result<Option<Entity>> {
    let sql = format!(
        "SELECT id, {name} AS display_name, {hebrew} AS hebrew_name, description \
         FROM {table} WHERE id = ?",
        table = kind.table(),
        name = kind.name_column(),
        hebrew = kind.hebrew_column(),
    );

    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;

    Ok(row.map(|row| Entity {
        id: row.get("id"),
        entity_type: kind,
        display_name: row.get("display_name"),
        hebrew_name: row.get("hebrew_name"),
        description: row.get("description"),
    }))
}

/// List all entities of one kind
pub async fn list_entities(pool: &SqlitePool, kind: EntityKind) -> Result<Vec<Entity>> {
    let sql = format!(
        "SELECT id, {name} AS display_name, {hebrew} AS hebrew_name, description \
         FROM {table} ORDER BY id",
        table = kind.table(),
        name = kind.name_column(),
        hebrew = kind.hebrew_column(),
    );

    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| Entity {
            id: row.get("id"),
            entity_type: kind,
            display_name: row.get("display_name"),
            hebrew_name: row.get("hebrew_name"),
            description: row.get("description"),
        })
        .collect())
}

/// Apply a field patch to an entity
pub async fn update_entity(
    pool: &SqlitePool,
    kind: EntityKind,
    id: i64,
    patch: &EntityPatch,
) -> Result<Entity> {
    if patch.is_empty() {
        return Err(Error::InvalidInput("Empty patch".to_string()));
    }
    if let Some(name) = &patch.display_name {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} cannot be blanked",
                kind.name_column()
            )));
        }
    }

    let current = get_entity(pool, kind, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {} not found", kind, id)))?;

    let display_name = patch
        .display_name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.display_name)
        .to_string();
    let hebrew_name = patch.hebrew_name.clone().or(current.hebrew_name);
    let description = patch.description.clone().or(current.description);

    let sql = format!(
        "UPDATE {table} SET {name} = ?, {hebrew} = ?, description = ?, \
         updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        table = kind.table(),
        name = kind.name_column(),
        hebrew = kind.hebrew_column(),
    );

    sqlx::query(&sql)
        .bind(&display_name)
        .bind(&hebrew_name)
        .bind(&description)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Entity {
        id,
        entity_type: kind,
        display_name,
        hebrew_name,
        description,
    })
}

/// Hard-delete an entity row, returning the number of rows removed
pub async fn delete_entity_row(pool: &SqlitePool, kind: EntityKind, id: i64) -> Result<u64> {
    let sql = format!("DELETE FROM {table} WHERE id = ?", table = kind.table());
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Link an entity to a lecture (upsert; at most one row per pair)
pub async fn link_to_lecture(
    pool: &SqlitePool,
    kind: EntityKind,
    lecture_id: i64,
    entity_id: i64,
    relationship: Relationship,
) -> Result<()> {
    let sql = format!(
        r#"
        INSERT INTO {junction} (lecture_id, {fk}, relationship_type)
        VALUES (?, ?, ?)
        ON CONFLICT(lecture_id, {fk}) DO UPDATE SET
            relationship_type = excluded.relationship_type
        "#,
        junction = kind.junction_table(),
        fk = kind.junction_fk(),
    );

    sqlx::query(&sql)
        .bind(lecture_id)
        .bind(entity_id)
        .bind(relationship.as_str())
        .execute(pool)
        .await?;

    Ok(())
}

/// All junction rows referencing an entity
pub async fn junction_rows(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: i64,
) -> Result<Vec<JunctionRow>> {
    let sql = format!(
        "SELECT id, lecture_id, relationship_type FROM {junction} WHERE {fk} = ? ORDER BY id",
        junction = kind.junction_table(),
        fk = kind.junction_fk(),
    );

    let rows = sqlx::query(&sql).bind(entity_id).fetch_all(pool).await?;

    rows.into_iter()
        .map(|row| {
            let rel: String = row.get("relationship_type");
            let relationship_type = Relationship::parse(&rel).ok_or_else(|| {
                Error::Internal(format!("Invalid relationship_type in database: {}", rel))
            })?;
            Ok(JunctionRow {
                id: row.get("id"),
                lecture_id: row.get("lecture_id"),
                relationship_type,
            })
        })
        .collect()
}

/// Lecture ids already linked to an entity
pub async fn linked_lecture_ids(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: i64,
) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT lecture_id FROM {junction} WHERE {fk} = ?",
        junction = kind.junction_table(),
        fk = kind.junction_fk(),
    );

    let ids = sqlx::query_scalar(&sql).bind(entity_id).fetch_all(pool).await?;
    Ok(ids)
}

/// Count of junction rows referencing an entity
pub async fn connection_count(pool: &SqlitePool, kind: EntityKind, entity_id: i64) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {junction} WHERE {fk} = ?",
        junction = kind.junction_table(),
        fk = kind.junction_fk(),
    );

    let count = sqlx::query_scalar(&sql).bind(entity_id).fetch_one(pool).await?;
    Ok(count)
}

/// Junction-row counts for every entity of one kind, keyed by entity id.
/// Entities without links are absent from the map.
pub async fn connection_counts(
    pool: &SqlitePool,
    kind: EntityKind,
) -> Result<std::collections::HashMap<i64, i64>> {
    let sql = format!(
        "SELECT {fk}, COUNT(*) AS links FROM {junction} GROUP BY {fk}",
        junction = kind.junction_table(),
        fk = kind.junction_fk(),
    );

    let rows: Vec<(i64, i64)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

/// Remove all junction rows referencing an entity
pub async fn delete_junction_rows(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: i64,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {junction} WHERE {fk} = ?",
        junction = kind.junction_table(),
        fk = kind.junction_fk(),
    );

    let result = sqlx::query(&sql).bind(entity_id).execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory database");
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();
        lectary_common::db::initialize_schema(&pool)
            .await
            .expect("Schema initialization failed");
        pool
    }

    async fn seed_lecture(pool: &SqlitePool, course: &str, number: i64) -> i64 {
        sqlx::query("INSERT OR IGNORE INTO courses (title, media_dir) VALUES (?, ?)")
            .bind(course)
            .bind(course)
            .execute(pool)
            .await
            .unwrap();
        let course_id: i64 = sqlx::query_scalar("SELECT id FROM courses WHERE media_dir = ?")
            .bind(course)
            .fetch_one(pool)
            .await
            .unwrap();
        let result = sqlx::query("INSERT INTO lectures (course_id, lecture_number) VALUES (?, ?)")
            .bind(course_id)
            .bind(number)
            .execute(pool)
            .await
            .unwrap();
        result.last_insert_rowid()
    }

    #[tokio::test]
    async fn test_insert_and_get_entity() {
        let pool = setup_test_db().await;

        let id = insert_entity(&pool, EntityKind::Director, "Tarkovsky", None, None)
            .await
            .unwrap();

        let entity = get_entity(&pool, EntityKind::Director, id)
            .await
            .unwrap()
            .expect("entity should exist");
        assert_eq!(entity.display_name, "Tarkovsky");
        assert_eq!(entity.entity_type, EntityKind::Director);

        // Ids are per-type: the same id in another table is a different entity
        assert!(get_entity(&pool, EntityKind::Film, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_blank_name() {
        let pool = setup_test_db().await;
        let result = insert_entity(&pool, EntityKind::Book, "   ", None, None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_title_column_kinds() {
        let pool = setup_test_db().await;

        let id = insert_entity(&pool, EntityKind::Film, "Stalker", Some("סטוקר"), None)
            .await
            .unwrap();

        // Stored under the title column, surfaced as display_name
        let title: String = sqlx::query_scalar("SELECT title FROM films WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(title, "Stalker");

        let entity = get_entity(&pool, EntityKind::Film, id).await.unwrap().unwrap();
        assert_eq!(entity.display_name, "Stalker");
        assert_eq!(entity.hebrew_name.as_deref(), Some("סטוקר"));
    }

    #[tokio::test]
    async fn test_patch_entity() {
        let pool = setup_test_db().await;
        let id = insert_entity(&pool, EntityKind::Writer, "Dostoevsky", None, None)
            .await
            .unwrap();

        let patch = EntityPatch {
            display_name: None,
            hebrew_name: Some("דוסטויבסקי".to_string()),
            description: Some("Russian novelist".to_string()),
        };
        let updated = update_entity(&pool, EntityKind::Writer, id, &patch).await.unwrap();
        assert_eq!(updated.display_name, "Dostoevsky");
        assert_eq!(updated.description.as_deref(), Some("Russian novelist"));

        let missing = update_entity(&pool, EntityKind::Writer, 999, &patch).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        let empty = update_entity(&pool, EntityKind::Writer, id, &EntityPatch::default()).await;
        assert!(matches!(empty, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_link_upsert_keeps_one_row_per_pair() {
        let pool = setup_test_db().await;
        let lecture = seed_lecture(&pool, "cinema", 1).await;
        let id = insert_entity(&pool, EntityKind::Director, "Bergman", None, None)
            .await
            .unwrap();

        link_to_lecture(&pool, EntityKind::Director, lecture, id, Relationship::Mentioned)
            .await
            .unwrap();
        link_to_lecture(&pool, EntityKind::Director, lecture, id, Relationship::Discussed)
            .await
            .unwrap();

        let rows = junction_rows(&pool, EntityKind::Director, id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].relationship_type, Relationship::Discussed);
        assert_eq!(connection_count(&pool, EntityKind::Director, id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_count_and_unlink() {
        let pool = setup_test_db().await;
        let l1 = seed_lecture(&pool, "cinema", 1).await;
        let l2 = seed_lecture(&pool, "cinema", 2).await;
        let id = insert_entity(&pool, EntityKind::Painter, "Rembrandt", None, None)
            .await
            .unwrap();

        link_to_lecture(&pool, EntityKind::Painter, l1, id, Relationship::Discussed)
            .await
            .unwrap();
        link_to_lecture(&pool, EntityKind::Painter, l2, id, Relationship::Mentioned)
            .await
            .unwrap();

        assert_eq!(connection_count(&pool, EntityKind::Painter, id).await.unwrap(), 2);
        assert_eq!(
            linked_lecture_ids(&pool, EntityKind::Painter, id)
                .await
                .unwrap()
                .len(),
            2
        );

        let removed = delete_junction_rows(&pool, EntityKind::Painter, id).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(connection_count(&pool, EntityKind::Painter, id).await.unwrap(), 0);
    }
}
