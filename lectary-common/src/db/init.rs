//! Database initialization
//!
//! Opens (or creates) the SQLite database, applies connection pragmas, and
//! creates the full schema idempotently. Schema creation is safe to run on
//! every startup.

use crate::db::models::EntityKind;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys are load-bearing: restore depends on junction inserts
    // failing when the referenced lecture no longer exists. Set through the
    // connect options so every pooled connection gets them, not just one.
    // WAL allows concurrent readers while the claim endpoint writes.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_courses_table(pool).await?;
    create_lectures_table(pool).await?;
    create_entity_tables(pool).await?;
    create_junction_tables(pool).await?;
    create_deleted_entities_table(pool).await?;
    create_upload_jobs_table(pool).await?;
    create_merge_history_table(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            hebrew_title TEXT,
            description TEXT,
            media_dir TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_lectures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lectures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            lecture_number INTEGER NOT NULL,
            title TEXT,
            hebrew_title TEXT,
            description TEXT,
            duration_seconds INTEGER,
            transcript TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (course_id, lecture_number),
            CHECK (lecture_number > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lectures_course ON lectures(course_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the seven entity tables
///
/// All share the same shape; films, books and paintings carry `title` /
/// `hebrew_title` instead of `name` / `hebrew_name`.
async fn create_entity_tables(pool: &SqlitePool) -> Result<()> {
    for kind in EntityKind::ALL {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {name} TEXT NOT NULL,
                {hebrew} TEXT,
                description TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CHECK (length(trim({name})) > 0)
            )
            "#,
            table = kind.table(),
            name = kind.name_column(),
            hebrew = kind.hebrew_column(),
        );
        sqlx::query(&sql).execute(pool).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{name} ON {table}({name})",
            table = kind.table(),
            name = kind.name_column(),
        );
        sqlx::query(&index).execute(pool).await?;
    }

    Ok(())
}

/// Create the seven lecture-entity junction tables
///
/// `UNIQUE (lecture_id, <fk>)` enforces at most one row per pair; writes go
/// through ON CONFLICT upserts.
async fn create_junction_tables(pool: &SqlitePool) -> Result<()> {
    for kind in EntityKind::ALL {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {junction} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lecture_id INTEGER NOT NULL REFERENCES lectures(id) ON DELETE CASCADE,
                {fk} INTEGER NOT NULL REFERENCES {table}(id) ON DELETE CASCADE,
                relationship_type TEXT NOT NULL DEFAULT 'discussed'
                    CHECK (relationship_type IN ('discussed', 'mentioned')),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (lecture_id, {fk})
            )
            "#,
            junction = kind.junction_table(),
            fk = kind.junction_fk(),
            table = kind.table(),
        );
        sqlx::query(&sql).execute(pool).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{junction}_entity ON {junction}({fk})",
            junction = kind.junction_table(),
            fk = kind.junction_fk(),
        );
        sqlx::query(&index).execute(pool).await?;
    }

    Ok(())
}

/// Create the deleted_entities backup table
///
/// A backup record is written once at soft-delete time, read once at
/// restore time, then removed. `junction_data` is a JSON array of
/// `{lecture_id, relationship_type}` snapshots.
async fn create_deleted_entities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deleted_entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_id INTEGER NOT NULL,
            entity_type TEXT NOT NULL CHECK (entity_type IN (
                'director', 'film', 'writer', 'book',
                'painter', 'painting', 'philosopher'
            )),
            name TEXT NOT NULL,
            hebrew_name TEXT,
            description TEXT,
            junction_data TEXT NOT NULL DEFAULT '[]',
            has_image INTEGER NOT NULL DEFAULT 0,
            deleted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_deleted_entities_type ON deleted_entities(entity_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the upload_jobs table
///
/// Uniqueness per (course_id, lecture_number) while not failed is enforced
/// by the enqueue query discipline rather than a constraint, because a
/// failed job is reset in place instead of inserting a second row.
async fn create_upload_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            lecture_number INTEGER NOT NULL,
            media_prefix TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'running', 'succeeded', 'failed')),
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            output TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            CHECK (lecture_number > 0),
            CHECK (retry_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_upload_jobs_status ON upload_jobs(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_upload_jobs_lecture ON upload_jobs(course_id, lecture_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the merge_history decision ledger
async fn create_merge_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS merge_history (
            group_sig TEXT PRIMARY KEY,
            action TEXT NOT NULL CHECK (action IN ('approved', 'declined')),
            keep_type TEXT,
            decided_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
