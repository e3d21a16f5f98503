//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

use lectary_admin::storage::{FsObjectStore, ObjectStore};
use lectary_admin::AppState;

/// Create application state backed by a temp-dir database and object store.
/// The TempDir must be kept alive for the duration of the test.
pub async fn create_test_state() -> (TempDir, AppState) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_lectary.db");

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .unwrap();

    lectary_common::db::initialize_schema(&pool).await.unwrap();

    let storage: Arc<dyn ObjectStore> =
        Arc::new(FsObjectStore::new(temp_dir.path().join("objects")).unwrap());

    (temp_dir, AppState::new(pool, storage, None))
}

/// Insert a course and return its id
pub async fn seed_course(pool: &SqlitePool, title: &str, media_dir: &str) -> i64 {
    let result = sqlx::query("INSERT INTO courses (title, media_dir) VALUES (?, ?)")
        .bind(title)
        .bind(media_dir)
        .execute(pool)
        .await
        .unwrap();
    result.last_insert_rowid()
}

/// Insert a lecture and return its id
pub async fn seed_lecture(pool: &SqlitePool, course_id: i64, lecture_number: i64) -> i64 {
    let result = sqlx::query("INSERT INTO lectures (course_id, lecture_number) VALUES (?, ?)")
        .bind(course_id)
        .bind(lecture_number)
        .execute(pool)
        .await
        .unwrap();
    result.last_insert_rowid()
}
