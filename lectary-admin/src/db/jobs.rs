//! Upload job database operations
//!
//! Row-level operations for the upload job queue. Claim and completion
//! transitions are conditional updates guarded on the current status; the
//! caller must check `rows_affected` to learn whether the transition won.

use chrono::{SecondsFormat, Utc};
use lectary_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{JobStatus, UploadJob};

/// Current time as a fixed-width RFC 3339 string (microsecond precision),
/// so lexicographic ordering of `created_at` matches chronological order.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

const JOB_COLUMNS: &str = "id, course_id, lecture_number, media_prefix, status, \
                           created_at, started_at, completed_at, output, retry_count";

fn job_from_row(row: &SqliteRow) -> Result<UploadJob> {
    let status: String = row.get("status");
    let status = JobStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Invalid job status in database: {}", status)))?;

    Ok(UploadJob {
        id: row.get("id"),
        course_id: row.get("course_id"),
        lecture_number: row.get("lecture_number"),
        media_prefix: row.get("media_prefix"),
        status,
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        output: row.get("output"),
        retry_count: row.get("retry_count"),
    })
}

/// Load one job by id
pub async fn find_job(pool: &SqlitePool, id: i64) -> Result<Option<UploadJob>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM upload_jobs WHERE id = ?");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Load the job covering a (course, lecture) pair, if any
pub async fn find_job_for_lecture(
    pool: &SqlitePool,
    course_id: i64,
    lecture_number: i64,
) -> Result<Option<UploadJob>> {
    let sql =
        format!("SELECT {JOB_COLUMNS} FROM upload_jobs WHERE course_id = ? AND lecture_number = ?");
    let row = sqlx::query(&sql)
        .bind(course_id)
        .bind(lecture_number)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Insert a new pending job, returning its id
pub async fn insert_job(
    pool: &SqlitePool,
    course_id: i64,
    lecture_number: i64,
    media_prefix: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO upload_jobs (course_id, lecture_number, media_prefix, status, created_at)
        VALUES (?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(course_id)
    .bind(lecture_number)
    .bind(media_prefix)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Reset a failed job in place: same id, back to pending, counters cleared.
/// Guarded on `status = 'failed'`; returns false if the job was not failed.
pub async fn requeue_job(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE upload_jobs
        SET status = 'pending', retry_count = 0, output = NULL,
            started_at = NULL, completed_at = NULL, created_at = ?
        WHERE id = ? AND status = 'failed'
        "#,
    )
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether any job anywhere is currently running
pub async fn any_running(pool: &SqlitePool) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM upload_jobs WHERE status = 'running'")
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// The single oldest pending job (FIFO, insertion order breaks ties)
pub async fn oldest_pending(pool: &SqlitePool) -> Result<Option<UploadJob>> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM upload_jobs WHERE status = 'pending' \
         ORDER BY created_at ASC, id ASC LIMIT 1"
    );
    let row = sqlx::query(&sql).fetch_optional(pool).await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Attempt the pending -> running transition. The WHERE guard is the whole
/// concurrency story: of two racing claimers only one update affects a row,
/// and the NOT EXISTS clause keeps the at-most-one-running invariant even
/// when the racers picked different pending jobs.
pub async fn try_claim(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE upload_jobs
        SET status = 'running', started_at = ?
        WHERE id = ? AND status = 'pending'
          AND NOT EXISTS (SELECT 1 FROM upload_jobs WHERE status = 'running')
        "#,
    )
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Hard-delete a job row, guarded on pending status
pub async fn delete_pending_job(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM upload_jobs WHERE id = ? AND status = 'pending'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Force a running job to failed with a sentinel output message
pub async fn force_fail_running_job(pool: &SqlitePool, id: i64, output: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE upload_jobs
        SET status = 'failed', output = ?, completed_at = ?
        WHERE id = ? AND status = 'running'
        "#,
    )
    .bind(output)
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record the external worker's result for a running job
pub async fn complete_running_job(
    pool: &SqlitePool,
    id: i64,
    success: bool,
    output: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE upload_jobs
        SET status = ?, output = ?, completed_at = ?,
            retry_count = retry_count + CASE WHEN ? THEN 0 ELSE 1 END
        WHERE id = ? AND status = 'running'
        "#,
    )
    .bind(if success { "succeeded" } else { "failed" })
    .bind(output)
    .bind(now_rfc3339())
    .bind(success)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All jobs, newest first
pub async fn list_jobs(pool: &SqlitePool) -> Result<Vec<UploadJob>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM upload_jobs ORDER BY created_at DESC, id DESC");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(job_from_row).collect()
}

/// Whether a lecture row exists for a (course, lecture number) pair
pub async fn lecture_exists(
    pool: &SqlitePool,
    course_id: i64,
    lecture_number: i64,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lectures WHERE course_id = ? AND lecture_number = ?",
    )
    .bind(course_id)
    .bind(lecture_number)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Media directory of a course, if the course exists
pub async fn course_media_dir(pool: &SqlitePool, course_id: i64) -> Result<Option<String>> {
    let dir = sqlx::query_scalar("SELECT media_dir FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(pool)
        .await?;
    Ok(dir)
}
