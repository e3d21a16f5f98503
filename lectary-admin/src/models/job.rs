//! Upload job records

use lectary_common::db::models::JobStatus;
use serde::Serialize;

/// One transcription upload job, unique per (course_id, lecture_number)
/// while not failed. A failed job is re-queued in place under the same id.
#[derive(Debug, Clone, Serialize)]
pub struct UploadJob {
    pub id: i64,
    pub course_id: i64,
    pub lecture_number: i64,
    pub media_prefix: String,
    pub status: JobStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub output: Option<String>,
    pub retry_count: i64,
}
