//! Upload job queue
//!
//! Strict single-concurrency queue over upload jobs, claimed by the external
//! transcription worker. Concurrency control is the conditional-update claim
//! in the jobs layer; there are no locks or leases, and nothing reclaims a
//! job whose worker crashed; the operator cancels it by hand.

use sqlx::SqlitePool;

use lectary_common::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::jobs;
use crate::models::{JobStatus, UploadJob};

/// Sentinel output written when a running job is cancelled; the external
/// process may still be working, but the job will not be retried.
pub const CANCELLED_OUTPUT: &str = "cancelled by operator";

/// What a cancel request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Job was still pending and was removed without trace
    Deleted,
    /// Job was running and was forced to failed
    Cancelled,
}

/// Single-flight upload job queue
#[derive(Clone)]
pub struct JobQueue {
    db: SqlitePool,
}

impl JobQueue {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Claim the next job for the external worker
    ///
    /// Returns None when a job is already running anywhere, when the queue
    /// is empty, or when another claimer won the race for the oldest
    /// pending job. The poller simply calls again later.
    pub async fn claim_next(&self) -> Result<Option<UploadJob>> {
        if jobs::any_running(&self.db).await? {
            debug!("Claim refused: a job is already running");
            return Ok(None);
        }

        let Some(candidate) = jobs::oldest_pending(&self.db).await? else {
            return Ok(None);
        };

        if !jobs::try_claim(&self.db, candidate.id).await? {
            debug!(job_id = candidate.id, "Lost claim race, yielding");
            return Ok(None);
        }

        let job = jobs::find_job(&self.db, candidate.id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Claimed job {} vanished", candidate.id)))?;

        info!(
            job_id = job.id,
            course_id = job.course_id,
            lecture_number = job.lecture_number,
            "Job claimed"
        );

        Ok(Some(job))
    }

    /// Enqueue an upload job for a (course, lecture number) pair
    ///
    /// A pair already covered by a pending/running/succeeded job is a
    /// Conflict. A failed job is re-queued in place: same id, retry_count
    /// reset, timestamps and output cleared.
    pub async fn enqueue(&self, course_id: i64, lecture_number: i64) -> Result<i64> {
        if lecture_number <= 0 {
            return Err(Error::InvalidInput(format!(
                "Invalid lecture number: {}",
                lecture_number
            )));
        }

        let media_dir = jobs::course_media_dir(&self.db, course_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))?;

        if let Some(existing) = jobs::find_job_for_lecture(&self.db, course_id, lecture_number).await? {
            if existing.status != JobStatus::Failed {
                return Err(Error::Conflict(format!(
                    "Job {} already {} for course {} lecture {}",
                    existing.id, existing.status, course_id, lecture_number
                )));
            }

            if !jobs::requeue_job(&self.db, existing.id).await? {
                // Someone changed the job's state between our read and the update
                return Err(Error::Conflict(format!(
                    "Job {} is no longer re-queueable",
                    existing.id
                )));
            }

            info!(job_id = existing.id, course_id, lecture_number, "Failed job re-queued");
            return Ok(existing.id);
        }

        let media_prefix = format!("{}/{:02}", media_dir, lecture_number);
        let id = jobs::insert_job(&self.db, course_id, lecture_number, &media_prefix).await?;

        info!(job_id = id, course_id, lecture_number, media_prefix = %media_prefix, "Job enqueued");

        Ok(id)
    }

    /// Cancel a job
    ///
    /// Pending jobs are deleted outright. Running jobs cannot signal the
    /// external worker, so they are forced to failed with a sentinel output;
    /// the worker may keep going, but the result will be ignored. Terminal
    /// jobs are a Conflict.
    pub async fn cancel(&self, job_id: i64) -> Result<CancelOutcome> {
        let job = jobs::find_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;

        match job.status {
            JobStatus::Pending => {
                if jobs::delete_pending_job(&self.db, job_id).await? {
                    info!(job_id, "Pending job cancelled and removed");
                    Ok(CancelOutcome::Deleted)
                } else {
                    Err(Error::Conflict(format!(
                        "Job {} changed state during cancellation",
                        job_id
                    )))
                }
            }
            JobStatus::Running => {
                if jobs::force_fail_running_job(&self.db, job_id, CANCELLED_OUTPUT).await? {
                    info!(job_id, "Running job forced to failed");
                    Ok(CancelOutcome::Cancelled)
                } else {
                    Err(Error::Conflict(format!(
                        "Job {} changed state during cancellation",
                        job_id
                    )))
                }
            }
            JobStatus::Succeeded | JobStatus::Failed => Err(Error::Conflict(format!(
                "Job {} is already {}",
                job_id, job.status
            ))),
        }
    }

    /// Record the external worker's result for a running job
    pub async fn complete(
        &self,
        job_id: i64,
        success: bool,
        output: Option<&str>,
    ) -> Result<UploadJob> {
        let job = jobs::find_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;

        if !jobs::complete_running_job(&self.db, job_id, success, output).await? {
            return Err(Error::Conflict(format!(
                "Job {} is {}, only running jobs can report completion",
                job_id, job.status
            )));
        }

        info!(job_id, success, "Job completion recorded");

        jobs::find_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Completed job {} vanished", job_id)))
    }

    /// All jobs with reconciled display statuses
    ///
    /// A succeeded job is only trusted if the lecture row it was supposed to
    /// produce actually exists; otherwise the job table and the catalog have
    /// diverged (partial or crashed completion) and the job reports failed.
    pub async fn list(&self) -> Result<Vec<UploadJob>> {
        let mut result = jobs::list_jobs(&self.db).await?;

        for job in &mut result {
            if job.status == JobStatus::Succeeded
                && !jobs::lecture_exists(&self.db, job.course_id, job.lecture_number).await?
            {
                debug!(
                    job_id = job.id,
                    course_id = job.course_id,
                    lecture_number = job.lecture_number,
                    "Succeeded job has no lecture row, reporting failed"
                );
                job.status = JobStatus::Failed;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_queue() -> JobQueue {
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
        sqlx::query("INSERT INTO courses (title, media_dir) VALUES ('Cinema', 'cinema')")
            .execute(&pool)
            .await
            .unwrap();
        JobQueue::new(pool)
    }

    fn db(queue: &JobQueue) -> &SqlitePool {
        &queue.db
    }

    #[tokio::test]
    async fn test_claim_respects_single_flight() {
        let queue = setup_queue().await;
        queue.enqueue(1, 1).await.unwrap();
        queue.enqueue(1, 2).await.unwrap();

        let first = queue.claim_next().await.unwrap().expect("first claim should win");
        assert_eq!(first.status, JobStatus::Running);

        // One job running anywhere blocks further claims
        assert!(queue.claim_next().await.unwrap().is_none());

        queue.complete(first.id, true, None).await.unwrap();
        let second = queue.claim_next().await.unwrap().expect("queue should move on");
        assert_eq!(second.lecture_number, 2);
    }

    #[tokio::test]
    async fn test_claim_is_fifo() {
        let queue = setup_queue().await;
        let a = queue.enqueue(1, 1).await.unwrap();
        let b = queue.enqueue(1, 2).await.unwrap();
        let c = queue.enqueue(1, 3).await.unwrap();

        for expected in [a, b, c] {
            let job = queue.claim_next().await.unwrap().unwrap();
            assert_eq!(job.id, expected);
            queue.complete(job.id, true, None).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_enqueue_conflicts() {
        let queue = setup_queue().await;
        let id = queue.enqueue(1, 1).await.unwrap();

        // pending
        assert!(matches!(queue.enqueue(1, 1).await, Err(Error::Conflict(_))));

        // running
        queue.claim_next().await.unwrap().unwrap();
        assert!(matches!(queue.enqueue(1, 1).await, Err(Error::Conflict(_))));

        // succeeded
        queue.complete(id, true, None).await.unwrap();
        assert!(matches!(queue.enqueue(1, 1).await, Err(Error::Conflict(_))));

        // a different lecture is fine
        queue.enqueue(1, 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_requeue_failed_reuses_id() {
        let queue = setup_queue().await;
        let id = queue.enqueue(1, 1).await.unwrap();

        let job = queue.claim_next().await.unwrap().unwrap();
        queue.complete(job.id, false, Some("boom")).await.unwrap();

        let requeued = queue.enqueue(1, 1).await.unwrap();
        assert_eq!(requeued, id, "re-queue must reuse the job id");

        let job = jobs::find_job(db(&queue), id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(job.output.is_none());
    }

    #[tokio::test]
    async fn test_requeued_job_goes_to_back_of_queue() {
        let queue = setup_queue().await;
        let a = queue.enqueue(1, 1).await.unwrap();

        let job = queue.claim_next().await.unwrap().unwrap();
        queue.complete(job.id, false, None).await.unwrap();

        let b = queue.enqueue(1, 2).await.unwrap();
        // created_at has microsecond precision, so the later re-queue of `a`
        // sorts behind `b` even within the same second
        queue.enqueue(1, 1).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(first.id, b);
        queue.complete(b, true, None).await.unwrap();

        let second = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(second.id, a);
    }

    #[tokio::test]
    async fn test_enqueue_unknown_course() {
        let queue = setup_queue().await;
        assert!(matches!(queue.enqueue(42, 1).await, Err(Error::NotFound(_))));
        assert!(matches!(
            queue.enqueue(1, 0).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_pending_deletes() {
        let queue = setup_queue().await;
        let id = queue.enqueue(1, 1).await.unwrap();

        let outcome = queue.cancel(id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Deleted);
        assert!(jobs::find_job(db(&queue), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_running_forces_failed() {
        let queue = setup_queue().await;
        let id = queue.enqueue(1, 1).await.unwrap();
        queue.claim_next().await.unwrap().unwrap();

        let outcome = queue.cancel(id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Cancelled);

        let job = jobs::find_job(db(&queue), id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.output.as_deref(), Some(CANCELLED_OUTPUT));
    }

    #[tokio::test]
    async fn test_cancel_terminal_conflicts() {
        let queue = setup_queue().await;
        let id = queue.enqueue(1, 1).await.unwrap();
        queue.claim_next().await.unwrap().unwrap();
        queue.complete(id, true, None).await.unwrap();

        assert!(matches!(queue.cancel(id).await, Err(Error::Conflict(_))));
        assert!(matches!(queue.cancel(999).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_reconciles_phantom_success() {
        let queue = setup_queue().await;
        let id = queue.enqueue(1, 1).await.unwrap();
        queue.claim_next().await.unwrap().unwrap();
        queue.complete(id, true, None).await.unwrap();

        // Job claims success but no lecture row exists for (1, 1)
        let listed = queue.list().await.unwrap();
        assert_eq!(listed[0].status, JobStatus::Failed);

        // Once the lecture row appears, success is trusted
        sqlx::query("INSERT INTO lectures (course_id, lecture_number) VALUES (1, 1)")
            .execute(db(&queue))
            .await
            .unwrap();
        let listed = queue.list().await.unwrap();
        assert_eq!(listed[0].status, JobStatus::Succeeded);
    }
}
