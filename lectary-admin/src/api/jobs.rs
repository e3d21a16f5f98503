//! Upload job queue API handlers
//!
//! POST /jobs, POST /jobs/claim, POST /jobs/{id}/complete,
//! POST /jobs/{id}/cancel, GET /jobs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::models::UploadJob;
use crate::services::{CancelOutcome, JobQueue};
use crate::AppState;

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(enqueue_job).get(list_jobs))
        .route("/jobs/claim", post(claim_next_job))
        .route("/jobs/:id/complete", post(complete_job))
        .route("/jobs/:id/cancel", post(cancel_job))
}

/// POST /jobs request
#[derive(Debug, Deserialize)]
pub struct EnqueueJobRequest {
    pub course_id: i64,
    pub lecture_number: i64,
}

/// POST /jobs response
#[derive(Debug, Serialize)]
pub struct EnqueueJobResponse {
    pub job_id: i64,
}

/// POST /jobs/claim response; `job` is null when nothing is claimable
#[derive(Debug, Serialize)]
pub struct ClaimJobResponse {
    pub job: Option<UploadJob>,
}

/// POST /jobs/{id}/complete request
#[derive(Debug, Deserialize)]
pub struct CompleteJobRequest {
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
}

/// POST /jobs/{id}/cancel response
#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: i64,
    pub result: CancelOutcome,
}

/// GET /jobs response
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<UploadJob>,
}

/// POST /jobs
///
/// Enqueue an upload job. 409 when the (course, lecture) pair is already
/// covered by a non-failed job; a failed job is re-queued in place.
async fn enqueue_job(
    State(state): State<AppState>,
    Json(request): Json<EnqueueJobRequest>,
) -> ApiResult<Json<EnqueueJobResponse>> {
    let queue = JobQueue::new(state.db.clone());
    let job_id = queue.enqueue(request.course_id, request.lecture_number).await?;

    Ok(Json(EnqueueJobResponse { job_id }))
}

/// POST /jobs/claim
///
/// Called by the external worker daemon. Returns the claimed job, or null
/// when a job is already running or the queue is empty.
async fn claim_next_job(State(state): State<AppState>) -> ApiResult<Json<ClaimJobResponse>> {
    let queue = JobQueue::new(state.db.clone());
    let job = queue.claim_next().await?;

    Ok(Json(ClaimJobResponse { job }))
}

/// POST /jobs/{id}/complete
///
/// Worker's completion report for a running job.
async fn complete_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CompleteJobRequest>,
) -> ApiResult<Json<UploadJob>> {
    let queue = JobQueue::new(state.db.clone());
    let job = queue
        .complete(id, request.success, request.output.as_deref())
        .await?;

    Ok(Json(job))
}

/// POST /jobs/{id}/cancel
async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CancelJobResponse>> {
    let queue = JobQueue::new(state.db.clone());
    let result = queue.cancel(id).await?;

    Ok(Json(CancelJobResponse { job_id: id, result }))
}

/// GET /jobs
///
/// All jobs with reconciled display statuses.
async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<ListJobsResponse>> {
    let queue = JobQueue::new(state.db.clone());
    let jobs = queue.list().await?;

    Ok(Json(ListJobsResponse { jobs }))
}
