//! Concurrency tests for the job queue claim path

mod helpers;

use tokio::task::JoinSet;

use lectary_admin::models::JobStatus;
use lectary_admin::services::JobQueue;

/// Many concurrent claimers, one winner: at most one job may ever be
/// running system-wide.
#[tokio::test]
async fn test_concurrent_claims_produce_single_running_job() {
    let (_dir, state) = helpers::create_test_state().await;
    let course = helpers::seed_course(&state.db, "Cinema", "cinema").await;

    let queue = JobQueue::new(state.db.clone());
    for n in 1..=5 {
        queue.enqueue(course, n).await.unwrap();
    }

    let mut join_set = JoinSet::new();
    for _ in 0..10 {
        let queue = queue.clone();
        join_set.spawn(async move { queue.claim_next().await.unwrap() });
    }

    let mut claimed = Vec::new();
    while let Some(result) = join_set.join_next().await {
        if let Some(job) = result.unwrap() {
            claimed.push(job);
        }
    }

    assert_eq!(claimed.len(), 1, "exactly one claimer may win");
    assert_eq!(claimed[0].status, JobStatus::Running);

    let running: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM upload_jobs WHERE status = 'running'")
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(running, 1);

    // Everything else is still pending and untouched
    let pending: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM upload_jobs WHERE status = 'pending'")
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(pending, 4);
}

/// Draining the queue claim-by-claim preserves FIFO order under completion.
#[tokio::test]
async fn test_sequential_drain_is_fifo() {
    let (_dir, state) = helpers::create_test_state().await;
    let course = helpers::seed_course(&state.db, "Art", "art").await;

    let queue = JobQueue::new(state.db.clone());
    let mut expected = Vec::new();
    for n in 1..=4 {
        expected.push(queue.enqueue(course, n).await.unwrap());
    }

    let mut claimed = Vec::new();
    loop {
        match queue.claim_next().await.unwrap() {
            Some(job) => {
                claimed.push(job.id);
                queue.complete(job.id, true, None).await.unwrap();
            }
            None => break,
        }
    }

    assert_eq!(claimed, expected);
}
