//! End-to-end coverage of the claim protocol, retry policy, and
//! idempotency guarantees against a real Postgres instance.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::TestDb;
use ingestor_core::domain::event::NewEvent;
use ingestor_core::domain::JobStatus;
use ingestor_core::retry::RetryConfig;
use ingestor_core::store::{JobStore, PostgresJobStore};
use test_context::test_context;

fn event(event_type: &str) -> NewEvent {
    NewEvent {
        event_type: event_type.to_string(),
        timestamp: Utc::now(),
        payload: serde_json::json!({}),
    }
}

const STALE_TIMEOUT: Duration = Duration::from_secs(300);

// Seed scenario 1: submit, claim, aggregate, succeed; status and
// results reflect the aggregate.
#[test_context(TestDb)]
#[tokio::test]
async fn submitted_job_succeeds_with_aggregated_results(ctx: &TestDb) {
    let store = PostgresJobStore::new(ctx.pool.clone());

    let outcome = store
        .submit("t1", None, vec![event("a"), event("b"), event("a")])
        .await
        .unwrap();
    let job_id = outcome.job_id();
    assert!(!outcome.is_duplicate());

    let claimed = store
        .claim_next("worker-1", STALE_TIMEOUT)
        .await
        .unwrap()
        .expect("job should be claimable");
    assert_eq!(claimed.job.id, job_id);
    assert_eq!(claimed.job.attempt, 1);
    assert_eq!(claimed.job.status, JobStatus::Processing);

    let rows = ingestor_core::aggregator::aggregate(&claimed.events);
    store.succeed(job_id, &rows).await.unwrap();

    let status = store.get_status(job_id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Succeeded);
    assert!(status.processed_at.is_some());

    let results = store.get_results(job_id).await.unwrap().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].event_type, "a");
    assert_eq!(results[0].count, 2);
    assert_eq!(results[1].event_type, "b");
    assert_eq!(results[1].count, 1);
}

// Seed scenario 2: two submissions with the same idempotency key
// return the same job id, and only one row exists.
#[test_context(TestDb)]
#[tokio::test]
async fn duplicate_submission_under_same_key_returns_same_job(ctx: &TestDb) {
    let store = PostgresJobStore::new(ctx.pool.clone());

    let first = store
        .submit("t1", Some("k1"), vec![event("a")])
        .await
        .unwrap();
    let second = store
        .submit("t1", Some("k1"), vec![event("a")])
        .await
        .unwrap();

    assert_eq!(first.job_id(), second.job_id());
    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM ingestion_jobs WHERE tenant_id = 't1'")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// Seed scenario 6: concurrent submissions under the same key yield one
// job row and the same id to both callers.
#[test_context(TestDb)]
#[tokio::test]
async fn concurrent_submissions_under_same_key_converge_to_one_job(ctx: &TestDb) {
    let store = Arc::new(PostgresJobStore::new(ctx.pool.clone()));

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.submit("t1", Some("race"), vec![event("a")]).await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.submit("t1", Some("race"), vec![event("a")]).await })
    };

    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(a.job_id(), b.job_id());
    assert!(a.is_duplicate() || b.is_duplicate());

    let count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM ingestion_jobs WHERE tenant_id = 't1'")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

// Seed scenario 3: after max_attempts failed claims, the job is
// terminally Failed with attempt == max_attempts and available_at null.
#[test_context(TestDb)]
#[tokio::test]
async fn job_becomes_failed_after_exhausting_retries(ctx: &TestDb) {
    let store = PostgresJobStore::new(ctx.pool.clone());
    let retry_config = RetryConfig {
        max_attempts: 3,
        base_backoff_seconds: 0,
    };

    let outcome = store.submit("t1", None, vec![event("a")]).await.unwrap();
    let job_id = outcome.job_id();

    for _ in 0..3 {
        let claimed = store
            .claim_next("worker-1", STALE_TIMEOUT)
            .await
            .unwrap()
            .expect("job should still be claimable");
        store
            .fail(job_id, claimed.job.attempt, "boom", &retry_config)
            .await
            .unwrap();
    }

    let status = store.get_status(job_id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.attempt, 3);
    assert_eq!(status.error.as_deref(), Some("boom"));

    // Exhausted: no further claim should be possible.
    let next = store.claim_next("worker-1", STALE_TIMEOUT).await.unwrap();
    assert!(next.is_none());
}

// Seed scenario 5: a job abandoned mid-processing (simulated by
// back-dating locked_at past the stale timeout) is reclaimed by
// another worker within one poll, and succeeds with attempt == 2.
#[test_context(TestDb)]
#[tokio::test]
async fn stale_lock_is_reclaimed_and_job_eventually_succeeds(ctx: &TestDb) {
    let store = PostgresJobStore::new(ctx.pool.clone());
    let short_timeout = Duration::from_millis(50);

    let outcome = store.submit("t1", None, vec![event("a")]).await.unwrap();
    let job_id = outcome.job_id();

    let first_claim = store
        .claim_next("worker-dead", short_timeout)
        .await
        .unwrap()
        .expect("job should be claimable");
    assert_eq!(first_claim.job.attempt, 1);

    // Simulate the worker dying: back-date the lock past the timeout
    // instead of ever committing a terminal transaction.
    sqlx::query("UPDATE ingestion_jobs SET locked_at = now() - interval '10 minutes' WHERE id = $1")
        .bind(job_id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let second_claim = store
        .claim_next("worker-alive", short_timeout)
        .await
        .unwrap()
        .expect("stale lock should be reclaimable");
    assert_eq!(second_claim.job.attempt, 2);
    assert_eq!(second_claim.job.locked_by.as_deref(), Some("worker-alive"));

    let rows = ingestor_core::aggregator::aggregate(&second_claim.events);
    store.succeed(job_id, &rows).await.unwrap();

    let status = store.get_status(job_id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Succeeded);
    assert_eq!(status.attempt, 2);
}

// Seed scenario 4: many workers racing on a backlog of single-event
// jobs all converge with no double-processing and no attempt > 1.
#[test_context(TestDb)]
#[tokio::test]
async fn concurrent_workers_drain_backlog_without_double_processing(ctx: &TestDb) {
    let store = Arc::new(PostgresJobStore::new(ctx.pool.clone()));
    const JOB_COUNT: usize = 25;

    let mut job_ids = Vec::with_capacity(JOB_COUNT);
    for i in 0..JOB_COUNT {
        let outcome = store
            .submit("t1", None, vec![event(&format!("type-{i}"))])
            .await
            .unwrap();
        job_ids.push(outcome.job_id());
    }

    let mut handles = Vec::new();
    for worker in 0..4 {
        let store = store.clone();
        let worker_id = format!("worker-{worker}");
        handles.push(tokio::spawn(async move {
            loop {
                match store.claim_next(&worker_id, STALE_TIMEOUT).await.unwrap() {
                    Some(claimed) => {
                        let rows = ingestor_core::aggregator::aggregate(&claimed.events);
                        store.succeed(claimed.job.id, &rows).await.unwrap();
                    }
                    None => break,
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut total_results = 0i64;
    for job_id in job_ids {
        let status = store.get_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Succeeded);
        assert_eq!(status.attempt, 1);
        total_results += store.get_results(job_id).await.unwrap().unwrap().len() as i64;
    }
    assert_eq!(total_results, JOB_COUNT as i64);
}
