//! A single polling slot: claim -> aggregate -> commit-or-fail -> idle
//! backoff (§4.5). `worker_concurrency` of these run independently per
//! process with no shared per-loop state.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::aggregator::aggregate;
use crate::error::StoreError;
use crate::retry::RetryConfig;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct WorkerLoopConfig {
    pub worker_poll_seconds: u64,
    pub worker_idle_backoff_max_seconds: u64,
    pub stale_lock_timeout: Duration,
    pub retry_config: RetryConfig,
}

/// A worker identity unique to this process instance: opaque beyond
/// diagnostics (§4.3).
pub fn worker_identity(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Run one loop until `shutdown` is cancelled. Never panics on a
/// processing failure; only cancellation or the loop ending the
/// process early can stop it (§4.5 step 6, §7).
pub async fn run(
    store: Arc<dyn JobStore>,
    worker_id: String,
    config: WorkerLoopConfig,
    shutdown: CancellationToken,
) {
    let poll_interval = Duration::from_secs(config.worker_poll_seconds.max(1));
    let backoff_ceiling = Duration::from_secs(config.worker_idle_backoff_max_seconds.max(1));
    let mut idle_delay = poll_interval;

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let claimed = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = store.claim_next(&worker_id, config.stale_lock_timeout) => result,
        };

        let claimed = match claimed {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(idle_delay) => {}
                }
                idle_delay = (idle_delay * 2).min(backoff_ceiling);
                continue;
            }
            Err(StoreError::Fatal(source)) => {
                error!(worker_id = %worker_id, error = %source, "fatal store error during claim, exiting");
                std::process::exit(1);
            }
            Err(err) => {
                warn!(worker_id = %worker_id, error = %err, "claim attempt failed, retrying next iteration");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(idle_delay) => {}
                }
                idle_delay = (idle_delay * 2).min(backoff_ceiling);
                continue;
            }
        };

        idle_delay = poll_interval;

        let job_id = claimed.job.id;
        let attempt = claimed.job.attempt;
        let rows = aggregate(&claimed.events);

        match store.succeed(job_id, &rows).await {
            Ok(()) => {
                info!(worker_id = %worker_id, %job_id, attempt, "job succeeded");
            }
            Err(StoreError::Fatal(source)) => {
                error!(worker_id = %worker_id, %job_id, error = %source, "fatal store error while committing results, exiting");
                std::process::exit(1);
            }
            Err(err) => {
                warn!(worker_id = %worker_id, %job_id, attempt, error = %err, "processing failed, applying retry policy");
                match store
                    .fail(job_id, attempt, &err.to_string(), &config.retry_config)
                    .await
                {
                    Ok(()) => {}
                    Err(StoreError::Fatal(source)) => {
                        error!(worker_id = %worker_id, %job_id, error = %source, "fatal store error while persisting retry decision, exiting");
                        std::process::exit(1);
                    }
                    Err(fail_err) => {
                        error!(worker_id = %worker_id, %job_id, error = %fail_err, "could not persist retry decision");
                    }
                }
            }
        }
    }

    info!(worker_id = %worker_id, "worker loop exiting");
}
