//! Storage abstraction boundary (§9: "the core needs only one
//! abstraction boundary — the job store").

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregator::AggregateRow;
use crate::domain::{Job, JobStatus, NewEvent, RawEvent, ResultRow};
use crate::error::StoreError;
use crate::retry::RetryConfig;

/// Result of a submission attempt, distinguishing a freshly created job
/// from an idempotency-key hit on an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(Uuid),
    Duplicate(Uuid),
}

impl SubmitOutcome {
    pub fn job_id(&self) -> Uuid {
        match self {
            SubmitOutcome::Created(id) | SubmitOutcome::Duplicate(id) => *id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmitOutcome::Duplicate(_))
    }
}

/// A job handed to a worker by the claim protocol, together with the
/// events it must aggregate.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: Job,
    pub events: Vec<RawEvent>,
}

/// Snapshot returned by the query port's status read.
#[derive(Debug, Clone)]
pub struct JobStatusSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub attempt: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// The one abstraction boundary the engine depends on. Implementations
/// may be tested against a real database or a fake honoring the same
/// transactional contract (§9).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically insert a job plus its events (C6). On an idempotency
    /// key conflict, returns `SubmitOutcome::Duplicate` with the
    /// pre-existing job id instead of erroring.
    async fn submit(
        &self,
        tenant_id: &str,
        idempotency_key: Option<&str>,
        new_events: Vec<NewEvent>,
    ) -> Result<SubmitOutcome, StoreError>;

    /// Claim one eligible job (C3), or `None` if there is no work.
    async fn claim_next(
        &self,
        worker_id: &str,
        stale_lock_timeout: Duration,
    ) -> Result<Option<ClaimedJob>, StoreError>;

    /// Replace a job's results and mark it Succeeded, in one
    /// transaction (C5 step 4).
    async fn succeed(&self, job_id: Uuid, rows: &[AggregateRow]) -> Result<(), StoreError>;

    /// Apply the retry policy's decision for a failed attempt (C4),
    /// releasing the lock either way.
    async fn fail(
        &self,
        job_id: Uuid,
        attempt: i32,
        error_message: &str,
        retry_config: &RetryConfig,
    ) -> Result<(), StoreError>;

    /// `GetStatus` (C7). `None` means "not found".
    async fn get_status(&self, job_id: Uuid) -> Result<Option<JobStatusSnapshot>, StoreError>;

    /// `GetResults` (C7). `None` means "not found"; `Some(vec![])` means
    /// found but not (yet) Succeeded, or Succeeded with no event types
    /// — the latter cannot happen because submission requires >= 1
    /// event, but the type does not need to forbid it.
    async fn get_results(&self, job_id: Uuid) -> Result<Option<Vec<ResultRow>>, StoreError>;

    /// Trivial liveness probe for `/health/ready`.
    async fn ping(&self) -> Result<(), StoreError>;
}
