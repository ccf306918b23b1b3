//! Job model: the row the claim protocol and retry policy operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Status of an ingestion job. See spec §3 for the state machine this
/// enum participates in (invariants live on `Job`, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ingestion_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

/// A job row as stored in `ingestion_jobs`.
///
/// Mutated only by workers (state, attempt, lock, timestamps, error,
/// processed_at) and never deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    pub tenant_id: String,

    #[builder(default)]
    pub idempotency_key: Option<String>,

    #[builder(default = JobStatus::Pending)]
    pub status: JobStatus,

    #[builder(default = 0)]
    pub attempt: i32,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,

    #[builder(default, setter(strip_option))]
    pub available_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub locked_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub locked_by: Option<String>,

    #[builder(default, setter(strip_option))]
    pub error: Option<String>,

    #[builder(default, setter(strip_option))]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a freshly submitted job: Pending, attempt 0, available now.
    pub fn new_submission(tenant_id: String, idempotency_key: Option<String>) -> Self {
        let now = Utc::now();
        Self::builder()
            .tenant_id(tenant_id)
            .idempotency_key(idempotency_key)
            .status(JobStatus::Pending)
            .attempt(0)
            .created_at(now)
            .updated_at(now)
            .available_at(now)
            .build()
    }
}
