//! Result row model: one (event type, count) pair produced for a job.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// For a Succeeded job, the set of result rows is exactly the output of
/// the aggregator applied to the job's raw events: no duplicates on
/// `(job_id, event_type)`, exhaustive over observed types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResultRow {
    pub id: i64,
    pub job_id: Uuid,
    pub event_type: String,
    pub count: i32,
}
