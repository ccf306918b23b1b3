//! Raw event model: an immutable child of exactly one job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One item inside a submission, preserved verbatim.
///
/// Raw events are immutable once written; deletion of a job cascades
/// to its events (see migration for the foreign key).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RawEvent {
    pub id: i64,
    pub job_id: Uuid,
    pub tenant_id: String,
    #[sqlx(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// A not-yet-persisted event, as supplied by a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}
