//! Wire shapes for the HTTP surface (§6). Field names follow the
//! camelCase convention the spec's endpoint bodies use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::JobStatus;
use crate::domain::ResultRow;
use crate::ports::{NewEventInput, SubmissionInput};
use crate::store::JobStatusSnapshot;

#[derive(Debug, Deserialize)]
pub struct SubmitEventBody {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_payload")]
    pub payload: Value,
}

fn default_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
pub struct SubmitIngestionBody {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub events: Vec<SubmitEventBody>,
}

impl SubmitIngestionBody {
    pub fn into_input(self, idempotency_key: Option<String>) -> SubmissionInput {
        SubmissionInput {
            tenant_id: self.tenant_id,
            idempotency_key,
            events: self
                .events
                .into_iter()
                .map(|e| NewEventInput {
                    event_type: e.event_type,
                    timestamp: e.timestamp,
                    payload: e.payload,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitIngestionResponse {
    #[serde(rename = "jobId")]
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct IngestionStatusResponse {
    #[serde(rename = "jobId")]
    pub job_id: Uuid,
    pub status: JobStatus,
    pub attempt: i32,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "processedAt")]
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<JobStatusSnapshot> for IngestionStatusResponse {
    fn from(snapshot: JobStatusSnapshot) -> Self {
        Self {
            job_id: snapshot.id,
            status: snapshot.status,
            attempt: snapshot.attempt,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            processed_at: snapshot.processed_at,
            error: snapshot.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultRowResponse {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub count: i32,
}

impl From<ResultRow> for ResultRowResponse {
    fn from(row: ResultRow) -> Self {
        Self {
            event_type: row.event_type,
            count: row.count,
        }
    }
}
