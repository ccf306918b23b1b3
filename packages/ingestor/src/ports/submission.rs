//! Submission port (C6): validates and atomically creates a job with
//! its events, enforcing idempotency (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::event::NewEvent;
use crate::error::ApiError;
use crate::store::{JobStore, SubmitOutcome};

/// One event as received by the port, before it becomes a `NewEvent`.
#[derive(Debug, Clone)]
pub struct NewEventInput {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

/// A submission request, already deserialized from its transport
/// representation.
#[derive(Debug, Clone)]
pub struct SubmissionInput {
    pub tenant_id: String,
    pub idempotency_key: Option<String>,
    pub events: Vec<NewEventInput>,
}

pub struct SubmissionPort {
    store: Arc<dyn JobStore>,
}

impl SubmissionPort {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Validate then submit. Returns the job id and whether it already
    /// existed (a duplicate under the same idempotency key).
    pub async fn submit(&self, input: SubmissionInput) -> Result<(Uuid, bool), ApiError> {
        validate(&input).map_err(ApiError::Validation)?;

        let tenant_id = input.tenant_id.trim();
        let idempotency_key = input.idempotency_key.as_deref();
        let new_events = input
            .events
            .into_iter()
            .map(|e| NewEvent {
                event_type: e.event_type,
                timestamp: e.timestamp,
                payload: e.payload,
            })
            .collect();

        let outcome = self
            .store
            .submit(tenant_id, idempotency_key, new_events)
            .await?;

        Ok(match outcome {
            SubmitOutcome::Created(id) => (id, false),
            SubmitOutcome::Duplicate(id) => (id, true),
        })
    }
}

fn validate(input: &SubmissionInput) -> Result<(), HashMap<String, Vec<String>>> {
    let mut errors: HashMap<String, Vec<String>> = HashMap::new();

    if input.tenant_id.trim().is_empty() {
        errors
            .entry("tenantId".to_string())
            .or_default()
            .push("must not be blank".to_string());
    }

    if input.events.is_empty() {
        errors
            .entry("events".to_string())
            .or_default()
            .push("must contain at least one event".to_string());
    }

    for (i, event) in input.events.iter().enumerate() {
        if event.event_type.trim().is_empty() {
            errors
                .entry(format!("events[{i}].type"))
                .or_default()
                .push("must not be blank".to_string());
        }
        if event.timestamp == DateTime::<Utc>::UNIX_EPOCH {
            errors
                .entry(format!("events[{i}].timestamp"))
                .or_default()
                .push("must be set".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_event() -> NewEventInput {
        NewEventInput {
            event_type: "click".to_string(),
            timestamp: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn rejects_blank_tenant() {
        let input = SubmissionInput {
            tenant_id: "   ".to_string(),
            idempotency_key: None,
            events: vec![valid_event()],
        };
        let errors = validate(&input).unwrap_err();
        assert!(errors.contains_key("tenantId"));
    }

    #[test]
    fn rejects_empty_events() {
        let input = SubmissionInput {
            tenant_id: "t1".to_string(),
            idempotency_key: None,
            events: vec![],
        };
        let errors = validate(&input).unwrap_err();
        assert!(errors.contains_key("events"));
    }

    #[test]
    fn accepts_well_formed_input() {
        let input = SubmissionInput {
            tenant_id: "t1".to_string(),
            idempotency_key: Some("k1".to_string()),
            events: vec![valid_event()],
        };
        assert!(validate(&input).is_ok());
    }
}
