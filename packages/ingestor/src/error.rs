//! Error taxonomy shared by the store and the HTTP ports (§7).

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

/// Errors the job store surfaces to its callers.
///
/// `Conflict` is recovered locally by the submission port (re-read and
/// return the sibling job id). `Transient` is retryable at the loop
/// level. `Fatal` should cause the worker process to exit non-zero.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate submission for existing job {existing_job_id}")]
    Conflict { existing_job_id: Uuid },

    #[error("transient store error: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("fatal store error: {0}")]
    Fatal(#[source] sqlx::Error),
}

impl StoreError {
    /// Classify a raw `sqlx::Error` the way `store::postgres` does at
    /// every call site: unique-violation -> caller decides Conflict,
    /// connection/serialization trouble -> Transient, anything else
    /// (bad SQL, missing table, permission) -> Fatal.
    pub fn classify(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                // serialization_failure / deadlock_detected
                Some("40001") | Some("40P01") => return StoreError::Transient(err),
                _ => {}
            }
        }
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Transient(err)
            }
            other => StoreError::Fatal(other),
        }
    }
}

/// Errors the HTTP ports surface to clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(HashMap<String, Vec<String>>),

    #[error("not found")]
    NotFound,

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => {
                // Callers that care about duplicates inspect StoreError
                // directly before converting; reaching here means a
                // conflict surfaced somewhere that wasn't expecting one.
                ApiError::Internal(anyhow::anyhow!(err))
            }
            other => ApiError::Internal(anyhow::anyhow!(other)),
        }
    }
}

#[derive(Serialize)]
struct ValidationBody {
    errors: HashMap<String, Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(ValidationBody { errors })).into_response()
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error handling request");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
