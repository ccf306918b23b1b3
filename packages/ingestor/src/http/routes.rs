//! The thin HTTP wrapper over the submission and query ports (§6).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::error::ApiError;
use crate::ports::SubmissionInput;

use super::dto::{
    IngestionStatusResponse, ResultRowResponse, SubmitIngestionBody, SubmitIngestionResponse,
};
use super::state::AppState;

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/ingestions", post(submit_ingestion))
        .route("/v1/ingestions/:job_id", get(get_ingestion_status))
        .route("/v1/results/:job_id", get(get_ingestion_results))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .with_state(state)
}

async fn submit_ingestion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitIngestionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let input: SubmissionInput = body.into_input(idempotency_key);
    let (job_id, _is_duplicate) = state.submission.submit(input).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitIngestionResponse { job_id }),
    ))
}

async fn get_ingestion_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<IngestionStatusResponse>, ApiError> {
    let snapshot = state.query.get_status(job_id).await?;
    Ok(Json(snapshot.into()))
}

async fn get_ingestion_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<ResultRowResponse>>, ApiError> {
    let rows = state.query.get_results(job_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

async fn health_live() -> StatusCode {
    StatusCode::OK
}

async fn health_ready(State(state): State<AppState>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
