//! Query port (C7): read-only status and result lookups.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::ResultRow;
use crate::error::ApiError;
use crate::store::{JobStatusSnapshot, JobStore};

pub struct QueryPort {
    store: Arc<dyn JobStore>,
}

impl QueryPort {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<JobStatusSnapshot, ApiError> {
        self.store
            .get_status(job_id)
            .await?
            .ok_or(ApiError::NotFound)
    }

    pub async fn get_results(&self, job_id: Uuid) -> Result<Vec<ResultRow>, ApiError> {
        self.store
            .get_results(job_id)
            .await?
            .ok_or(ApiError::NotFound)
    }
}
