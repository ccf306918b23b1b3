use std::sync::Arc;

use crate::ports::{QueryPort, SubmissionPort};
use crate::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub submission: Arc<SubmissionPort>,
    pub query: Arc<QueryPort>,
    pub store: Arc<dyn JobStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            submission: Arc::new(SubmissionPort::new(store.clone())),
            query: Arc::new(QueryPort::new(store.clone())),
            store,
        }
    }
}
