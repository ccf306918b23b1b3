//! Spawns `worker_concurrency` independent loops and joins them on
//! shutdown (§4.5: "the number of loops is a runtime constant").

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::store::JobStore;

use super::worker_loop::{self, WorkerLoopConfig};

pub struct WorkerSupervisor {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerSupervisor {
    pub fn spawn(
        store: Arc<dyn JobStore>,
        worker_id_prefix: &str,
        concurrency: usize,
        config: WorkerLoopConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let handles = (0..concurrency.max(1))
            .map(|slot| {
                let store = store.clone();
                let worker_id = format!(
                    "{}-slot{slot}",
                    worker_loop::worker_identity(worker_id_prefix)
                );
                let config = config.clone();
                let shutdown = shutdown.clone();
                info!(worker_id = %worker_id, "spawning worker loop");
                tokio::spawn(worker_loop::run(store, worker_id, config, shutdown))
            })
            .collect();

        Self { handles, shutdown }
    }

    /// Signal every loop to stop and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
