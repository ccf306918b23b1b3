//! Entry point for the worker process: spawns `worker_concurrency`
//! independent polling loops (§4.5, §5).

use std::sync::Arc;

use anyhow::{Context, Result};
use ingestor_core::store::{JobStore, PostgresJobStore};
use ingestor_core::worker::{WorkerLoopConfig, WorkerSupervisor};
use ingestor_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ingestor_core=debug,sqlx=warn".into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to the store")?;

    // The worker always applies migrations on boot: unlike the API,
    // there is no flag gating this, since a worker with a stale schema
    // cannot do anything useful anyway.
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    let store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::new(pool));

    let shutdown = CancellationToken::new();
    let loop_config = WorkerLoopConfig {
        worker_poll_seconds: config.worker_poll_seconds,
        worker_idle_backoff_max_seconds: config.worker_idle_backoff_max_seconds,
        stale_lock_timeout: config.stale_lock_timeout(),
        retry_config: config.retry_config(),
    };

    let supervisor = WorkerSupervisor::spawn(
        store,
        &config.worker_id_prefix,
        config.worker_concurrency,
        loop_config,
        shutdown.clone(),
    );

    tracing::info!(
        concurrency = config.worker_concurrency,
        "ingestor-worker running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    tracing::info!("shutdown signal received, draining worker loops");
    supervisor.shutdown().await;

    Ok(())
}
