//! Entry point for the API process: HTTP submission + query surface,
//! sharing the store with the worker process (§5).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ingestor_core::http::{router, AppState};
use ingestor_core::store::{JobStore, PostgresJobStore};
use ingestor_core::Config;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
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

    if config.run_migrations_on_startup {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running migrations")?;
    }

    let store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::new(pool));
    let state = AppState::new(store);

    let app = router(state).layer(
        tower::ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("binding to port {}", config.http_port))?;

    tracing::info!(port = config.http_port, "ingestor-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
