//! Process configuration loaded from the environment (§6).

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,

    pub http_port: u16,

    pub worker_concurrency: usize,
    pub worker_poll_seconds: u64,
    pub worker_idle_backoff_max_seconds: u64,
    pub stale_lock_timeout_seconds: i64,
    pub worker_id_prefix: String,

    pub max_attempts: i32,
    pub base_backoff_seconds: i64,

    pub run_migrations_on_startup: bool,
}

impl Config {
    /// Load configuration from the process environment, applying the
    /// defaults from spec §6 for everything the caller doesn't set.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let worker_poll_seconds = env_parse("WORKER_POLL_SECONDS", 1)?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,

            http_port: env_parse("HTTP_PORT", 8080)?,

            worker_concurrency: env_parse("WORKER_CONCURRENCY", 2)?,
            worker_poll_seconds,
            worker_idle_backoff_max_seconds: env_parse(
                "WORKER_IDLE_BACKOFF_MAX_SECONDS",
                worker_poll_seconds,
            )?,
            stale_lock_timeout_seconds: env_parse("STALE_LOCK_TIMEOUT_SECONDS", 300)?,
            worker_id_prefix: env::var("WORKER_ID").unwrap_or_else(|_| hostname_fallback()),

            max_attempts: env_parse("MAX_ATTEMPTS", 5)?,
            base_backoff_seconds: env_parse("BASE_BACKOFF_SECONDS", 2)?,

            run_migrations_on_startup: env_parse("RUN_MIGRATIONS_ON_STARTUP", false)?,
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_backoff_seconds: self.base_backoff_seconds,
        }
    }

    pub fn stale_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_lock_timeout_seconds.max(0) as u64)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} must be valid: {e}")),
        Err(_) => Ok(default),
    }
}

fn hostname_fallback() -> String {
    env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string())
}
