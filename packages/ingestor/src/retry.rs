//! Retry / backoff / terminal-failure policy (C4).
//!
//! A pure function of `(attempt, configuration)`. The worker persists
//! whichever decision comes back in the same transaction that releases
//! the claim lock (see `store::JobStore::fail`).

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: i32,
    pub base_backoff_seconds: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_seconds: 2,
        }
    }
}

/// Hard ceiling on the backoff delay, regardless of configuration.
const MAX_DELAY_SECONDS: i64 = 300;

/// Attempt exponent beyond which the delay no longer grows.
const MAX_BACKOFF_EXPONENT: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry is available; reschedule `delay_seconds` from now.
    Retry { delay_seconds: i64 },
    /// `attempt >= max_attempts`; the job is terminally Failed.
    Exhausted,
}

/// `delay_seconds = min(300, base_backoff_seconds * 2^(clamp(attempt,1,10) - 1))`.
pub fn next_attempt(attempt: i32, config: &RetryConfig) -> RetryDecision {
    if attempt >= config.max_attempts {
        return RetryDecision::Exhausted;
    }

    let clamped = attempt.clamp(1, MAX_BACKOFF_EXPONENT) as u32;
    let delay = config
        .base_backoff_seconds
        .saturating_mul(1i64 << (clamped - 1));

    RetryDecision::Retry {
        delay_seconds: delay.min(MAX_DELAY_SECONDS),
    }
}
