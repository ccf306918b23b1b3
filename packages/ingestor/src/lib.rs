//! The durable ingestion engine: job store, claim protocol, retry
//! policy, worker loop, and the submission/query ports around them.
//!
//! Transport framing, routing, and process bootstrap live in
//! [`http`] and the `api`/`worker` binaries; everything that matters
//! for correctness lives in [`store`], [`retry`], and [`worker`].

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod ports;
pub mod retry;
pub mod store;
pub mod worker;

pub use config::Config;
