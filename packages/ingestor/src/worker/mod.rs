//! The worker loop (C5): claim, aggregate, commit-or-fail, idle backoff.

mod supervisor;
mod worker_loop;

pub use supervisor::WorkerSupervisor;
pub use worker_loop::{run, worker_identity, WorkerLoopConfig};
