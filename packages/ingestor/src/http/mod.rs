//! HTTP surface: the submission/query ports wrapped in axum routes
//! (§6). Specified at the interface level only — this module carries
//! no business logic of its own.

pub mod dto;
mod routes;
mod state;

pub use routes::router;
pub use state::AppState;
