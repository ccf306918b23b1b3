//! Thin ports onto the job store: submission (C6) and query (C7).

mod query;
mod submission;

pub use query::QueryPort;
pub use submission::{NewEventInput, SubmissionInput, SubmissionPort};
