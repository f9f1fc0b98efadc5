//! Search orchestration
//!
//! Submission, polling, and paginated retrieval of one search run.

mod executor;
mod models;

pub use executor::{Orchestrator, RunFailure, RunOutcome};
pub use models::{QueryIntent, SearchHandle, SearchState};
