//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur during a scheduling cycle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no nodes registered")]
    NoNodes,

    #[error("state store error: {0}")]
    State(#[from] schedperf_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
