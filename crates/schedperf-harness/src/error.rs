//! Harness error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which kind of object a creation call was building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Node,
    Pod,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Node => f.write_str("node"),
            ObjectKind::Pod => f.write_str("pod"),
        }
    }
}

/// Errors that can abort a benchmark case.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to create {kind} {name}: {source}")]
    Creation {
        kind: ObjectKind,
        name: String,
        #[source]
        source: schedperf_state::StateError,
    },

    #[error("scheduled-pod query failed after {attempts} attempts: {source}")]
    Query {
        attempts: u32,
        #[source]
        source: schedperf_state::StateError,
    },

    #[error("scheduler did not converge: {observed}/{target} pods scheduled after {waited:?}")]
    ConvergenceTimeout {
        target: usize,
        observed: usize,
        waited: Duration,
    },

    #[error("benchmark cancelled")]
    Cancelled,

    #[error("environment error: {0}")]
    Environment(#[from] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HarnessError {
    /// Whether the error came from the scheduler not keeping up (as opposed
    /// to the control plane or the harness itself failing).
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::ConvergenceTimeout { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
