//! Error types for dispatch execution
//!
//! Per-workstream outcomes are carried as [`ExecuteError`], which keeps
//! string payloads so it stays `Clone + Serialize` for result records and
//! the failed map. Run-level failures are [`DispatchError`].

use crate::breaker::BreakerError;
use crate::graph::GraphError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque error returned by a caller-supplied workstream function
pub type WorkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why one workstream did not succeed
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ExecuteError {
    /// The circuit breaker rejected the workstream without attempting it
    #[error("circuit breaker rejected the workstream")]
    CircuitOpen,

    /// The workstream was attempted and failed
    #[error("workstream failed: {0}")]
    Failed(String),
}

impl ExecuteError {
    /// Returns true for the circuit-open rejection sentinel
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }
}

impl From<BreakerError<WorkError>> for ExecuteError {
    fn from(e: BreakerError<WorkError>) -> Self {
        match e {
            BreakerError::Open => Self::CircuitOpen,
            BreakerError::Operation(err) => Self::Failed(err.to_string()),
        }
    }
}

/// Errors that abort a dispatcher run
///
/// Per-workstream failures never abort the run; these are structural or
/// runtime faults of the run itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// The dependency graph rejected a mutation or query
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// No workstream became ready for too many consecutive rounds even
    /// though work remains: the dependency state is stuck
    #[error("no ready workstreams after {rounds} empty rounds with {remaining} remaining")]
    Stalled {
        /// Consecutive empty rounds observed
        rounds: u32,
        /// Workstreams still unaccounted for
        remaining: usize,
    },

    /// A spawned workstream task panicked or was cancelled
    #[error("workstream task failed to join: {0}")]
    TaskJoin(String),
}
