//! Error type for circuit-breaker guarded operations

use thiserror::Error;

/// Outcome of a guarded operation that did not succeed
///
/// Distinguishes "not even attempted" ([`BreakerError::Open`]) from
/// "attempted and failed" ([`BreakerError::Operation`]), so callers can
/// match on the rejection sentinel without string comparison.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the operation was rejected without being invoked
    #[error("circuit breaker is open")]
    Open,

    /// The operation ran and returned this error
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns true for the open-circuit rejection sentinel
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the operation error, if the operation was attempted
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Open => None,
            Self::Operation(e) => Some(e),
        }
    }
}
