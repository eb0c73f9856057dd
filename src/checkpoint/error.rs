//! Error types for checkpoint persistence

use std::path::PathBuf;
use thiserror::Error;

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors that can occur while persisting or loading checkpoints
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CheckpointError {
    /// Filesystem operation failed
    #[error("checkpoint i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint could not be serialized
    #[error("checkpoint encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Checkpoint file exists but does not parse; the bytes have been
    /// preserved at `quarantined`
    #[error("corrupt checkpoint quarantined at {}: {reason}", .quarantined.display())]
    Corrupt {
        /// Where the unparseable file was moved
        quarantined: PathBuf,
        /// The underlying parse failure
        reason: String,
    },
}
