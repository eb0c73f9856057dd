//! Per-workstream execution records

use super::error::ExecuteError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one attempted workstream
///
/// One record is produced per attempted workstream per run, accumulated in
/// batch-completion order and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// The workstream this record is for
    pub workstream_id: String,
    /// True when the workstream ran and returned success
    pub success: bool,
    /// Why the workstream did not succeed, when it didn't
    pub error: Option<ExecuteError>,
    /// Wall time spent on the attempt, including breaker admission
    pub duration: Duration,
}

impl ExecuteResult {
    /// Creates a success record
    pub fn success(workstream_id: impl Into<String>, duration: Duration) -> Self {
        Self {
            workstream_id: workstream_id.into(),
            success: true,
            error: None,
            duration,
        }
    }

    /// Creates a failure record
    pub fn failure(
        workstream_id: impl Into<String>,
        error: ExecuteError,
        duration: Duration,
    ) -> Self {
        Self {
            workstream_id: workstream_id.into(),
            success: false,
            error: Some(error),
            duration,
        }
    }
}
