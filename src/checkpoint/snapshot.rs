//! Checkpoint data model
//!
//! Everything here is a plain deep copy with no references back into the
//! running graph or breaker, so a checkpoint can be serialized and later
//! restored in a fresh process.

use crate::breaker::BreakerSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current checkpoint file format version
///
/// Written on save for forward compatibility; not yet validated on load.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Deep copy of one graph node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub depends_on: Vec<String>,
    pub indegree: usize,
    pub completed: bool,
}

/// Deep copy of the dependency graph's structure and scheduling state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in insertion order
    pub nodes: Vec<NodeSnapshot>,
    /// Map from id to direct dependents
    pub edges: HashMap<String, Vec<String>>,
}

/// Durable snapshot of one dispatcher run
///
/// Persisted after each execution round, loaded once at dispatcher start
/// when resuming, and deleted only after a zero-failure completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub feature_id: String,
    pub timestamp: DateTime<Utc>,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub graph: GraphSnapshot,
    pub breaker: BreakerSnapshot,
}
