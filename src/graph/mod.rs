//! Dependency graph structures for workstream scheduling
//!
//! This module hides the graph representation. It owns structural validity
//! (no cycles, no dangling dependencies), in-degree bookkeeping, and the
//! topological / ready-set queries the dispatcher drives each round.

mod dependency_graph;
mod error;
mod workstream;

pub use dependency_graph::{DependencyGraph, WorkstreamNode};
pub use error::{GraphError, GraphResult};
pub use workstream::{build_graph, WorkstreamSpec};
