//! Error types for graph operations
//!
//! This module hides error representation details and provides
//! a unified error type for all dependency-graph mutations and queries.

use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur during graph operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// A workstream was added with an id already present in the graph
    #[error("workstream already exists: {id}")]
    NodeExists {
        /// The duplicate workstream id
        id: String,
    },

    /// A declared dependency is not (yet) a node in the graph
    ///
    /// Dependencies must be declared before their dependents, so callers
    /// must supply workstreams in a valid build order.
    #[error("dependency '{dependency}' for workstream '{node}' does not exist")]
    MissingDependency {
        /// The workstream that declared the dependency
        node: String,
        /// The dependency that was not found
        dependency: String,
    },

    /// An edge endpoint was not found in the graph
    #[error("workstream not found: {id}")]
    NodeNotFound {
        /// The workstream id that was not found
        id: String,
    },

    /// A mutation would introduce a cycle, or the graph already contains one
    #[error("circular dependency: {path}")]
    CircularDependency {
        /// Human-readable description of the offending edge or cycle
        path: String,
    },
}

impl GraphError {
    /// Creates a node-exists error
    pub fn node_exists(id: impl Into<String>) -> Self {
        Self::NodeExists { id: id.into() }
    }

    /// Creates a missing-dependency error
    pub fn missing_dependency(node: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            node: node.into(),
            dependency: dependency.into(),
        }
    }

    /// Creates a node-not-found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Creates a circular-dependency error with the given path description
    pub fn cycle(path: impl Into<String>) -> Self {
        Self::CircularDependency { path: path.into() }
    }
}
