//! External workstream interface
//!
//! Workstream lists come from an external parser as `{id, depends_on}`
//! tuples in dependency order. This module is the only place that shape
//! is known; the rest of the crate works with [`DependencyGraph`] directly.

use super::dependency_graph::DependencyGraph;
use super::error::GraphResult;
use serde::{Deserialize, Serialize};

/// One workstream as supplied by an external parser
///
/// The parser is responsible for ordering: every dependency must appear
/// before its dependents in the list handed to [`build_graph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkstreamSpec {
    /// Unique workstream id
    pub id: String,
    /// Ids of workstreams that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl WorkstreamSpec {
    /// Creates a spec with no dependencies
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
        }
    }

    /// Adds a dependency, builder style
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }
}

/// Builds a dependency graph from externally supplied workstreams
///
/// Calls [`DependencyGraph::add_node`] per entry in the given order.
///
/// # Errors
///
/// [`crate::graph::GraphError::MissingDependency`] if the list is not in
/// dependency order, [`crate::graph::GraphError::NodeExists`] on duplicate
/// ids.
pub fn build_graph(specs: &[WorkstreamSpec]) -> GraphResult<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    for spec in specs {
        graph.add_node(&spec.id, &spec.depends_on)?;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;

    #[test]
    fn test_build_graph() {
        let specs = vec![
            WorkstreamSpec::new("a"),
            WorkstreamSpec::new("b").depends_on("a"),
            WorkstreamSpec::new("c").depends_on("a").depends_on("b"),
        ];

        let graph = build_graph(&specs).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.ready(), vec!["a"]);
        assert_eq!(graph.node("c").unwrap().indegree(), 2);
    }

    #[test]
    fn test_build_graph_rejects_bad_order() {
        let specs = vec![
            WorkstreamSpec::new("b").depends_on("a"),
            WorkstreamSpec::new("a"),
        ];

        let result = build_graph(&specs);
        assert!(matches!(result, Err(GraphError::MissingDependency { .. })));
    }

    #[test]
    fn test_spec_roundtrips_as_json() {
        let spec = WorkstreamSpec::new("ws-1").depends_on("ws-0");
        let json = serde_json::to_string(&spec).unwrap();
        let back: WorkstreamSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn test_depends_on_defaults_when_absent() {
        let spec: WorkstreamSpec = serde_json::from_str(r#"{"id":"solo"}"#).unwrap();
        assert!(spec.depends_on.is_empty());
    }
}
