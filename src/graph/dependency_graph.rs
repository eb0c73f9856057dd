//! Dependency graph for workstream scheduling
//!
//! # Design
//!
//! The graph is an arena keyed by string id: nodes live in a map and edges
//! are id lists, so there are no node-to-node references and no ownership
//! cycles. Each node carries its own scheduling state (`indegree`,
//! `completed`) because the ready-set query is the hot path of every
//! dispatch round and must be O(V) without consulting edge lists.
//!
//! `edges` maps a workstream id to its direct dependents (outgoing edges),
//! which is what `mark_complete` needs; the reverse direction is recorded
//! on the node itself as `depends_on`.
//!
//! Iteration and the ready set follow insertion order so that scheduling
//! is deterministic among equal candidates. Callers must not rely on this:
//! the ready set is a set.

use super::error::{GraphError, GraphResult};
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use std::collections::HashMap;

/// A node in the dependency graph representing one workstream
///
/// `depends_on` is fixed at creation; `indegree` starts at
/// `depends_on.len()` and is decremented as dependencies complete;
/// `completed` is monotonic and never reset.
#[derive(Debug, Clone)]
pub struct WorkstreamNode {
    id: String,
    depends_on: Vec<String>,
    indegree: usize,
    completed: bool,
}

impl WorkstreamNode {
    fn new(id: String, depends_on: Vec<String>) -> Self {
        let indegree = depends_on.len();
        Self {
            id,
            depends_on,
            indegree,
            completed: false,
        }
    }

    /// Rebuilds a node from persisted state, trusting the given counters.
    pub(crate) fn restored(
        id: String,
        depends_on: Vec<String>,
        indegree: usize,
        completed: bool,
    ) -> Self {
        Self {
            id,
            depends_on,
            indegree,
            completed,
        }
    }

    /// Returns the workstream id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the declared dependencies (fixed at creation)
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Returns the number of dependencies that have not yet completed
    pub fn indegree(&self) -> usize {
        self.indegree
    }

    /// Returns true once the workstream has been marked complete
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// A directed acyclic graph of workstream dependencies
///
/// # Example
///
/// ```
/// use taxis::graph::DependencyGraph;
///
/// let mut graph = DependencyGraph::new();
/// graph.add_node("fetch", &[]).unwrap();
/// graph.add_node("build", &["fetch".to_string()]).unwrap();
/// graph.add_node("test", &["build".to_string()]).unwrap();
///
/// assert_eq!(graph.ready(), vec!["fetch".to_string()]);
///
/// let order = graph.topological_sort().unwrap();
/// assert_eq!(order, vec!["fetch", "build", "test"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Map from workstream id to node
    nodes: HashMap<String, WorkstreamNode>,
    /// Map from workstream id to its direct dependents (outgoing edges)
    edges: HashMap<String, Vec<String>>,
    /// Insertion order for deterministic iteration
    insertion_order: Vec<String>,
}

impl DependencyGraph {
    /// Creates a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of workstreams in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no workstreams
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true if the workstream exists in the graph
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns a reference to a workstream node
    pub fn node(&self, id: &str) -> Option<&WorkstreamNode> {
        self.nodes.get(id)
    }

    /// Returns an iterator over all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &WorkstreamNode> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    /// Returns the direct dependents of a workstream (its outgoing edges)
    pub fn dependents(&self, id: &str) -> Option<&[String]> {
        self.edges.get(id).map(|d| d.as_slice())
    }

    /// Adds a workstream with its declared dependencies
    ///
    /// Every entry of `depends_on` must already be a node in the graph, so
    /// callers must add workstreams in dependency order.
    ///
    /// # Errors
    ///
    /// - [`GraphError::NodeExists`] if `id` is already present
    /// - [`GraphError::MissingDependency`] if a dependency has not been added
    pub fn add_node(&mut self, id: &str, depends_on: &[String]) -> GraphResult<()> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::node_exists(id));
        }
        for dep in depends_on {
            if !self.nodes.contains_key(dep) {
                return Err(GraphError::missing_dependency(id, dep));
            }
        }

        self.insertion_order.push(id.to_string());
        self.nodes.insert(
            id.to_string(),
            WorkstreamNode::new(id.to_string(), depends_on.to_vec()),
        );
        self.edges.insert(id.to_string(), Vec::new());
        for dep in depends_on {
            // Checked above; entry covers a dependency added before edges
            // bookkeeping existed (restored graphs).
            self.edges
                .entry(dep.clone())
                .or_default()
                .push(id.to_string());
        }
        Ok(())
    }

    /// Adds an edge `from -> to`: `to` depends on `from`
    ///
    /// Duplicate edges are idempotent no-ops. A rejected call leaves the
    /// graph unmodified.
    ///
    /// # Errors
    ///
    /// - [`GraphError::NodeNotFound`] if either endpoint is missing
    /// - [`GraphError::CircularDependency`] if `from` is reachable from `to`
    pub fn add_edge(&mut self, from: &str, to: &str) -> GraphResult<()> {
        if !self.nodes.contains_key(from) {
            return Err(GraphError::node_not_found(from));
        }
        if !self.nodes.contains_key(to) {
            return Err(GraphError::node_not_found(to));
        }
        if let Some(dependents) = self.edges.get(from) {
            if dependents.iter().any(|d| d == to) {
                return Ok(());
            }
        }
        // A path to -> ... -> from means adding from -> to closes a cycle.
        // Self-edges fall out of the same check since reaches(x, x) is true.
        if self.reaches(to, from) {
            return Err(GraphError::cycle(format!(
                "adding edge {from} -> {to} would create a cycle"
            )));
        }

        self.edges.entry(from.to_string()).or_default().push(to.to_string());
        if let Some(node) = self.nodes.get_mut(to) {
            node.depends_on.push(from.to_string());
            node.indegree += 1;
        }
        Ok(())
    }

    /// Returns true if `target` is reachable from `start` following edges
    fn reaches(&self, start: &str, target: &str) -> bool {
        let mut stack = vec![start];
        let mut visited = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(dependents) = self.edges.get(id) {
                stack.extend(dependents.iter().map(|d| d.as_str()));
            }
        }
        false
    }

    /// Returns a valid topological ordering of all workstream ids
    ///
    /// Uses Kahn's algorithm seeded in insertion order, so the result is
    /// deterministic among equal candidates. O(V+E).
    ///
    /// # Errors
    ///
    /// [`GraphError::CircularDependency`] if the graph contains a cycle.
    pub fn topological_sort(&self) -> GraphResult<Vec<String>> {
        let mut indegrees: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.as_str(), node.depends_on.len()))
            .collect();

        let mut queue: std::collections::VecDeque<&str> = self
            .insertion_order
            .iter()
            .map(|id| id.as_str())
            .filter(|id| indegrees.get(id) == Some(&0))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            result.push(id.to_string());
            if let Some(dependents) = self.edges.get(id) {
                for dependent in dependents {
                    if let Some(degree) = indegrees.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(GraphError::cycle(
                "graph contains a cycle - topological sort not possible",
            ));
        }
        Ok(result)
    }

    /// Returns every workstream with no pending dependencies that has not
    /// yet been marked complete
    ///
    /// Order follows insertion order, but callers should treat the result
    /// as a set.
    pub fn ready(&self) -> Vec<String> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.indegree == 0 && !node.completed)
            .map(|node| node.id.clone())
            .collect()
    }

    /// Marks a workstream complete and unblocks its direct dependents
    ///
    /// Decrements the indegree of every direct dependent; the update is not
    /// transitive and does not validate that `id` was actually ready.
    /// Unknown ids and already-completed workstreams are no-ops, which
    /// keeps `completed` monotonic and indegrees from underflowing.
    pub fn mark_complete(&mut self, id: &str) {
        match self.nodes.get_mut(id) {
            Some(node) if !node.completed => node.completed = true,
            _ => return,
        }
        if let Some(dependents) = self.edges.get(id).cloned() {
            for dependent in dependents {
                if let Some(node) = self.nodes.get_mut(&dependent) {
                    node.indegree = node.indegree.saturating_sub(1);
                }
            }
        }
    }

    /// Rebuilds a graph from persisted parts without validation.
    pub(crate) fn from_parts(
        nodes: Vec<WorkstreamNode>,
        edges: HashMap<String, Vec<String>>,
    ) -> Self {
        let insertion_order = nodes.iter().map(|n| n.id.clone()).collect();
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            nodes,
            edges,
            insertion_order,
        }
    }

    /// Renders the graph in Graphviz DOT format
    ///
    /// ```ignore
    /// std::fs::write("graph.dot", graph.to_dot())?;
    /// // dot -Tpng graph.dot -o graph.png
    /// ```
    pub fn to_dot(&self) -> String {
        let mut dot_graph = DiGraph::<String, ()>::new();
        let mut indices = HashMap::new();

        for id in &self.insertion_order {
            let idx = dot_graph.add_node(id.clone());
            indices.insert(id.as_str(), idx);
        }
        for id in &self.insertion_order {
            if let Some(dependents) = self.edges.get(id) {
                for dependent in dependents {
                    if let (Some(&from), Some(&to)) =
                        (indices.get(id.as_str()), indices.get(dependent.as_str()))
                    {
                        dot_graph.add_edge(from, to, ());
                    }
                }
            }
        }

        format!("{:?}", Dot::with_config(&dot_graph, &[Config::EdgeNoLabel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
        assert!(graph.ready().is_empty());
    }

    #[test]
    fn test_add_node() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.contains("a"));
        assert_eq!(graph.node("b").unwrap().indegree(), 1);
        assert_eq!(graph.dependents("a").unwrap(), &["b".to_string()]);
    }

    #[test]
    fn test_duplicate_node_error() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();

        let result = graph.add_node("a", &[]);
        assert!(matches!(result, Err(GraphError::NodeExists { .. })));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_missing_dependency_error() {
        let mut graph = DependencyGraph::new();
        let result = graph.add_node("b", &deps(&["a"]));
        assert!(matches!(result, Err(GraphError::MissingDependency { .. })));
        assert!(!graph.contains("b"));
    }

    #[test]
    fn test_add_edge_cycle_rejected_and_graph_unchanged() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();
        graph.add_node("c", &deps(&["b"])).unwrap();

        // c -> a would close a -> b -> c -> a
        let result = graph.add_edge("c", "a");
        assert!(matches!(result, Err(GraphError::CircularDependency { .. })));

        assert_eq!(graph.node("a").unwrap().indegree(), 0);
        assert!(graph.dependents("c").unwrap().is_empty());
        assert!(graph.topological_sort().is_ok());
    }

    #[test]
    fn test_add_edge_self_cycle_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();

        let result = graph.add_edge("a", "a");
        assert!(matches!(result, Err(GraphError::CircularDependency { .. })));
    }

    #[test]
    fn test_add_edge_missing_endpoint() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();

        assert!(matches!(
            graph.add_edge("a", "ghost"),
            Err(GraphError::NodeNotFound { .. })
        ));
        assert!(matches!(
            graph.add_edge("ghost", "a"),
            Err(GraphError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_add_edge_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &[]).unwrap();

        graph.add_edge("a", "b").unwrap();
        graph.add_edge("a", "b").unwrap();

        assert_eq!(graph.node("b").unwrap().indegree(), 1);
        assert_eq!(graph.dependents("a").unwrap().len(), 1);
    }

    #[test]
    fn test_topological_sort_linear() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();
        graph.add_node("c", &deps(&["b"])).unwrap();

        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_topological_sort_diamond() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();
        graph.add_node("c", &deps(&["a"])).unwrap();
        graph.add_node("d", &deps(&["b", "c"])).unwrap();

        let order = graph.topological_sort().unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");

        // every dependency precedes its dependent
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        for node in graph.nodes() {
            for dep in node.depends_on() {
                assert!(pos(dep) < pos(node.id()));
            }
        }
    }

    #[test]
    fn test_ready_progression() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();
        graph.add_node("c", &deps(&["a"])).unwrap();

        assert_eq!(graph.ready(), vec!["a"]);

        graph.mark_complete("a");
        let ready: std::collections::HashSet<_> = graph.ready().into_iter().collect();
        assert!(ready.contains("b"));
        assert!(ready.contains("c"));
        assert_eq!(ready.len(), 2);
    }

    #[test]
    fn test_ready_never_returns_pending_indegree() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &[]).unwrap();
        graph.add_node("c", &deps(&["a", "b"])).unwrap();

        graph.mark_complete("a");
        assert!(!graph.ready().contains(&"c".to_string()));

        graph.mark_complete("b");
        assert_eq!(graph.ready(), vec!["c"]);
    }

    #[test]
    fn test_mark_complete_decrements_direct_dependents_once() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();
        graph.add_node("c", &deps(&["b"])).unwrap();

        graph.mark_complete("a");
        // direct dependent decremented, transitive one untouched
        assert_eq!(graph.node("b").unwrap().indegree(), 0);
        assert_eq!(graph.node("c").unwrap().indegree(), 1);

        // repeated completion is a no-op, indegree never goes negative
        graph.mark_complete("a");
        assert_eq!(graph.node("b").unwrap().indegree(), 0);
    }

    #[test]
    fn test_mark_complete_unknown_is_noop() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.mark_complete("ghost");
        assert_eq!(graph.ready(), vec!["a"]);
    }

    #[test]
    fn test_to_dot_contains_nodes_and_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", &[]).unwrap();
        graph.add_node("b", &deps(&["a"])).unwrap();

        let dot = graph.to_dot();
        assert!(dot.contains("digraph"));
        assert!(dot.contains('a'));
        assert!(dot.contains('b'));
    }
}
