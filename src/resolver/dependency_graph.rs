//! Dependency graph with deterministic topological ordering.
//!
//! Nodes live in a petgraph arena and are addressed by dense [`NodeIndex`]
//! handles; a value-to-handle map gives value-equality identity. Traversal
//! state is kept in plain vectors indexed by handle.
//!
//! # Ordering
//!
//! An edge `u -> v` means "`u` depends on `v`". [`DependencyGraph::ordering`]
//! lists every `v` before every `u` that points at it (dependencies first).
//! Nodes with no constraint between them keep their first-insertion order,
//! so the same graph always yields the same sequence.
//!
//! # Cycles
//!
//! Ordering runs a depth-first search with white/gray/black colouring. An
//! edge leading back to a gray (in-progress) node closes a cycle; that edge is
//! skipped and logged instead of failing the traversal.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use tracing::{debug, warn};

/// Relationship carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeType {
    /// Library requires another library (from `dependencies`)
    DependsOn,
    /// Library embeds another library's category (from `embed`)
    Embeds,
    /// Library belongs to a category
    MemberOf,
}

impl EdgeType {
    /// Wire name of the edge type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DependsOn => "dependsOn",
            Self::Embeds => "embeds",
            Self::MemberOf => "memberOf",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the DFS stack.
    Gray,
    /// Node and everything it reaches are emitted.
    Black,
}

/// Directed graph over values of `T` with typed edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T>
where
    T: Clone + Eq + Hash,
{
    graph: DiGraph<T, EdgeType>,
    node_map: HashMap<T, NodeIndex>,
    edge_set: HashSet<(NodeIndex, NodeIndex)>,
}

impl<T> Default for DependencyGraph<T>
where
    T: Clone + Eq + Hash + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DependencyGraph<T>
where
    T: Clone + Eq + Hash + fmt::Display,
{
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            edge_set: HashSet::new(),
        }
    }

    fn ensure_node(&mut self, node: T) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&node) {
            index
        } else {
            let index = self.graph.add_node(node.clone());
            self.node_map.insert(node, index);
            index
        }
    }

    /// Add a node. Returns `false` if an equal node was already present.
    pub fn add_node(&mut self, node: T) -> bool {
        let before = self.graph.node_count();
        self.ensure_node(node);
        self.graph.node_count() > before
    }

    /// Add an edge `from -> to`, inserting missing endpoints.
    ///
    /// Returns `false` for duplicates (the first edge type is kept) and for
    /// self-loops, which are never materialized.
    pub fn add_edge(&mut self, from: T, to: T, edge_type: EdgeType) -> bool {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);

        if from_idx == to_idx {
            debug!("Ignoring self reference of {}", self.graph[from_idx]);
            return false;
        }
        if !self.edge_set.insert((from_idx, to_idx)) {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, edge_type);
        true
    }

    /// Whether the graph holds a node equal to `node`.
    pub fn contains(&self, node: &T) -> bool {
        self.node_map.contains_key(node)
    }

    /// Whether the graph has an edge `from -> to`.
    pub fn contains_edge(&self, from: &T, to: &T) -> bool {
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(&f), Some(&t)) => self.edge_set.contains(&(f, t)),
            _ => false,
        }
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Edges `(from, to, type)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&T, &T, EdgeType)> + '_ {
        self.graph
            .edge_references()
            .map(move |e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
    }

    fn outgoing(&self, idx: NodeIndex) -> Vec<(NodeIndex, EdgeType)> {
        // petgraph lists a node's edges newest first
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        edges.reverse();
        edges
    }

    /// Outgoing edges of `node` in insertion order. Empty for unknown nodes.
    pub fn outgoing_edges(&self, node: &T) -> Vec<(&T, EdgeType)> {
        match self.node_map.get(node) {
            Some(&idx) => self
                .outgoing(idx)
                .into_iter()
                .map(|(target, edge_type)| (&self.graph[target], edge_type))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Topological order, dependencies first.
    ///
    /// For every edge `u -> v`, `v` precedes `u`. Cycle-closing edges are
    /// skipped with a warning.
    pub fn ordering(&self) -> Vec<T> {
        let mut colors = vec![Color::White; self.graph.node_count()];
        let mut order = Vec::with_capacity(self.graph.node_count());

        for idx in self.graph.node_indices() {
            if colors[idx.index()] == Color::White {
                self.dfs_visit(idx, &mut colors, &mut order);
            }
        }

        order
    }

    /// The exact reverse of [`ordering`](Self::ordering): dependents first.
    pub fn reverse_ordering(&self) -> Vec<T> {
        let mut order = self.ordering();
        order.reverse();
        order
    }

    fn dfs_visit(&self, node: NodeIndex, colors: &mut [Color], order: &mut Vec<T>) {
        colors[node.index()] = Color::Gray;

        for (neighbor, edge_type) in self.outgoing(node) {
            match colors[neighbor.index()] {
                Color::White => self.dfs_visit(neighbor, colors, order),
                Color::Gray => {
                    warn!(
                        "Dependency cycle: skipping {} edge {} -> {}",
                        edge_type, self.graph[node], self.graph[neighbor]
                    );
                }
                Color::Black => {}
            }
        }

        colors[node.index()] = Color::Black;
        order.push(self.graph[node].clone());
    }

    /// Copy of the graph restricted to nodes accepted by `keep`.
    ///
    /// Edges through removed nodes are bridged: a kept node gets an edge to
    /// every kept node it reached through removed ones, so relative order among
    /// the remaining nodes is preserved. Bridged edges take the type of the
    /// first edge on the path.
    pub fn filtered(&self, keep: impl Fn(&T) -> bool) -> Self {
        let kept: Vec<bool> = self.graph.node_indices().map(|idx| keep(&self.graph[idx])).collect();

        let mut filtered = Self::new();
        for idx in self.graph.node_indices() {
            if kept[idx.index()] {
                filtered.add_node(self.graph[idx].clone());
            }
        }

        for idx in self.graph.node_indices() {
            if !kept[idx.index()] {
                continue;
            }
            for (target, edge_type) in self.outgoing(idx) {
                if kept[target.index()] {
                    filtered.add_edge(self.graph[idx].clone(), self.graph[target].clone(), edge_type);
                    continue;
                }
                let mut visited = HashSet::new();
                let mut reached = Vec::new();
                self.collect_kept(target, &kept, &mut visited, &mut reached);
                for bridged in reached {
                    filtered.add_edge(self.graph[idx].clone(), self.graph[bridged].clone(), edge_type);
                }
            }
        }

        filtered
    }

    fn collect_kept(
        &self,
        removed: NodeIndex,
        kept: &[bool],
        visited: &mut HashSet<NodeIndex>,
        reached: &mut Vec<NodeIndex>,
    ) {
        if !visited.insert(removed) {
            return;
        }
        for (target, _) in self.outgoing(removed) {
            if kept[target.index()] {
                if !reached.contains(&target) {
                    reached.push(target);
                }
            } else {
                self.collect_kept(target, kept, visited, reached);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&'static str, &'static str)]) -> DependencyGraph<&'static str> {
        let mut graph = DependencyGraph::new();
        for (from, to) in edges {
            graph.add_edge(*from, *to, EdgeType::DependsOn);
        }
        graph
    }

    fn position(order: &[&str], node: &str) -> usize {
        order.iter().position(|n| *n == node).unwrap()
    }

    #[test]
    fn test_simple_dependency_chain() {
        // A -> B -> C
        let order = graph(&[("A", "B"), ("B", "C")]).ordering();
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_reverse_ordering_is_exact_reverse() {
        let graph = graph(&[("A", "B"), ("A", "C"), ("C", "D")]);
        let mut forward = graph.ordering();
        forward.reverse();
        assert_eq!(graph.reverse_ordering(), forward);
    }

    #[test]
    fn test_diamond_dependency() {
        // A -> B, A -> C, B -> D, C -> D
        let order = graph(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]).ordering();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "D") < position(&order, "B"));
        assert!(position(&order, "D") < position(&order, "C"));
        assert!(position(&order, "B") < position(&order, "A"));
        assert!(position(&order, "C") < position(&order, "A"));
    }

    #[test]
    fn test_unconstrained_nodes_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        for node in ["x", "a", "m"] {
            graph.add_node(node);
        }
        assert_eq!(graph.ordering(), vec!["x", "a", "m"]);
        // Repeated runs agree
        assert_eq!(graph.ordering(), graph.ordering());
    }

    #[test]
    fn test_every_edge_respected_in_larger_graph() {
        let edges = [
            ("app", "ui"),
            ("app", "util"),
            ("ui", "jquery"),
            ("ui", "util"),
            ("admin", "ui"),
            ("util", "polyfill"),
        ];
        let graph = graph(&edges);
        let order = graph.ordering();
        for (from, to) in edges {
            assert!(position(&order, to) < position(&order, from), "{to} before {from}");
        }
    }

    #[test]
    fn test_cycle_edge_is_skipped() {
        // A -> B -> C -> A
        let order = graph(&[("A", "B"), ("B", "C"), ("C", "A")]).ordering();
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_self_dependency_not_materialized() {
        let mut graph = DependencyGraph::new();
        assert!(!graph.add_edge("A", "A", EdgeType::DependsOn));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_edges() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_edge("A", "B", EdgeType::Embeds));
        assert!(!graph.add_edge("A", "B", EdgeType::DependsOn));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.outgoing_edges(&"A"), vec![(&"B", EdgeType::Embeds)]);
    }

    #[test]
    fn test_outgoing_edges_in_insertion_order() {
        let graph = graph(&[("A", "C"), ("A", "B"), ("A", "D")]);
        let targets: Vec<_> = graph.outgoing_edges(&"A").into_iter().map(|(t, _)| *t).collect();
        assert_eq!(targets, vec!["C", "B", "D"]);
        assert!(graph.outgoing_edges(&"missing").is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let graph: DependencyGraph<String> = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.ordering().is_empty());
    }

    #[test]
    fn test_filtered_bridges_removed_nodes() {
        // A -> X -> B, where X is filtered out
        let mut graph = graph(&[("A", "X"), ("X", "B")]);
        graph.add_node("C");
        let filtered = graph.filtered(|n| *n != "X");

        assert!(!filtered.contains(&"X"));
        assert!(filtered.contains_edge(&"A", &"B"));
        assert_eq!(filtered.ordering(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_filtered_drops_edges_into_removed_leaves() {
        let graph = graph(&[("A", "X")]);
        let filtered = graph.filtered(|n| *n != "X");
        assert_eq!(filtered.node_count(), 1);
        assert_eq!(filtered.edge_count(), 0);
    }
}
