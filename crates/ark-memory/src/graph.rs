//! Knowledge Graph Index.
//!
//! An undirected, weighted graph mirroring the memory store.  Every stored
//! entry becomes a node `<kind>_<id>`, every distinct tag a node
//! `tag_<name>`.  Edges carry a relation label and a weight:
//!
//! | relation     | between          | weight |
//! |--------------|------------------|--------|
//! | `associated` | entry ↔ entry    | 1.0    |
//! | `tagged`     | entry ↔ tag      | 0.5    |
//!
//! The graph never creates nodes implicitly: [`KnowledgeGraph::add_edge`]
//! fails with [`GraphError::UnknownNode`] unless both endpoints were added
//! with [`KnowledgeGraph::add_node`] first.  There is at most one edge per
//! unordered node pair; adding it again overwrites its relation and weight.
//!
//! # Example
//!
//! ```
//! use ark_memory::graph::KnowledgeGraph;
//! use serde_json::Map;
//!
//! let mut g = KnowledgeGraph::new();
//! g.add_node("a", "reasoning", Map::new());
//! g.add_node("b", "reasoning", Map::new());
//! g.add_edge("a", "b", "associated", 1.0).unwrap();
//!
//! let assoc = g.associations("a", 2);
//! assert_eq!(assoc[0].node, "b");
//! assert_eq!(assoc[0].path_length, 1);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum neighbours reported per [`GraphPattern`].
const PATTERN_SAMPLE_SIZE: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Unknown graph node: {0}")]
    UnknownNode(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Nodes, edges and query results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
struct Edge {
    target: String,
    relation: String,
    weight: f64,
}

/// A node reachable from a query origin.
///
/// `relation` and `weight` describe the edge on the *first hop* of the
/// shortest path from the origin, not the edge adjacent to `node`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub node: String,
    pub relation: String,
    pub weight: f64,
    pub path_length: usize,
}

/// A densely connected node of a given kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPattern {
    pub central_node: String,
    pub connection_count: usize,
    pub sample_neighbors: Vec<String>,
    /// Sum of the weights of the edges to all neighbours.
    pub strength: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeGraph
// ─────────────────────────────────────────────────────────────────────────────

/// Explicit adjacency-list graph keyed by node id.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: HashMap<String, Node>,
    /// Node ids in first-insertion order, for deterministic iteration.
    order: Vec<String>,
    adjacency: HashMap<String, Vec<Edge>>,
    edge_count: usize,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Insert a node, or overwrite the kind and attributes of an existing one.
    pub fn add_node(&mut self, id: &str, kind: &str, attributes: Map<String, Value>) {
        let node = Node {
            id: id.to_string(),
            kind: kind.to_string(),
            attributes,
        };
        if self.nodes.insert(id.to_string(), node).is_none() {
            self.order.push(id.to_string());
            self.adjacency.entry(id.to_string()).or_default();
        }
    }

    /// Connect `a` and `b`.  Both nodes must already exist.
    pub fn add_edge(&mut self, a: &str, b: &str, relation: &str, weight: f64) -> Result<(), GraphError> {
        for id in [a, b] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownNode(id.to_string()));
            }
        }
        let created = self.upsert_half_edge(a, b, relation, weight);
        if a != b {
            self.upsert_half_edge(b, a, relation, weight);
        }
        if created {
            self.edge_count += 1;
        }
        Ok(())
    }

    /// Returns `true` when a new edge was created.
    fn upsert_half_edge(&mut self, from: &str, to: &str, relation: &str, weight: f64) -> bool {
        let edges = self.adjacency.entry(from.to_string()).or_default();
        match edges.iter_mut().find(|e| e.target == to) {
            Some(edge) => {
                edge.relation = relation.to_string();
                edge.weight = weight;
                false
            }
            None => {
                edges.push(Edge {
                    target: to.to_string(),
                    relation: relation.to_string(),
                    weight,
                });
                true
            }
        }
    }

    /// Ids of the nodes adjacent to `id`, in edge-insertion order.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.adjacency
            .get(id)
            .map(|edges| edges.iter().map(|e| e.target.as_str()).collect())
            .unwrap_or_default()
    }

    /// Every node within `max_depth` hops of `origin`, strongest first.
    ///
    /// Breadth-first, so each node is reported once at its shortest path
    /// length.  Returns an empty list for an unknown origin or depth 0.
    pub fn associations(&self, origin: &str, max_depth: usize) -> Vec<Association> {
        if !self.nodes.contains_key(origin) || max_depth == 0 {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::from([origin]);
        let mut queue: VecDeque<(&str, usize, &Edge)> = VecDeque::new();
        let mut found = Vec::new();

        for edge in self.adjacency.get(origin).into_iter().flatten() {
            if visited.insert(edge.target.as_str()) {
                queue.push_back((edge.target.as_str(), 1, edge));
            }
        }

        while let Some((node, depth, first_hop)) = queue.pop_front() {
            found.push(Association {
                node: node.to_string(),
                relation: first_hop.relation.clone(),
                weight: first_hop.weight,
                path_length: depth,
            });
            if depth == max_depth {
                continue;
            }
            for edge in self.adjacency.get(node).into_iter().flatten() {
                if visited.insert(edge.target.as_str()) {
                    queue.push_back((edge.target.as_str(), depth + 1, first_hop));
                }
            }
        }

        // Stable: equal weights keep breadth-first order.
        found.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        found
    }

    /// Nodes of `kind` with at least `min_occurrences` neighbours, ordered
    /// by the summed weight of their edges.
    pub fn patterns(&self, kind: &str, min_occurrences: usize) -> Vec<GraphPattern> {
        let mut patterns: Vec<GraphPattern> = self
            .order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.kind == kind))
            .filter_map(|id| {
                let edges = self.adjacency.get(id)?;
                if edges.len() < min_occurrences {
                    return None;
                }
                Some(GraphPattern {
                    central_node: id.clone(),
                    connection_count: edges.len(),
                    sample_neighbors: edges
                        .iter()
                        .take(PATTERN_SAMPLE_SIZE)
                        .map(|e| e.target.clone())
                        .collect(),
                    strength: edges.iter().map(|e| e.weight).sum(),
                })
            })
            .collect();
        patterns.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(nodes: &[(&str, &str)]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        for (id, kind) in nodes {
            g.add_node(id, kind, Map::new());
        }
        g
    }

    fn chain_abc() -> KnowledgeGraph {
        let mut g = graph_with(&[("A", "reasoning"), ("B", "reasoning"), ("C", "reasoning")]);
        g.add_edge("A", "B", "associated", 0.5).unwrap();
        g.add_edge("B", "C", "associated", 0.8).unwrap();
        g
    }

    #[test]
    fn add_edge_requires_existing_nodes() {
        let mut g = graph_with(&[("a", "reasoning")]);
        let err = g.add_edge("a", "ghost", "associated", 1.0).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode("ghost".into()));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn repeated_add_is_idempotent() {
        let mut g = graph_with(&[("a", "reasoning"), ("b", "tag")]);
        g.add_node("a", "reasoning", Map::new());
        g.add_edge("a", "b", "tagged", 0.5).unwrap();
        g.add_edge("a", "b", "tagged", 0.5).unwrap();
        g.add_edge("b", "a", "tagged", 0.5).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.neighbors("a"), vec!["b"]);
        assert_eq!(g.neighbors("b"), vec!["a"]);
    }

    #[test]
    fn readding_edge_overwrites_relation_and_weight() {
        let mut g = graph_with(&[("a", "reasoning"), ("b", "reasoning")]);
        g.add_edge("a", "b", "tagged", 0.5).unwrap();
        g.add_edge("a", "b", "associated", 1.0).unwrap();
        let assoc = g.associations("b", 1);
        assert_eq!(assoc[0].relation, "associated");
        assert!((assoc[0].weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn associations_depth_one_stops_at_neighbours() {
        let g = chain_abc();
        let assoc = g.associations("A", 1);
        assert_eq!(assoc.len(), 1);
        assert_eq!(assoc[0].node, "B");
        assert_eq!(assoc[0].path_length, 1);
    }

    #[test]
    fn associations_depth_two_reports_first_hop_edge() {
        let g = chain_abc();
        let assoc = g.associations("A", 2);
        assert_eq!(assoc.len(), 2);
        assert_eq!(assoc[0].node, "B");
        let c = assoc.iter().find(|a| a.node == "C").unwrap();
        assert_eq!(c.path_length, 2);
        // Metadata comes from A–B, not B–C.
        assert!((c.weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn associations_sorted_by_weight_descending() {
        let mut g = graph_with(&[("o", "reasoning"), ("x", "reasoning"), ("t", "tag")]);
        g.add_edge("o", "t", "tagged", 0.5).unwrap();
        g.add_edge("o", "x", "associated", 1.0).unwrap();
        let assoc = g.associations("o", 2);
        assert_eq!(assoc[0].node, "x");
        assert_eq!(assoc[1].node, "t");
    }

    #[test]
    fn associations_of_unknown_node_is_empty() {
        assert!(chain_abc().associations("Z", 3).is_empty());
    }

    #[test]
    fn associations_do_not_return_origin_on_cycles() {
        let mut g = chain_abc();
        g.add_edge("C", "A", "associated", 1.0).unwrap();
        let assoc = g.associations("A", 5);
        assert_eq!(assoc.len(), 2);
        assert!(assoc.iter().all(|a| a.node != "A"));
    }

    #[test]
    fn patterns_filter_by_kind_and_min_occurrences() {
        let mut g = graph_with(&[
            ("hub", "reasoning"),
            ("leaf", "reasoning"),
            ("t1", "tag"),
            ("t2", "tag"),
            ("t3", "tag"),
        ]);
        for t in ["t1", "t2", "t3"] {
            g.add_edge("hub", t, "tagged", 0.5).unwrap();
        }
        g.add_edge("leaf", "t1", "tagged", 0.5).unwrap();

        let patterns = g.patterns("reasoning", 3);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].central_node, "hub");
        assert_eq!(patterns[0].connection_count, 3);
        assert!((patterns[0].strength - 1.5).abs() < 1e-9);

        // t1 is connected to both hub and leaf.
        let tag_patterns = g.patterns("tag", 2);
        assert_eq!(tag_patterns.len(), 1);
        assert_eq!(tag_patterns[0].central_node, "t1");
    }

    #[test]
    fn patterns_sample_is_capped_and_sorted_by_strength() {
        let mut g = graph_with(&[("weak", "goal"), ("strong", "goal")]);
        for i in 0..12 {
            let id = format!("n{i}");
            g.add_node(&id, "tag", Map::new());
            g.add_edge("weak", &id, "tagged", 0.5).unwrap();
            g.add_edge("strong", &id, "associated", 1.0).unwrap();
        }
        let patterns = g.patterns("goal", 3);
        assert_eq!(patterns[0].central_node, "strong");
        assert_eq!(patterns[0].sample_neighbors.len(), 10);
        assert_eq!(patterns[0].connection_count, 12);
    }
}
