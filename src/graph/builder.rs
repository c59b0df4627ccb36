//! Graph construction module

use std::collections::HashMap;

use crate::error::GraphError;
use crate::graph::compressed::{NodeId, SocialGraph};

/// Builder for incrementally constructing a [`SocialGraph`].
///
/// Nodes and edges are collected as given; validation (empty node set,
/// dangling endpoints, self-loops) happens in [`GraphBuilder::build`].
/// Duplicate edges, in either orientation, collapse to one.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Mapping from external IDs to node indices
    id_to_index: HashMap<NodeId, u32>,

    /// Node external IDs in insertion order
    node_ids: Vec<NodeId>,

    /// Edges exactly as supplied
    raw_edges: Vec<(NodeId, NodeId)>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            id_to_index: HashMap::with_capacity(nodes),
            node_ids: Vec::with_capacity(nodes),
            raw_edges: Vec::with_capacity(edges),
        }
    }

    /// Build a graph in one call from a node set and an edge list
    pub fn from_edges(
        nodes: impl IntoIterator<Item = NodeId>,
        edges: impl IntoIterator<Item = (NodeId, NodeId)>,
    ) -> Result<SocialGraph, GraphError> {
        let mut builder = Self::default();
        for id in nodes {
            builder.add_node(id);
        }
        for (a, b) in edges {
            builder.add_edge(a, b);
        }
        builder.build()
    }

    /// Register a node, returning its dense index. Idempotent.
    pub fn add_node(&mut self, id: NodeId) -> u32 {
        if let Some(&idx) = self.id_to_index.get(&id) {
            return idx;
        }

        let idx = self.node_ids.len() as u32;
        self.id_to_index.insert(id, idx);
        self.node_ids.push(id);
        idx
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Record an undirected edge. Endpoints are resolved at build time.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) {
        self.raw_edges.push((a, b));
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Validate and build the compressed graph
    pub fn build(self) -> Result<SocialGraph, GraphError> {
        let node_count = self.node_ids.len();
        if node_count == 0 {
            return Err(GraphError::Empty);
        }

        let mut adjacency_lists: Vec<Vec<u32>> = vec![Vec::new(); node_count];

        for &(a, b) in &self.raw_edges {
            let ia = self.resolve(a, (a, b))?;
            let ib = self.resolve(b, (a, b))?;
            if ia == ib {
                return Err(GraphError::SelfLoop(a));
            }
            adjacency_lists[ia as usize].push(ib);
            adjacency_lists[ib as usize].push(ia);
        }

        // Create offsets array
        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);

        let mut edges = Vec::with_capacity(self.raw_edges.len() * 2);
        for list in &mut adjacency_lists {
            // Sort for binary search, dedup for a simple graph
            list.sort_unstable();
            list.dedup();
            edges.extend_from_slice(list);
            offsets.push(edges.len() as u32);
        }

        let graph = SocialGraph {
            node_count,
            offsets,
            edges,
            node_ids: self.node_ids,
            id_to_index: self.id_to_index,
        };

        log::debug!(
            "Built graph with {} nodes and {} edges ({} raw edge records)",
            graph.node_count(),
            graph.edge_count(),
            self.raw_edges.len()
        );

        Ok(graph)
    }

    fn resolve(&self, id: NodeId, edge: (NodeId, NodeId)) -> Result<u32, GraphError> {
        self.id_to_index
            .get(&id)
            .copied()
            .ok_or(GraphError::DanglingEdge {
                from: edge.0,
                to: edge.1,
                missing: id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_fails() {
        assert_eq!(GraphBuilder::default().build().unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn dangling_edge_is_reported_with_missing_id() {
        let err = GraphBuilder::from_edges([1, 2, 3], [(1, 2), (2, 9999)]).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge {
                from: 2,
                to: 9999,
                missing: 9999
            }
        );
    }

    #[test]
    fn self_loop_is_rejected() {
        let err = GraphBuilder::from_edges([1, 2], [(1, 1)]).unwrap_err();
        assert_eq!(err, GraphError::SelfLoop(1));
    }

    #[test]
    fn duplicate_and_reversed_edges_collapse() {
        let g = GraphBuilder::from_edges([1, 2, 3], [(1, 2), (2, 1), (1, 2), (2, 3)]).unwrap();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.degree_of(1), Some(1));
        assert_eq!(g.degree_of(2), Some(2));
    }

    #[test]
    fn isolated_nodes_are_kept() {
        let g = GraphBuilder::from_edges([1, 2, 3], [(1, 2)]).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.degree_of(3), Some(0));
    }
}
