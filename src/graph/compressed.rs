//! Compressed adjacency arena for the undirected social graph

use std::collections::HashMap;
use std::mem;

use crate::error::GraphError;

/// External person identifier as it appears in the dataset
pub type NodeId = u64;

/// Undirected simple graph in compressed sparse row form.
///
/// Nodes are addressed by dense `u32` indices; every edge is stored in the
/// adjacency lists of both endpoints and each list is sorted, so adjacency
/// tests are a binary search. Built once through
/// [`GraphBuilder`](crate::graph::GraphBuilder) and never mutated.
#[derive(Debug, Clone)]
pub struct SocialGraph {
    /// Number of nodes in the graph
    pub(crate) node_count: usize,

    /// offsets[i] to offsets[i+1] is the neighbor range of node i
    pub(crate) offsets: Vec<u32>,

    /// Concatenated, sorted neighbor lists
    pub(crate) edges: Vec<u32>,

    /// Dense index -> external id
    pub(crate) node_ids: Vec<NodeId>,

    /// External id -> dense index
    pub(crate) id_to_index: HashMap<NodeId, u32>,
}

impl SocialGraph {
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.len() / 2
    }

    /// External ids in dense index order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.id_to_index.get(&id).map(|&idx| idx as usize)
    }

    pub fn id_of(&self, index: usize) -> NodeId {
        self.node_ids[index]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Sorted neighbor indices of a node
    pub fn neighbors(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.edges[start..end]
    }

    /// Neighbor ids of a node given by external id (empty when unknown)
    pub fn neighbor_ids(&self, id: NodeId) -> Vec<NodeId> {
        match self.index_of(id) {
            Some(idx) => self
                .neighbors(idx)
                .iter()
                .map(|&n| self.node_ids[n as usize])
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn degree(&self, node: usize) -> usize {
        (self.offsets[node + 1] - self.offsets[node]) as usize
    }

    pub fn degree_of(&self, id: NodeId) -> Option<usize> {
        self.index_of(id).map(|idx| self.degree(idx))
    }

    /// Check if there's an edge between two dense indices
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&(b as u32)).is_ok()
    }

    /// Adjacency by external id; unknown ids are never adjacent
    pub fn are_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(ia), Some(ib)) => self.has_edge(ia, ib),
            _ => false,
        }
    }

    /// Fingerprint of the topology, used to key cached metrics.
    ///
    /// The first eight bytes of a BLAKE3 digest over the node count, ids,
    /// offsets and edges, all little-endian, so the value is the same across
    /// builds, toolchains and platforms.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.node_count as u64).to_le_bytes());
        for id in &self.node_ids {
            hasher.update(&id.to_le_bytes());
        }
        for offset in &self.offsets {
            hasher.update(&offset.to_le_bytes());
        }
        for edge in &self.edges {
            hasher.update(&edge.to_le_bytes());
        }

        let mut head = [0u8; 8];
        head.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    /// Re-check the arena invariants: non-empty, consistent offsets, every
    /// neighbor in bounds, no self-loops, symmetric adjacency.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.node_count == 0 {
            return Err(GraphError::Empty);
        }
        if self.offsets.len() != self.node_count + 1 || self.node_ids.len() != self.node_count {
            return Err(GraphError::Corrupt(format!(
                "{} offsets and {} ids for {} nodes",
                self.offsets.len(),
                self.node_ids.len(),
                self.node_count
            )));
        }
        if self.offsets[self.node_count] as usize != self.edges.len() {
            return Err(GraphError::Corrupt("final offset does not match edge array".into()));
        }
        for node in 0..self.node_count {
            if self.offsets[node] > self.offsets[node + 1] {
                return Err(GraphError::Corrupt(format!("offsets decrease at node {}", node)));
            }
            for &target in self.neighbors(node) {
                let target = target as usize;
                if target >= self.node_count {
                    return Err(GraphError::Corrupt(format!(
                        "node {} points past the arena ({})",
                        self.node_ids[node], target
                    )));
                }
                if target == node {
                    return Err(GraphError::SelfLoop(self.node_ids[node]));
                }
                if !self.has_edge(target, node) {
                    return Err(GraphError::Corrupt(format!(
                        "edge ({}, {}) is stored in one direction only",
                        self.node_ids[node], self.node_ids[target]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let offsets = self.offsets.capacity() * mem::size_of::<u32>();
        let edges = self.edges.capacity() * mem::size_of::<u32>();
        let ids = self.node_ids.capacity() * mem::size_of::<NodeId>();
        let index = self.id_to_index.capacity() * (mem::size_of::<NodeId>() + mem::size_of::<u32>());

        base + offsets + edges + ids + index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn triangle_with_tail() -> SocialGraph {
        // 1-2-3 triangle, 3-4 tail
        GraphBuilder::from_edges([1, 2, 3, 4], [(1, 2), (2, 3), (3, 1), (3, 4)]).unwrap()
    }

    #[test]
    fn adjacency_is_symmetric_and_sorted() {
        let g = triangle_with_tail();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 4);
        assert!(g.are_adjacent(1, 3));
        assert!(g.are_adjacent(3, 1));
        assert!(!g.are_adjacent(1, 4));
        assert_eq!(g.degree_of(3), Some(3));
        let idx = g.index_of(3).unwrap();
        assert!(g.neighbors(idx).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_ids_are_not_adjacent() {
        let g = triangle_with_tail();
        assert!(!g.are_adjacent(1, 99));
        assert_eq!(g.degree_of(99), None);
        assert!(g.neighbor_ids(99).is_empty());
    }

    #[test]
    fn validate_accepts_built_graph() {
        assert!(triangle_with_tail().validate().is_ok());
    }

    #[test]
    fn validate_rejects_one_sided_edge() {
        let mut g = triangle_with_tail();
        // drop the 4 -> 3 back-reference
        let idx = g.index_of(4).unwrap();
        let start = g.offsets[idx] as usize;
        g.edges.remove(start);
        for offset in g.offsets.iter_mut().skip(idx + 1) {
            *offset -= 1;
        }
        assert!(matches!(g.validate(), Err(GraphError::Corrupt(_))));
    }

    #[test]
    fn fingerprint_tracks_topology() {
        let a = triangle_with_tail();
        let b = triangle_with_tail();
        let c = GraphBuilder::from_edges([1, 2, 3, 4], [(1, 2), (2, 3), (3, 4)]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_is_a_fixed_byte_layout() {
        let g = triangle_with_tail();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u64.to_le_bytes());
        for id in [1u64, 2, 3, 4] {
            bytes.extend_from_slice(&id.to_le_bytes());
        }
        // 1: {2, 3}, 2: {1, 3}, 3: {1, 2, 4}, 4: {3}
        for offset in [0u32, 2, 4, 7, 8] {
            bytes.extend_from_slice(&offset.to_le_bytes());
        }
        for edge in [1u32, 2, 0, 2, 0, 1, 3, 2] {
            bytes.extend_from_slice(&edge.to_le_bytes());
        }
        let digest = blake3::hash(&bytes);
        let expected = u64::from_le_bytes([
            digest.as_bytes()[0],
            digest.as_bytes()[1],
            digest.as_bytes()[2],
            digest.as_bytes()[3],
            digest.as_bytes()[4],
            digest.as_bytes()[5],
            digest.as_bytes()[6],
            digest.as_bytes()[7],
        ]);

        assert_eq!(g.fingerprint(), expected);
    }
}
