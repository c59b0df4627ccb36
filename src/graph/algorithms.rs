//! Neighborhood queries over the compressed graph

use std::collections::{HashMap, HashSet};

use petgraph::algo::{connected_components, dijkstra};
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, SocialGraph};

/// Size of the intersection of two sorted neighbor lists
pub fn sorted_intersection_count(a: &[u32], b: &[u32]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// Neighbors shared by two nodes, in ascending index order
pub fn common_neighbors(graph: &SocialGraph, a: NodeId, b: NodeId) -> Vec<NodeId> {
    let (Some(ia), Some(ib)) = (graph.index_of(a), graph.index_of(b)) else {
        return Vec::new();
    };

    let (na, nb) = (graph.neighbors(ia), graph.neighbors(ib));
    let mut shared = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < na.len() && j < nb.len() {
        match na[i].cmp(&nb[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared.push(graph.id_of(na[i] as usize));
                i += 1;
                j += 1;
            }
        }
    }
    shared
}

/// True when `a` and `b` are adjacent or share at least one neighbor
pub fn within_two_hops(graph: &SocialGraph, a: NodeId, b: NodeId) -> bool {
    let (Some(ia), Some(ib)) = (graph.index_of(a), graph.index_of(b)) else {
        return false;
    };
    graph.has_edge(ia, ib) || sorted_intersection_count(graph.neighbors(ia), graph.neighbors(ib)) > 0
}

/// Structure of the subgraph induced by a set of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// edges / (n * (n - 1) / 2); zero below two nodes
    pub density: f64,
    pub is_connected: bool,
    /// Longest shortest path; only for connected subgraphs
    pub diameter: Option<usize>,
    /// Mean shortest path over ordered pairs; only for connected subgraphs
    pub average_path_length: Option<f64>,
}

/// Edges of the subgraph induced by `members`, each reported once
pub fn induced_edges(graph: &SocialGraph, members: &[NodeId]) -> Vec<(NodeId, NodeId)> {
    let member_set: HashSet<usize> = members.iter().filter_map(|&id| graph.index_of(id)).collect();
    let mut edges = Vec::new();

    let mut indices: Vec<usize> = member_set.iter().copied().collect();
    indices.sort_unstable();
    for &src in &indices {
        for &dst in graph.neighbors(src) {
            let dst = dst as usize;
            if src < dst && member_set.contains(&dst) {
                edges.push((graph.id_of(src), graph.id_of(dst)));
            }
        }
    }
    edges
}

/// Density, connectivity and path lengths of the subgraph induced by `members`
pub fn subgraph_stats(graph: &SocialGraph, members: &[NodeId]) -> SubgraphStats {
    let nodes: Vec<NodeId> = {
        let mut seen = HashSet::new();
        members
            .iter()
            .copied()
            .filter(|&id| graph.contains(id) && seen.insert(id))
            .collect()
    };
    let edges = induced_edges(graph, &nodes);
    let n = nodes.len();

    let density = if n < 2 {
        0.0
    } else {
        edges.len() as f64 / (n * (n - 1) / 2) as f64
    };

    let mut sub = UnGraph::<NodeId, ()>::with_capacity(n, edges.len());
    let index: HashMap<NodeId, _> = nodes.iter().map(|&id| (id, sub.add_node(id))).collect();
    for (a, b) in &edges {
        if let (Some(&ia), Some(&ib)) = (index.get(a), index.get(b)) {
            sub.add_edge(ia, ib, ());
        }
    }

    let is_connected = n > 0 && connected_components(&sub) == 1;
    let (diameter, average_path_length) = if is_connected {
        path_lengths(&sub)
    } else {
        (None, None)
    };

    SubgraphStats {
        node_count: n,
        edge_count: edges.len(),
        density,
        is_connected,
        diameter,
        average_path_length,
    }
}

/// Diameter and mean hop distance of a connected graph
fn path_lengths(sub: &UnGraph<NodeId, ()>) -> (Option<usize>, Option<f64>) {
    let n = sub.node_count();
    if n < 2 {
        return (Some(0), Some(0.0));
    }

    let mut longest = 0;
    let mut total = 0;
    for start in sub.node_indices() {
        let distances = dijkstra(sub, start, None, |_| 1usize);
        longest = distances.values().copied().fold(longest, usize::max);
        total += distances.values().sum::<usize>();
    }
    (Some(longest), Some(total as f64 / (n * (n - 1)) as f64))
}
