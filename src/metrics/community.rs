//! Community labelling by Louvain modularity optimization.
//!
//! Two phases repeat until no node moves:
//!
//! 1. Local moving: visit nodes in index order and move each into the
//!    neighboring community with the largest modularity gain
//!    `k_i,in - tot_c * k_i / 2m`. Only a strictly larger gain replaces the
//!    current best, and neighbor communities are scanned in ascending order.
//! 2. Aggregation: collapse every community into one weighted node, with
//!    internal edges kept as self-loops.
//!
//! There is no random node order, so the same graph always gets the same
//! labels. Final labels are dense, in order of each community's lowest node
//! index.

use std::collections::BTreeMap;

use crate::graph::SocialGraph;

const MAX_LEVELS: usize = 32;
const MAX_SWEEPS: usize = 100;
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct Communities {
    /// labels[i] is the community of node i
    pub labels: Vec<u32>,
    pub count: usize,
    pub modularity: f64,
}

/// One level of the Louvain hierarchy
struct Level {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    /// Weighted degree, self-loops counted twice
    degree: Vec<f64>,
}

impl Level {
    fn from_graph(graph: &SocialGraph) -> Self {
        let n = graph.node_count();
        let adjacency: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|v| graph.neighbors(v).iter().map(|&u| (u as usize, 1.0)).collect())
            .collect();
        let degree = adjacency.iter().map(|edges| edges.len() as f64).collect();
        Self {
            adjacency,
            self_loops: vec![0.0; n],
            degree,
        }
    }

    fn len(&self) -> usize {
        self.degree.len()
    }

    /// Greedy moves until a sweep changes nothing. Returns the community of
    /// every node and whether anything moved at all.
    fn local_moving(&self, two_m: f64) -> (Vec<usize>, bool) {
        let n = self.len();
        let mut community: Vec<usize> = (0..n).collect();
        let mut totals = self.degree.clone();
        let mut improved = false;

        for _ in 0..MAX_SWEEPS {
            let mut moved = false;

            for v in 0..n {
                let k = self.degree[v];
                let current = community[v];

                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(u, w) in &self.adjacency[v] {
                    *links.entry(community[u]).or_insert(0.0) += w;
                }

                totals[current] -= k;
                let gain = |c: usize, w: f64| w - totals[c] * k / two_m;

                let mut best = current;
                let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
                for (&c, &w) in &links {
                    let candidate = gain(c, w);
                    if candidate > best_gain + MIN_GAIN {
                        best = c;
                        best_gain = candidate;
                    }
                }

                totals[best] += k;
                if best != current {
                    community[v] = best;
                    moved = true;
                    improved = true;
                }
            }

            if !moved {
                break;
            }
        }

        (community, improved)
    }

    /// Collapse each community into one node. `dense` maps nodes of this
    /// level to community ids `0..count`.
    fn aggregate(&self, dense: &[usize], count: usize) -> Self {
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_loops = vec![0.0; count];

        for v in 0..self.len() {
            let cv = dense[v];
            self_loops[cv] += self.self_loops[v];
            for &(u, w) in &self.adjacency[v] {
                let cu = dense[u];
                if cu == cv {
                    // every internal edge is seen from both ends
                    self_loops[cv] += w / 2.0;
                } else {
                    *links[cv].entry(cu).or_insert(0.0) += w;
                }
            }
        }

        let adjacency: Vec<Vec<(usize, f64)>> = links.into_iter().map(|m| m.into_iter().collect()).collect();
        let degree = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(edges, &own)| edges.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * own)
            .collect();

        Self {
            adjacency,
            self_loops,
            degree,
        }
    }
}

/// Renumber arbitrary ids to `0..count` in order of first appearance
fn densify(ids: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: Vec<Option<usize>> = vec![None; ids.len()];
    let mut count = 0;
    let dense = ids
        .iter()
        .map(|&id| {
            *mapping[id].get_or_insert_with(|| {
                count += 1;
                count - 1
            })
        })
        .collect();
    (dense, count)
}

/// `Q = sum_c (L_c / m - (D_c / 2m)^2)` for the given labelling
pub fn modularity(graph: &SocialGraph, labels: &[u32]) -> f64 {
    let m = graph.edge_count() as f64;
    if m == 0.0 {
        return 0.0;
    }

    let count = labels.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut internal = vec![0.0; count];
    let mut degree = vec![0.0; count];

    for v in 0..graph.node_count() {
        let c = labels[v] as usize;
        degree[c] += graph.degree(v) as f64;
        for &u in graph.neighbors(v) {
            if (v as u32) < u && labels[u as usize] as usize == c {
                internal[c] += 1.0;
            }
        }
    }

    internal
        .iter()
        .zip(&degree)
        .map(|(l, d)| l / m - (d / (2.0 * m)).powi(2))
        .sum()
}

pub fn detect_communities(graph: &SocialGraph) -> Communities {
    let n = graph.node_count();
    let two_m = 2.0 * graph.edge_count() as f64;

    // node of the current level that each original node belongs to
    let mut membership: Vec<usize> = (0..n).collect();

    if two_m > 0.0 {
        let mut level = Level::from_graph(graph);
        for pass in 0..MAX_LEVELS {
            let (community, improved) = level.local_moving(two_m);
            if !improved {
                break;
            }

            let (dense, count) = densify(&community);
            for node in membership.iter_mut() {
                *node = dense[*node];
            }
            log::debug!("Louvain pass {}: {} communities", pass + 1, count);
            level = level.aggregate(&dense, count);
        }
    }

    let (dense, count) = densify(&membership);
    let labels: Vec<u32> = dense.into_iter().map(|c| c as u32).collect();
    let modularity = modularity(graph, &labels);

    Communities {
        labels,
        count,
        modularity,
    }
}
