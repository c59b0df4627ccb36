//! Closeness centrality.
//!
//! One BFS per node. In a disconnected graph a node only reaches its own
//! component, so the plain inverse mean distance is scaled by the share of
//! the network it can reach (Wasserman-Faust):
//!
//! `closeness(u) = (r / s) * (r / (n - 1))`
//!
//! with `r` nodes reachable from `u` at total distance `s`. Isolated nodes
//! and graphs of one node score zero.

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::graph::SocialGraph;

/// Sources handled by one rayon task
const SOURCE_CHUNK: usize = 64;

struct BfsWorkspace {
    dist: Vec<i32>,
    queue: VecDeque<u32>,
    visited: Vec<u32>,
}

impl BfsWorkspace {
    fn new(n: usize) -> Self {
        Self {
            dist: vec![-1; n],
            queue: VecDeque::with_capacity(n),
            visited: Vec::with_capacity(n),
        }
    }

    /// (reachable nodes other than `s`, sum of their distances)
    fn reach(&mut self, graph: &SocialGraph, s: usize) -> (usize, usize) {
        self.dist[s] = 0;
        self.queue.push_back(s as u32);
        let mut total = 0;

        while let Some(v) = self.queue.pop_front() {
            let vi = v as usize;
            self.visited.push(v);
            total += self.dist[vi] as usize;

            for &w in graph.neighbors(vi) {
                let wi = w as usize;
                if self.dist[wi] < 0 {
                    self.dist[wi] = self.dist[vi] + 1;
                    self.queue.push_back(w);
                }
            }
        }

        let reached = self.visited.len() - 1;
        for v in self.visited.drain(..) {
            self.dist[v as usize] = -1;
        }
        (reached, total)
    }
}

pub fn closeness_centrality(graph: &SocialGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n < 2 {
        return vec![0.0; n];
    }
    let others = (n - 1) as f64;

    let chunks: Vec<Vec<f64>> = (0..n.div_ceil(SOURCE_CHUNK))
        .into_par_iter()
        .map(|chunk| {
            let start = chunk * SOURCE_CHUNK;
            let end = std::cmp::min(start + SOURCE_CHUNK, n);
            let mut workspace = BfsWorkspace::new(n);

            (start..end)
                .map(|s| match workspace.reach(graph, s) {
                    (_, 0) => 0.0,
                    (reached, total) => {
                        let r = reached as f64;
                        (r / total as f64) * (r / others)
                    }
                })
                .collect()
        })
        .collect();

    chunks.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn closeness_of(graph: &SocialGraph, id: u64) -> f64 {
        closeness_centrality(graph)[graph.index_of(id).unwrap()]
    }

    #[test]
    fn star_center_is_closest() {
        let g = GraphBuilder::from_edges([0, 1, 2, 3, 4], [(0, 1), (0, 2), (0, 3), (0, 4)]).unwrap();
        assert!((closeness_of(&g, 0) - 1.0).abs() < 1e-12);
        // 1 + 2 + 2 + 2 = 7 over four reachable nodes
        assert!((closeness_of(&g, 1) - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn partial_reach_is_scaled_down() {
        // 1-2 pair plus isolated 3: each endpoint reaches one of two others
        let g = GraphBuilder::from_edges([1, 2, 3], [(1, 2)]).unwrap();
        assert!((closeness_of(&g, 1) - 0.5).abs() < 1e-12);
        assert_eq!(closeness_of(&g, 3), 0.0);
    }

    #[test]
    fn single_node_scores_zero() {
        let g = GraphBuilder::from_edges([7], []).unwrap();
        assert_eq!(closeness_centrality(&g), vec![0.0]);
    }
}
