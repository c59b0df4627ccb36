//! Betweenness centrality via Brandes' algorithm.
//!
//! For every source `s` a BFS records shortest-path counts (`sigma`) and
//! distances; dependencies are then accumulated in reverse BFS order. On an
//! undirected graph every unordered pair is visited from both ends, so the
//! raw sums count each pair twice.
//!
//! Sources are split into fixed chunks processed on the rayon pool. Each
//! chunk returns its own partial vector and the partials are summed in chunk
//! order, which keeps the result independent of scheduling.
//!
//! Complexity: O(V * E) time, O(V + E) memory per worker.

use rayon::prelude::*;

use crate::graph::SocialGraph;

/// Sources handled by one rayon task
const SOURCE_CHUNK: usize = 64;

/// Per-worker BFS buffers, reused across sources
struct BrandesWorkspace {
    stack: Vec<u32>,
    queue: std::collections::VecDeque<u32>,
    sigma: Vec<f64>,
    dist: Vec<i32>,
    delta: Vec<f64>,
}

impl BrandesWorkspace {
    fn new(n: usize) -> Self {
        Self {
            stack: Vec::with_capacity(n),
            queue: std::collections::VecDeque::with_capacity(n),
            sigma: vec![0.0; n],
            dist: vec![-1; n],
            delta: vec![0.0; n],
        }
    }

    /// Add the dependencies of source `s` to `acc`
    fn accumulate(&mut self, graph: &SocialGraph, s: usize, acc: &mut [f64]) {
        self.sigma[s] = 1.0;
        self.dist[s] = 0;
        self.queue.push_back(s as u32);

        while let Some(v) = self.queue.pop_front() {
            let vi = v as usize;
            self.stack.push(v);

            for &w in graph.neighbors(vi) {
                let wi = w as usize;
                if self.dist[wi] < 0 {
                    self.dist[wi] = self.dist[vi] + 1;
                    self.queue.push_back(w);
                }
                if self.dist[wi] == self.dist[vi] + 1 {
                    self.sigma[wi] += self.sigma[vi];
                }
            }
        }

        // Predecessors of w are exactly its neighbors one level closer to s.
        while let Some(w) = self.stack.pop() {
            let wi = w as usize;
            let coefficient = (1.0 + self.delta[wi]) / self.sigma[wi];
            for &v in graph.neighbors(wi) {
                let vi = v as usize;
                if self.dist[vi] == self.dist[wi] - 1 {
                    self.delta[vi] += self.sigma[vi] * coefficient;
                }
            }
            if wi != s {
                acc[wi] += self.delta[wi];
            }

            self.sigma[wi] = 0.0;
            self.dist[wi] = -1;
            self.delta[wi] = 0.0;
        }
    }
}

/// Raw (unnormalized, pair-doubled) dependency sums for every node
pub fn raw_betweenness(graph: &SocialGraph) -> Vec<f64> {
    let n = graph.node_count();
    let chunk_count = n.div_ceil(SOURCE_CHUNK);

    let partials: Vec<Vec<f64>> = (0..chunk_count)
        .into_par_iter()
        .map(|chunk| {
            let start = chunk * SOURCE_CHUNK;
            let end = std::cmp::min(start + SOURCE_CHUNK, n);

            let mut workspace = BrandesWorkspace::new(n);
            let mut acc = vec![0.0; n];
            for s in start..end {
                workspace.accumulate(graph, s, &mut acc);
            }
            acc
        })
        .collect();

    let mut total = vec![0.0; n];
    for partial in &partials {
        for (sum, value) in total.iter_mut().zip(partial) {
            *sum += value;
        }
    }
    total
}

/// Betweenness centrality normalized to `[0, 1]`.
///
/// Each node's share of shortest paths is divided by the number of node
/// pairs not involving it, `(n - 1)(n - 2) / 2`. Graphs with fewer than three
/// nodes have no such pairs and score zero everywhere.
pub fn betweenness_centrality(graph: &SocialGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n < 3 {
        return vec![0.0; n];
    }

    log::debug!("Running Brandes over {} sources", n);

    // raw sums count each unordered pair twice
    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    raw_betweenness(graph)
        .into_iter()
        .map(|value| (value * scale).clamp(0.0, 1.0))
        .collect()
}
