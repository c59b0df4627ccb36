//! Eigenvector centrality via power iteration.
//!
//! Iterates `x <- (A + I) x` and rescales to unit L2 norm after every step.
//! The identity shift keeps bipartite graphs from oscillating without
//! changing the dominant eigenvector. Iteration stops when the L1 change
//! falls below `n * TOLERANCE_PER_NODE`.

use rayon::prelude::*;

use crate::graph::SocialGraph;

pub const MAX_ITERATIONS: usize = 1000;
const TOLERANCE_PER_NODE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct EigenvectorResult {
    /// scores[i] is the centrality of node i; all zero if not converged
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

pub fn eigenvector_centrality(graph: &SocialGraph, max_iterations: usize) -> EigenvectorResult {
    let n = graph.node_count();
    if n == 0 {
        return EigenvectorResult {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let tolerance = n as f64 * TOLERANCE_PER_NODE;
    let mut scores = vec![1.0 / n as f64; n];

    for iteration in 1..=max_iterations {
        let mut next: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|v| scores[v] + graph.neighbors(v).iter().map(|&u| scores[u as usize]).sum::<f64>())
            .collect();

        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in next.iter_mut() {
                *x /= norm;
            }
        }

        let change: f64 = scores.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        scores = next;

        if change < tolerance {
            return EigenvectorResult {
                scores,
                iterations: iteration,
                converged: true,
            };
        }
    }

    log::warn!(
        "Eigenvector centrality did not converge in {} iterations, reporting zeros",
        max_iterations
    );
    EigenvectorResult {
        scores: vec![0.0; n],
        iterations: max_iterations,
        converged: false,
    }
}
