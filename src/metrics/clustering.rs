//! Local clustering coefficients and triangle counts

use rayon::prelude::*;

use crate::graph::algorithms::sorted_intersection_count;
use crate::graph::SocialGraph;

/// Triangles through each node.
///
/// Summing `|N(u) ∩ N(v)|` over the neighbors `v` of `u` visits every
/// triangle at `u` twice.
pub fn triangle_counts(graph: &SocialGraph) -> Vec<usize> {
    (0..graph.node_count())
        .into_par_iter()
        .map(|u| {
            let neighbors = graph.neighbors(u);
            let links: usize = neighbors
                .iter()
                .map(|&v| sorted_intersection_count(neighbors, graph.neighbors(v as usize)))
                .sum();
            links / 2
        })
        .collect()
}

/// `2T / (d (d - 1))` per node, zero when the degree is below two
pub fn clustering_coefficients(graph: &SocialGraph) -> Vec<f64> {
    triangle_counts(graph)
        .into_iter()
        .enumerate()
        .map(|(u, triangles)| {
            let degree = graph.degree(u);
            if degree < 2 {
                0.0
            } else {
                (2 * triangles) as f64 / (degree * (degree - 1)) as f64
            }
        })
        .collect()
}
