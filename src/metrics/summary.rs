//! Whole-network statistics

use serde::{Deserialize, Serialize};

use crate::graph::algorithms::subgraph_stats;
use crate::graph::SocialGraph;
use crate::metrics::clustering::triangle_counts;
use crate::metrics::MetricsTable;

/// Degrees at or above this share the last histogram bucket
const DEGREE_HISTOGRAM_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub node_count: usize,
    pub edge_count: usize,
    /// edges / (n (n - 1) / 2)
    pub density: f64,
    pub average_degree: f64,
    pub average_clustering: f64,
    pub triangle_count: usize,
    pub component_count: usize,
    pub largest_component: usize,
    pub isolated_nodes: usize,
    pub is_connected: bool,
    /// Only for connected networks
    pub diameter: Option<usize>,
    pub average_path_length: Option<f64>,
    pub community_count: usize,
    pub modularity: f64,
    /// degree_histogram[d] = nodes with degree d, last bucket is `100+`
    pub degree_histogram: Vec<usize>,
}

impl NetworkSummary {
    pub fn from_metrics(graph: &SocialGraph, metrics: &MetricsTable) -> Self {
        let n = graph.node_count();
        let e = graph.edge_count();

        let density = if n < 2 {
            0.0
        } else {
            e as f64 / (n * (n - 1) / 2) as f64
        };

        let mut degree_histogram = vec![0; DEGREE_HISTOGRAM_CAP + 1];
        let mut clustering_sum = 0.0;
        let mut isolated_nodes = 0;
        for row in metrics.iter() {
            degree_histogram[row.degree.min(DEGREE_HISTOGRAM_CAP)] += 1;
            clustering_sum += row.clustering;
            if row.degree == 0 {
                isolated_nodes += 1;
            }
        }

        let triangle_count = triangle_counts(graph).iter().sum::<usize>() / 3;
        let components = metrics.component_sizes();
        let is_connected = components.len() == 1;
        let (diameter, average_path_length) = if is_connected {
            let stats = subgraph_stats(graph, graph.node_ids());
            (stats.diameter, stats.average_path_length)
        } else {
            (None, None)
        };

        Self {
            node_count: n,
            edge_count: e,
            density,
            average_degree: if n == 0 { 0.0 } else { (2 * e) as f64 / n as f64 },
            average_clustering: if n == 0 { 0.0 } else { clustering_sum / n as f64 },
            triangle_count,
            component_count: components.len(),
            largest_component: components.iter().copied().max().unwrap_or(0),
            isolated_nodes,
            is_connected,
            diameter,
            average_path_length,
            community_count: metrics.community_count(),
            modularity: metrics.modularity(),
            degree_histogram,
        }
    }
}
