//! Per-node graph metrics.
//!
//! [`compute`] produces a [`MetricsTable`] holding degree, normalized
//! betweenness, closeness and eigenvector centrality, local clustering
//! coefficient, connected component and Louvain community for every node
//! of a [`SocialGraph`]. The table remembers the
//! fingerprint of the graph it was computed from so a cached copy can be
//! matched against a snapshot.

pub mod betweenness;
pub mod closeness;
pub mod clustering;
pub mod community;
pub mod components;
pub mod eigenvector;
pub mod summary;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::{NodeId, SocialGraph};

pub use summary::NetworkSummary;

/// Metrics of a single node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub id: NodeId,
    pub degree: usize,
    /// Share of shortest paths through the node, in `[0, 1]`
    pub betweenness: f64,
    /// Reach-scaled inverse mean distance, in `[0, 1]`
    pub closeness: f64,
    /// Unit-norm eigenvector centrality
    pub eigenvector: f64,
    /// Local clustering coefficient, in `[0, 1]`
    pub clustering: f64,
    pub component: u32,
    pub community: u32,
}

/// Metric selector used for rankings and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Degree,
    Betweenness,
    Closeness,
    Eigenvector,
    Clustering,
}

impl Metric {
    pub fn value(self, row: &NodeMetrics) -> f64 {
        match self {
            Metric::Degree => row.degree as f64,
            Metric::Betweenness => row.betweenness,
            Metric::Closeness => row.closeness,
            Metric::Eigenvector => row.eigenvector,
            Metric::Clustering => row.clustering,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Degree => "degree",
            Metric::Betweenness => "betweenness",
            Metric::Closeness => "closeness",
            Metric::Eigenvector => "eigenvector",
            Metric::Clustering => "clustering",
        })
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "degree" => Ok(Metric::Degree),
            "betweenness" | "betweenness_centrality" => Ok(Metric::Betweenness),
            "closeness" | "closeness_centrality" => Ok(Metric::Closeness),
            "eigenvector" | "eigenvector_centrality" => Ok(Metric::Eigenvector),
            "clustering" | "clustering_coefficient" => Ok(Metric::Clustering),
            other => Err(format!("unknown metric `{}`", other)),
        }
    }
}

/// Metrics for every node of one graph snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsTable {
    fingerprint: u64,
    /// Rows in the graph's dense index order
    rows: Vec<NodeMetrics>,
    component_sizes: Vec<usize>,
    max_betweenness: f64,
    community_count: usize,
    modularity: f64,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

impl MetricsTable {
    pub(crate) fn new(fingerprint: u64, rows: Vec<NodeMetrics>, component_sizes: Vec<usize>) -> Self {
        let max_betweenness = rows.iter().map(|r| r.betweenness).fold(0.0, f64::max);
        let mut table = Self {
            fingerprint,
            rows,
            component_sizes,
            max_betweenness,
            community_count: 0,
            modularity: 0.0,
            index: HashMap::new(),
        };
        table.rebuild_index();
        table
    }

    pub(crate) fn with_communities(mut self, count: usize, modularity: f64) -> Self {
        self.community_count = count;
        self.modularity = modularity;
        self
    }

    /// Restore the id lookup after deserialization
    pub(crate) fn rebuild_index(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.id, i))
            .collect();
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeMetrics> {
        self.index.get(&id).map(|&i| &self.rows[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeMetrics> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn max_betweenness(&self) -> f64 {
        self.max_betweenness
    }

    pub fn component_sizes(&self) -> &[usize] {
        &self.component_sizes
    }

    pub fn community_count(&self) -> usize {
        self.community_count
    }

    /// Modularity of the Louvain partition
    pub fn modularity(&self) -> f64 {
        self.modularity
    }

    /// Ids in community `label`, ascending
    pub fn community_members(&self, label: u32) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .rows
            .iter()
            .filter(|row| row.community == label)
            .map(|row| row.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// True when this table was computed from `graph`
    pub fn matches(&self, graph: &SocialGraph) -> bool {
        self.fingerprint == graph.fingerprint() && self.rows.len() == graph.node_count()
    }

    /// Highest `n` nodes by `metric`, ties by ascending id
    pub fn top_by(&self, metric: Metric, n: usize) -> Vec<&NodeMetrics> {
        let mut rows: Vec<&NodeMetrics> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            metric
                .value(b)
                .total_cmp(&metric.value(a))
                .then(a.id.cmp(&b.id))
        });
        rows.truncate(n);
        rows
    }

    /// Nodes with degree in `[min, max]`, highest degree first
    pub fn in_degree_range(&self, min: usize, max: usize) -> Vec<&NodeMetrics> {
        let mut rows: Vec<&NodeMetrics> = self
            .rows
            .iter()
            .filter(|r| (min..=max).contains(&r.degree))
            .collect();
        rows.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.id.cmp(&b.id)));
        rows
    }
}

/// Compute the metrics table for a graph snapshot.
///
/// The graph is re-validated first; the graph itself is never modified.
pub fn compute(graph: &SocialGraph) -> Result<MetricsTable, GraphError> {
    graph.validate()?;

    log::info!(
        "Calculating network metrics for {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    log::info!("Computing betweenness centrality");
    let betweenness = betweenness::betweenness_centrality(graph);

    log::info!("Computing closeness centrality");
    let closeness = closeness::closeness_centrality(graph);

    log::info!("Computing eigenvector centrality");
    let eigenvector = eigenvector::eigenvector_centrality(graph, eigenvector::MAX_ITERATIONS);
    log::debug!(
        "Eigenvector centrality: {} iterations, converged: {}",
        eigenvector.iterations,
        eigenvector.converged
    );

    log::info!("Computing clustering coefficients");
    let clustering = clustering::clustering_coefficients(graph);

    log::info!("Labelling connected components");
    let components = components::label_components(graph);

    log::info!("Detecting communities");
    let communities = community::detect_communities(graph);

    let rows = (0..graph.node_count())
        .map(|i| NodeMetrics {
            id: graph.id_of(i),
            degree: graph.degree(i),
            betweenness: betweenness[i],
            closeness: closeness[i],
            eigenvector: eigenvector.scores[i],
            clustering: clustering[i],
            component: components.labels[i],
            community: communities.labels[i],
        })
        .collect();

    let table = MetricsTable::new(graph.fingerprint(), rows, components.sizes)
        .with_communities(communities.count, communities.modularity);

    log::info!(
        "Metrics done: {} components, {} communities (modularity {:.4}), max betweenness {:.6}",
        table.component_sizes().len(),
        table.community_count(),
        table.modularity(),
        table.max_betweenness()
    );

    Ok(table)
}
