//! Detection of a covert organization inside a social network.
//!
//! A [`graph::SocialGraph`] is loaded from the dataset tables, per-node
//! metrics are computed once, and [`detect::analyze`] searches both
//! organization shapes for the best matching role assignment.

pub mod config;
pub mod data;
pub mod detect;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod storage;
pub mod viz;

pub use config::AnalysisConfig;
pub use detect::{analyze, analyze_with_settings, Analysis, BestResult, Reason, Role, Scenario, Verdict};
pub use error::{ConfigError, DataError, DetectError, GraphError, StorageError};
pub use graph::{GraphBuilder, NodeId, SocialGraph};
pub use metrics::{compute, MetricsTable, NetworkSummary};
