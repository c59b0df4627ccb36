//! Error types shared across the analyzer

use std::path::PathBuf;

use crate::graph::NodeId;
use thiserror::Error;

/// The input graph cannot be analyzed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no nodes")]
    Empty,

    #[error("edge ({from}, {to}) references unknown node {missing}")]
    DanglingEdge {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    #[error("self-loop on node {0}")]
    SelfLoop(NodeId),

    #[error("corrupt adjacency arena: {0}")]
    Corrupt(String),
}

/// The analysis configuration is incomplete or inconsistent
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration key `{0}` is missing")]
    Missing(String),

    #[error("configuration key `{key}` has invalid value `{value}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Fatal errors surfaced by [`crate::detect::analyze`]
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A dataset directory could not be turned into a graph
#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset file not found: {0}")]
    MissingFile(PathBuf),

    #[error("{file}: expected at least {expected} columns, found {found}")]
    Columns {
        file: String,
        expected: usize,
        found: usize,
    },

    #[error("failed to read table: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Results or caches could not be written or read back
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode metrics cache: {0}")]
    Bincode(#[from] bincode::Error),
}
