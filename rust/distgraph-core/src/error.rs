// rust/distgraph-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error at '{path}': {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Feature '{feature}' is not declared for node type '{node_type}'")]
    UnknownFeature {
        node_type: String,
        feature: String,
    },

    #[error("Shape error: {message}")]
    Shape {
        message: String,
    },

    #[error("Decode error: {message}")]
    Decode {
        message: String,
    },

    #[error("Engine call '{operation}' failed: {message}")]
    Engine {
        operation: String,
        message: String,
        retryable: bool,
    },

    #[error("Server {server_idx} out of range (total servers: {server_num})")]
    InvalidShard {
        server_idx: u32,
        server_num: u32,
    },

    #[error("Rank {rank} is invalid for {nrank} ranks")]
    InvalidRank {
        rank: u32,
        nrank: u32,
    },
}

pub type Result<T> = std::result::Result<T, GraphError>;

// Convenience constructors
impl GraphError {

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn io_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn unknown_feature(node_type: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnknownFeature {
            node_type: node_type.into(),
            feature: feature.into(),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// A failed engine call that should not be retried.
    pub fn engine(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// A failed engine call that may succeed if issued again (timeouts,
    /// unreachable peers).
    pub fn engine_transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_shard(server_idx: u32, server_num: u32) -> Self {
        Self::InvalidShard { server_idx, server_num }
    }

    pub fn invalid_rank(rank: u32, nrank: u32) -> Self {
        Self::InvalidRank { rank, nrank }
    }

    /// Whether the retry policy may reissue the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Engine { retryable: true, .. })
    }
}
