// rust/distgraph-core/src/lib.rs

//! Distributed Graph Client - Core Library
//!
//! This crate drives a partitioned graph engine from the client side:
//! catalog resolution and bulk loading, rank-partitioned node iteration with
//! bounded-memory stream shuffling, batched neighbor sampling, and typed
//! node feature lookup.

pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use config::GraphConfig;
pub use error::{GraphError, Result};

pub mod catalog;
pub use catalog::{inverse_edge_type, AddressSource, EdgeLoad, PartitionCatalog};

pub mod engine;
pub use engine::{
    InstanceRole, LocalGraphEngine, NodeId, RemoteGraphEngine, RetryConfig, RetryingEngine,
    SampledNeighbor, Topology,
};

pub mod dataset;
pub use dataset::{
    DistributedBatchIterator, NodeBatch, NodeBatchOptions, ShardNodeStream, StreamShuffleBuffer,
};

pub mod feature;
pub use feature::{FeatureDecoder, FeatureDtype, FeatureSpec, FeatureTable, FeatureValue};

pub mod sampler;
pub use sampler::NeighborSampler;

pub mod client;
pub use client::DistGraphClient;

pub mod server;
pub use server::DistGraphServer;
