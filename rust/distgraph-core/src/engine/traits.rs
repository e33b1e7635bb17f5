// rust/distgraph-core/src/engine/traits.rs

//! The contract between the client-side core and the graph engine.
//!
//! The engine holds the partitioned graph and serves remote calls. This
//! crate only consumes it, so everything here is expressed as a blocking,
//! object-safe trait that any transport can sit behind.

use std::path::PathBuf;

use bytes::Bytes;

use crate::error::Result;

/// Node identifier as stored by the engine.
pub type NodeId = u64;

/// One sampled edge endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledNeighbor {
    /// The neighbor's identifier.
    pub id: NodeId,
    /// Auxiliary payload carried with the edge (its weight), if any.
    pub weight: Option<f32>,
}

impl SampledNeighbor {
    pub fn new(id: NodeId) -> Self {
        Self { id, weight: None }
    }

    pub fn weighted(id: NodeId, weight: f32) -> Self {
        Self {
            id,
            weight: Some(weight),
        }
    }
}

/// Shard topology an instance registers against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// One `host:port` per server instance.
    pub addresses: Vec<String>,
    /// Number of storage partitions.
    pub shard_num: u32,
    pub node_types: Vec<String>,
    pub edge_types: Vec<String>,
}

/// Whether an instance serves data or consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    Server { server_id: u32 },
    Client { client_id: u32 },
}

/// The engine that owns the partitioned graph.
///
/// All calls are synchronous from the caller's point of view. Implementations
/// must tolerate concurrent calls from independent clients.
///
/// # Object Safety
///
/// This trait is object-safe and is used as `Arc<dyn RemoteGraphEngine>`.
pub trait RemoteGraphEngine: Send + Sync {
    /// Registers a server or client instance against a shard topology.
    fn provision(&self, topology: &Topology, role: InstanceRole) -> Result<()>;

    /// Bulk-loads nodes of one type.
    fn load_node_file(&self, node_type: &str, paths: &[PathBuf]) -> Result<()>;

    /// Bulk-loads edges of one type. With `is_reverse` every edge is stored
    /// with its endpoints swapped.
    fn load_edge_file(&self, edge_type: &str, paths: &[PathBuf], is_reverse: bool) -> Result<()>;

    /// Registers the decode schema of a node feature.
    fn declare_feature(
        &self,
        node_type: &str,
        feature_name: &str,
        dtype: &str,
        shape: &str,
    ) -> Result<()>;

    /// Samples up to `max_degree` neighbors of every node.
    ///
    /// Returns one list per input node, in input order.
    fn sample_neighbors(
        &self,
        edge_type: &str,
        nodes: &[NodeId],
        max_degree: usize,
    ) -> Result<Vec<Vec<SampledNeighbor>>>;

    /// Draws up to `count` random nodes of a type from one server.
    fn random_sample_nodes(&self, node_type: &str, server_idx: u32, count: usize)
        -> Result<Vec<NodeId>>;

    /// Reads up to `count` nodes of a type from one server, starting at
    /// `start` in that server's stable node order.
    fn pull_node_batch(
        &self,
        node_type: &str,
        server_idx: u32,
        start: usize,
        count: usize,
    ) -> Result<Vec<NodeId>>;

    /// Fetches raw feature payloads: one list per feature name, each aligned
    /// with `nodes`.
    fn fetch_feature(
        &self,
        node_type: &str,
        nodes: &[NodeId],
        feature_names: &[String],
    ) -> Result<Vec<Vec<Bytes>>>;

    /// Stops the engine's servers.
    fn shutdown(&self) -> Result<()>;
}
