// rust/distgraph-core/src/engine/mod.rs

//! The graph engine seam.
//!
//! The engine owns the partitioned graph: it ingests node and edge files,
//! serves node batches per server, samples neighbors and returns raw feature
//! payloads. Everything in this crate talks to it through the
//! [`RemoteGraphEngine`] trait, so a networked client, the in-process
//! [`LocalGraphEngine`] and test mocks are interchangeable.
//!
//! # Example
//!
//! ```no_run
//! use distgraph_core::engine::{InstanceRole, LocalGraphEngine, RemoteGraphEngine, Topology};
//! use std::path::PathBuf;
//!
//! let engine = LocalGraphEngine::new(4, 2, Some(42)).unwrap();
//! let topology = Topology {
//!     addresses: vec!["127.0.0.1:8245".into(), "127.0.0.1:8246".into()],
//!     shard_num: 4,
//!     node_types: vec!["u".into()],
//!     edge_types: vec!["u2u".into()],
//! };
//! engine.provision(&topology, InstanceRole::Client { client_id: 0 }).unwrap();
//! engine.load_node_file("u", &[PathBuf::from("users.txt")]).unwrap();
//!
//! let first = engine.pull_node_batch("u", 0, 0, 128).unwrap();
//! ```

mod local;
mod retry;
mod traits;

pub use local::LocalGraphEngine;
pub use retry::{retry_blocking, RetryConfig, RetryingEngine};
pub use traits::{InstanceRole, NodeId, RemoteGraphEngine, SampledNeighbor, Topology};
