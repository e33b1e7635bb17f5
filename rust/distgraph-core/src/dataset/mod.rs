// rust/distgraph-core/src/dataset/mod.rs

//! Distributed node batch iteration.
//!
//! Each server holds its nodes as an ordered list. A pass visits the servers
//! in a shuffled order and, for each one, pulls fixed-size blocks strided by
//! rank so that `nrank` consumers split the data without overlap. Optional
//! stream shuffling reorders nodes within a server using a bounded buffer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use distgraph_core::dataset::{DistributedBatchIterator, NodeBatchOptions};
//! use distgraph_core::engine::LocalGraphEngine;
//! use rand::SeedableRng;
//!
//! # fn main() -> distgraph_core::Result<()> {
//! let engine = Arc::new(LocalGraphEngine::new(4, 2, Some(7))?);
//! let options = NodeBatchOptions::new("user", 256).with_shuffle(true).with_rank(0, 2);
//! let rng = rand::rngs::StdRng::seed_from_u64(7);
//! for batch in DistributedBatchIterator::new(engine, options, 2, 20_000, rng)? {
//!     let nodes = batch?;
//!     println!("{} nodes", nodes.len());
//! }
//! # Ok(())
//! # }
//! ```

mod iterator;
mod shuffle;

pub use iterator::{DistributedBatchIterator, NodeBatchOptions, ShardNodeStream};
pub use shuffle::StreamShuffleBuffer;

use crate::engine::NodeId;

/// Ordered node identifiers pulled in one step.
pub type NodeBatch = Vec<NodeId>;
