// rust/distgraph-core/src/dataset/iterator.rs

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::engine::RemoteGraphEngine;
use crate::error::{GraphError, Result};

use super::shuffle::StreamShuffleBuffer;
use super::NodeBatch;

/// Options for one distributed pass over a node type.
#[derive(Debug, Clone)]
pub struct NodeBatchOptions {
    /// Node type to iterate.
    pub node_type: String,
    /// Nodes per batch.
    pub batch_size: usize,
    /// Whether to stream-shuffle each server's nodes.
    pub shuffle: bool,
    /// This consumer's rank.
    pub rank: u32,
    /// Total number of consumers.
    pub nrank: u32,
}

impl NodeBatchOptions {
    pub fn new(node_type: impl Into<String>, batch_size: usize) -> Self {
        Self {
            node_type: node_type.into(),
            batch_size,
            shuffle: false,
            rank: 0,
            nrank: 1,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_rank(mut self, rank: u32, nrank: u32) -> Self {
        self.rank = rank;
        self.nrank = nrank;
        self
    }

    /// Check rank bounds and batch size.
    pub fn validate(&self) -> Result<()> {
        if self.nrank == 0 || self.rank >= self.nrank {
            return Err(GraphError::invalid_rank(self.rank, self.nrank));
        }
        if self.batch_size == 0 {
            return Err(GraphError::config("batch_size must be greater than 0"));
        }
        Ok(())
    }
}

/// Pulls one server's nodes for a single rank.
///
/// Rank `r` of `n` reads the blocks starting at `r * b`, `(r + n) * b`,
/// `(r + 2n) * b` and so on, where `b` is the batch size. The stream stops
/// after the first block shorter than `b`, so the ranks together cover the
/// server's node list exactly once.
pub struct ShardNodeStream {
    engine: Arc<dyn RemoteGraphEngine>,
    node_type: String,
    server_idx: u32,
    batch_size: usize,
    stride: usize,
    cursor: usize,
    finished: bool,
}

impl ShardNodeStream {
    pub fn new(
        engine: Arc<dyn RemoteGraphEngine>,
        node_type: impl Into<String>,
        server_idx: u32,
        batch_size: usize,
        rank: u32,
        nrank: u32,
    ) -> Self {
        Self {
            engine,
            node_type: node_type.into(),
            server_idx,
            batch_size,
            stride: nrank as usize * batch_size,
            cursor: rank as usize * batch_size,
            finished: false,
        }
    }

    /// Pull the next block from the server.
    ///
    /// Returns `Ok(None)` once the server is exhausted for this rank.
    pub fn next_batch(&mut self) -> Result<Option<NodeBatch>> {
        if self.finished {
            return Ok(None);
        }

        let nodes = match self.engine.pull_node_batch(
            &self.node_type,
            self.server_idx,
            self.cursor,
            self.batch_size,
        ) {
            Ok(nodes) => nodes,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };
        self.cursor += self.stride;

        if nodes.len() > self.batch_size {
            self.finished = true;
            return Err(GraphError::shape(format!(
                "server {} returned {} nodes for a batch of {}",
                self.server_idx,
                nodes.len(),
                self.batch_size
            )));
        }
        if nodes.len() < self.batch_size {
            self.finished = true;
        }

        if nodes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(nodes))
        }
    }

    pub fn server_idx(&self) -> u32 {
        self.server_idx
    }

    /// Offset of the next block this stream would request.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Iterator for ShardNodeStream {
    type Item = Result<NodeBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

type BatchStream = Box<dyn Iterator<Item = Result<NodeBatch>> + Send>;

/// Rank-partitioned iteration over every server's nodes.
///
/// Servers are visited one at a time in an order shuffled once per pass.
/// A server is drained completely (through the stream shuffle buffer when
/// shuffling is on) before the next one starts. The first error ends the
/// pass.
pub struct DistributedBatchIterator {
    engine: Arc<dyn RemoteGraphEngine>,
    options: NodeBatchOptions,
    shuffle_size: usize,
    rng: StdRng,
    server_order: Vec<u32>,
    next_server: usize,
    current: Option<(u32, BatchStream)>,
    failed: bool,
}

impl DistributedBatchIterator {
    /// Start a pass over `server_num` servers.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidRank`] when `rank >= nrank` or `nrank`
    /// is zero, and a configuration error for a zero batch size, zero
    /// server count or (when shuffling) zero shuffle size.
    pub fn new(
        engine: Arc<dyn RemoteGraphEngine>,
        options: NodeBatchOptions,
        server_num: u32,
        shuffle_size: usize,
        mut rng: StdRng,
    ) -> Result<Self> {
        options.validate()?;
        if server_num == 0 {
            return Err(GraphError::config("server_num must be greater than 0"));
        }
        if options.shuffle && shuffle_size == 0 {
            return Err(GraphError::config("shuffle_size must be greater than 0"));
        }

        let mut server_order: Vec<u32> = (0..server_num).collect();
        server_order.shuffle(&mut rng);
        tracing::debug!(
            "node batch pass over '{}' (rank {}/{}), server order {:?}",
            options.node_type,
            options.rank,
            options.nrank,
            server_order
        );

        Ok(Self {
            engine,
            options,
            shuffle_size,
            rng,
            server_order,
            next_server: 0,
            current: None,
            failed: false,
        })
    }

    /// Order in which servers are visited during this pass.
    pub fn server_order(&self) -> &[u32] {
        &self.server_order
    }

    pub fn options(&self) -> &NodeBatchOptions {
        &self.options
    }

    fn open_server(&mut self, server_idx: u32) -> Result<BatchStream> {
        let stream = ShardNodeStream::new(
            Arc::clone(&self.engine),
            self.options.node_type.clone(),
            server_idx,
            self.options.batch_size,
            self.options.rank,
            self.options.nrank,
        );
        if !self.options.shuffle {
            return Ok(Box::new(stream));
        }
        let rng = StdRng::seed_from_u64(self.rng.gen());
        Ok(Box::new(StreamShuffleBuffer::new(
            stream,
            self.options.batch_size,
            self.shuffle_size,
            rng,
        )?))
    }
}

impl Iterator for DistributedBatchIterator {
    type Item = Result<NodeBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some((server_idx, stream)) = self.current.as_mut() {
                match stream.next() {
                    Some(Ok(batch)) => return Some(Ok(batch)),
                    Some(Err(e)) => {
                        tracing::error!("node batch pull from server {} failed: {}", server_idx, e);
                        self.current = None;
                        self.failed = true;
                        return Some(Err(e));
                    }
                    None => {
                        tracing::debug!("server {} drained", server_idx);
                        self.current = None;
                    }
                }
            }

            let server_idx = *self.server_order.get(self.next_server)?;
            self.next_server += 1;
            match self.open_server(server_idx) {
                Ok(stream) => self.current = Some((server_idx, stream)),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
