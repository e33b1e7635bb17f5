// rust/distgraph-core/src/sampler.rs

//! Batched neighbor sampling.

use std::sync::Arc;

use crate::engine::{NodeId, RemoteGraphEngine, SampledNeighbor};
use crate::error::{GraphError, Result};

/// Issues one engine call per query batch and reshapes the answer into one
/// neighbor list per query node.
pub struct NeighborSampler {
    engine: Arc<dyn RemoteGraphEngine>,
}

impl NeighborSampler {
    pub fn new(engine: Arc<dyn RemoteGraphEngine>) -> Self {
        Self { engine }
    }

    /// Neighbor ids along `edge_type` for every node in `nodes`.
    ///
    /// The result is aligned with `nodes` and holds at most `max_degree`
    /// ids per node. Edge payloads are dropped.
    pub fn sample(
        &self,
        edge_type: &str,
        nodes: &[NodeId],
        max_degree: usize,
    ) -> Result<Vec<Vec<NodeId>>> {
        Ok(self
            .sample_with_payload(edge_type, nodes, max_degree)?
            .into_iter()
            .map(|neighbors| neighbors.into_iter().map(|n| n.id).collect())
            .collect())
    }

    /// Like [`sample`](Self::sample) but keeps each neighbor's edge weight.
    pub fn sample_with_payload(
        &self,
        edge_type: &str,
        nodes: &[NodeId],
        max_degree: usize,
    ) -> Result<Vec<Vec<SampledNeighbor>>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut sampled = self.engine.sample_neighbors(edge_type, nodes, max_degree)?;
        if sampled.len() != nodes.len() {
            return Err(GraphError::shape(format!(
                "sampling '{}' returned {} neighbor lists for {} nodes",
                edge_type,
                sampled.len(),
                nodes.len()
            )));
        }
        for neighbors in &mut sampled {
            neighbors.truncate(max_degree);
        }
        Ok(sampled)
    }
}
