// rust/distgraph-core/src/engine/retry.rs

//! Bounded retry policy for engine calls.
//!
//! Engine failures are fatal by default. When retries are configured, only
//! errors the engine marks as transient are reissued, with exponential
//! backoff and jitter between attempts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use super::traits::{InstanceRole, NodeId, RemoteGraphEngine, SampledNeighbor, Topology};
use crate::config::EngineConfig;
use crate::error::Result;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl From<&EngineConfig> for RetryConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a retry configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Calculates the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            delay_secs * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            delay_secs
        };

        Duration::from_secs_f64(final_delay)
    }

    /// Returns true if more retries are allowed for the given attempt.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Run a blocking engine call, reissuing it on transient failures.
pub fn retry_blocking<T, F>(config: &RetryConfig, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;

    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() || !config.should_retry(attempt) {
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "engine call '{}' failed (attempt {}), retrying in {:?}: {}",
                    operation,
                    attempt + 1,
                    delay,
                    error
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Engine decorator applying a [`RetryConfig`] to every call.
pub struct RetryingEngine {
    inner: Arc<dyn RemoteGraphEngine>,
    config: RetryConfig,
}

impl RetryingEngine {
    pub fn new(inner: Arc<dyn RemoteGraphEngine>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl RemoteGraphEngine for RetryingEngine {
    fn provision(&self, topology: &Topology, role: InstanceRole) -> Result<()> {
        retry_blocking(&self.config, "provision", || {
            self.inner.provision(topology, role)
        })
    }

    fn load_node_file(&self, node_type: &str, paths: &[PathBuf]) -> Result<()> {
        retry_blocking(&self.config, "load_node_file", || {
            self.inner.load_node_file(node_type, paths)
        })
    }

    fn load_edge_file(&self, edge_type: &str, paths: &[PathBuf], is_reverse: bool) -> Result<()> {
        retry_blocking(&self.config, "load_edge_file", || {
            self.inner.load_edge_file(edge_type, paths, is_reverse)
        })
    }

    fn declare_feature(
        &self,
        node_type: &str,
        feature_name: &str,
        dtype: &str,
        shape: &str,
    ) -> Result<()> {
        retry_blocking(&self.config, "declare_feature", || {
            self.inner.declare_feature(node_type, feature_name, dtype, shape)
        })
    }

    fn sample_neighbors(
        &self,
        edge_type: &str,
        nodes: &[NodeId],
        max_degree: usize,
    ) -> Result<Vec<Vec<SampledNeighbor>>> {
        retry_blocking(&self.config, "sample_neighbors", || {
            self.inner.sample_neighbors(edge_type, nodes, max_degree)
        })
    }

    fn random_sample_nodes(
        &self,
        node_type: &str,
        server_idx: u32,
        count: usize,
    ) -> Result<Vec<NodeId>> {
        retry_blocking(&self.config, "random_sample_nodes", || {
            self.inner.random_sample_nodes(node_type, server_idx, count)
        })
    }

    fn pull_node_batch(
        &self,
        node_type: &str,
        server_idx: u32,
        start: usize,
        count: usize,
    ) -> Result<Vec<NodeId>> {
        retry_blocking(&self.config, "pull_node_batch", || {
            self.inner.pull_node_batch(node_type, server_idx, start, count)
        })
    }

    fn fetch_feature(
        &self,
        node_type: &str,
        nodes: &[NodeId],
        feature_names: &[String],
    ) -> Result<Vec<Vec<Bytes>>> {
        retry_blocking(&self.config, "fetch_feature", || {
            self.inner.fetch_feature(node_type, nodes, feature_names)
        })
    }

    fn shutdown(&self) -> Result<()> {
        retry_blocking(&self.config, "shutdown", || self.inner.shutdown())
    }
}
