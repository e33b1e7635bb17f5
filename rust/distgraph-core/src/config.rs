// rust/distgraph-core/src/config.rs

//! Configuration for distributed graph clients and servers.
//!
//! A [`GraphConfig`] is parsed once from TOML, optionally patched by `DGR_`
//! environment variables, validated, and then handed to every component
//! constructor. Nothing mutates it after start-up.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::catalog::AddressSource;
use crate::error::{GraphError, Result};
use crate::feature::FeatureDtype;

/// Shuffle buffer capacity used when `node_batch_stream_shuffle_size` is unset.
pub const DEFAULT_STREAM_SHUFFLE_SIZE: usize = 20_000;

// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub graph: GraphSchemaConfig,
    pub cluster: ClusterConfig,
    pub iteration: IterationConfig,
    pub engine: EngineConfig,
}

/// One or more source locations for a single node or edge type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl PathSpec {
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            PathSpec::One(path) => vec![path.clone()],
            PathSpec::Many(paths) => paths.clone(),
        }
    }
}

/// Mapping from a type name to its source files.
///
/// Accepts either a TOML table (`u = "./users"`, `i = ["a.txt", "b.txt"]`)
/// or the compact string form `"u:./users,i:./items"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeFiles {
    Compact(String),
    Table(BTreeMap<String, PathSpec>),
}

impl Default for TypeFiles {
    fn default() -> Self {
        TypeFiles::Table(BTreeMap::new())
    }
}

impl TypeFiles {
    /// Returns `(type, locations)` pairs in declaration order.
    ///
    /// The compact form keeps the order it was written in; the table form
    /// is ordered by type name.
    pub fn entries(&self) -> Result<Vec<(String, Vec<PathBuf>)>> {
        match self {
            TypeFiles::Table(table) => Ok(table
                .iter()
                .map(|(name, spec)| (name.clone(), spec.paths()))
                .collect()),
            TypeFiles::Compact(text) => {
                let mut entries: Vec<(String, Vec<PathBuf>)> = Vec::new();
                for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    let (name, location) = item.split_once(':').ok_or_else(|| {
                        GraphError::config(format!(
                            "invalid type/file entry '{item}', expected 'type:path'"
                        ))
                    })?;
                    let (name, location) = (name.trim(), location.trim());
                    if name.is_empty() || location.is_empty() {
                        return Err(GraphError::config(format!(
                            "invalid type/file entry '{item}', expected 'type:path'"
                        )));
                    }
                    if entries.iter().any(|(existing, _)| existing == name) {
                        return Err(GraphError::config(format!(
                            "type '{name}' is declared more than once"
                        )));
                    }
                    entries.push((name.to_string(), vec![PathBuf::from(location)]));
                }
                Ok(entries)
            }
        }
    }
}

/// Declared decode schema for one node feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub node_type: String,
    pub name: String,
    /// "string" or a numeric dtype name such as "int64" or "float32".
    pub dtype: String,
    /// Opaque shape hint forwarded to the engine.
    #[serde(default)]
    pub shape: String,
}

// Graph schema: which types exist and where their data lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSchemaConfig {
    // Load every edge type a second time in reverse.
    pub symmetry: bool,
    pub ntype2files: TypeFiles,
    pub etype2files: TypeFiles,
    pub nfeat_info: Vec<FeatureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_batch_stream_shuffle_size: Option<usize>,
}

/// Shard topology and engine addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of storage partitions.
    pub shard_num: u32,
    /// Number of reachable engine instances.
    pub server_num: u32,
    /// Inline `host:port` list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    /// File with one `host:port` per line (or `;`-separated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_file: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            shard_num: 1,
            server_num: 1,
            addresses: None,
            address_file: None,
        }
    }
}

impl ClusterConfig {
    /// Resolve where engine addresses come from.
    ///
    /// Exactly one of `addresses` and `address_file` must be set.
    pub fn address_source(&self) -> Result<AddressSource> {
        match (&self.addresses, &self.address_file) {
            (Some(list), None) => Ok(AddressSource::List(list.clone())),
            (None, Some(path)) => Ok(AddressSource::File(path.clone())),
            (Some(_), Some(_)) => Err(GraphError::config(
                "cluster.addresses and cluster.address_file are both set; choose one",
            )),
            (None, None) => Err(GraphError::config(
                "cluster.addresses or cluster.address_file must be set",
            )),
        }
    }
}

// Iteration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    // Seed for shard ordering, stream shuffling and random node sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Retry policy for engine calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of retries for transient engine failures.
    pub max_retries: u32,
    /// Initial delay (milliseconds) between retries.
    pub retry_delay_ms: u64,
    /// Maximum delay (milliseconds) between retries.
    pub max_retry_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 100,
            max_retry_delay_ms: 5_000,
        }
    }
}

impl FromStr for GraphConfig {
    type Err = GraphError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| GraphError::config_with_source("failed to parse TOML config", e))
    }
}

impl GraphConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphError::io_with_source(path, "failed to read config file", e))?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Recognised variables:
    // - `DGR_GRAPH_SYMMETRY` overrides `graph.symmetry`
    // - `DGR_GRAPH_SHUFFLE_SIZE` overrides `graph.node_batch_stream_shuffle_size`
    // - `DGR_CLUSTER_SHARD_NUM`, `DGR_CLUSTER_SERVER_NUM`
    // - `DGR_CLUSTER_ADDRESS_FILE` replaces any inline address list
    // - `DGR_ITERATION_SEED`
    // - `DGR_ENGINE_MAX_RETRIES`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("DGR_GRAPH_SYMMETRY") {
            if let Ok(v) = val.parse() {
                self.graph.symmetry = v;
            }
        }
        if let Ok(val) = std::env::var("DGR_GRAPH_SHUFFLE_SIZE") {
            if let Ok(v) = val.parse() {
                self.graph.node_batch_stream_shuffle_size = Some(v);
            }
        }
        if let Ok(val) = std::env::var("DGR_CLUSTER_SHARD_NUM") {
            if let Ok(v) = val.parse() {
                self.cluster.shard_num = v;
            }
        }
        if let Ok(val) = std::env::var("DGR_CLUSTER_SERVER_NUM") {
            if let Ok(v) = val.parse() {
                self.cluster.server_num = v;
            }
        }
        if let Ok(val) = std::env::var("DGR_CLUSTER_ADDRESS_FILE") {
            self.cluster.address_file = Some(PathBuf::from(val));
            self.cluster.addresses = None;
        }
        if let Ok(val) = std::env::var("DGR_ITERATION_SEED") {
            if let Ok(v) = val.parse() {
                self.iteration.seed = Some(v);
            }
        }
        if let Ok(val) = std::env::var("DGR_ENGINE_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                self.engine.max_retries = v;
            }
        }
        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.shard_num == 0 {
            return Err(GraphError::config(
                "cluster.shard_num must be greater than 0",
            ));
        }
        if self.cluster.server_num == 0 {
            return Err(GraphError::config(
                "cluster.server_num must be greater than 0",
            ));
        }
        self.cluster.address_source()?;

        if self.graph.node_batch_stream_shuffle_size == Some(0) {
            return Err(GraphError::config(
                "graph.node_batch_stream_shuffle_size must be greater than 0",
            ));
        }

        self.graph.ntype2files.entries()?;
        self.graph.etype2files.entries()?;

        for info in &self.graph.nfeat_info {
            if info.node_type.is_empty() || info.name.is_empty() {
                return Err(GraphError::config(
                    "graph.nfeat_info entries need a node_type and a name",
                ));
            }
            info.dtype.parse::<FeatureDtype>()?;
        }

        if self.engine.max_retry_delay_ms < self.engine.retry_delay_ms {
            return Err(GraphError::config(
                "engine.max_retry_delay_ms must not be less than engine.retry_delay_ms",
            ));
        }

        Ok(())
    }

    /// Shuffle buffer capacity, falling back to the default with a warning.
    pub fn stream_shuffle_size(&self) -> usize {
        match self.graph.node_batch_stream_shuffle_size {
            Some(size) => size,
            None => {
                tracing::warn!(
                    "node_batch_stream_shuffle_size is not specified, default value is {}",
                    DEFAULT_STREAM_SHUFFLE_SIZE
                );
                DEFAULT_STREAM_SHUFFLE_SIZE
            }
        }
    }
}
