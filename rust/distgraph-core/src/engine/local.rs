// rust/distgraph-core/src/engine/local.rs

//! In-process graph engine.
//!
//! `LocalGraphEngine` keeps the whole partitioned graph in memory. It follows
//! the same placement rules as a remote deployment (node `n` lives in shard
//! `n % shard_num`, shard `s` is served by server `s % server_num`), so
//! anything written against it behaves the same against a real cluster.
//!
//! Source formats, one record per line, `#` comments and blank lines skipped:
//!
//! - nodes: `id[\tname:v v v]*`
//! - edges: `src\tdst[\tweight]`

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::traits::{InstanceRole, NodeId, RemoteGraphEngine, SampledNeighbor, Topology};
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::feature::FeatureDtype;

/// Nodes of one type, split by shard.
#[derive(Debug)]
struct NodeTable {
    /// Per-shard node ids in load order.
    shards: Vec<Vec<NodeId>>,
    /// Raw feature text per node.
    features: HashMap<NodeId, HashMap<String, String>>,
}

impl NodeTable {
    fn new(shard_num: u32) -> Self {
        Self {
            shards: vec![Vec::new(); shard_num as usize],
            features: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct GraphState {
    instances: Vec<InstanceRole>,
    nodes: HashMap<String, NodeTable>,
    edges: HashMap<String, HashMap<NodeId, Vec<SampledNeighbor>>>,
    features: HashMap<(String, String), FeatureDtype>,
    stopped: bool,
}

/// In-memory engine holding every shard of the graph.
pub struct LocalGraphEngine {
    shard_num: u32,
    server_num: u32,
    state: RwLock<GraphState>,
    rng: Mutex<StdRng>,
}

impl LocalGraphEngine {
    /// Creates an empty engine. With a `seed`, sampling is reproducible.
    ///
    /// # Errors
    ///
    /// Returns an error if `shard_num` or `server_num` is zero.
    pub fn new(shard_num: u32, server_num: u32, seed: Option<u64>) -> Result<Self> {
        if shard_num == 0 || server_num == 0 {
            return Err(GraphError::config(
                "shard_num and server_num must be greater than 0",
            ));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            shard_num,
            server_num,
            state: RwLock::new(GraphState::default()),
            rng: Mutex::new(rng),
        })
    }

    /// Creates an engine with the topology and seed of a configuration.
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        Self::new(
            config.cluster.shard_num,
            config.cluster.server_num,
            config.iteration.seed,
        )
    }

    /// Instances that have provisioned against this engine, in order.
    pub fn instances(&self) -> Result<Vec<InstanceRole>> {
        Ok(self.read("instances")?.instances.clone())
    }

    /// Number of nodes of a type across all shards.
    pub fn node_count(&self, node_type: &str) -> Result<usize> {
        let state = self.read("node_count")?;
        Ok(state
            .nodes
            .get(node_type)
            .map(|table| table.shards.iter().map(Vec::len).sum())
            .unwrap_or(0))
    }

    fn read(&self, operation: &str) -> Result<std::sync::RwLockReadGuard<'_, GraphState>> {
        let state = self
            .state
            .read()
            .map_err(|_| GraphError::engine(operation, "engine state lock poisoned"))?;
        if state.stopped {
            return Err(GraphError::engine(operation, "engine has been shut down"));
        }
        Ok(state)
    }

    fn write(&self, operation: &str) -> Result<std::sync::RwLockWriteGuard<'_, GraphState>> {
        let state = self
            .state
            .write()
            .map_err(|_| GraphError::engine(operation, "engine state lock poisoned"))?;
        if state.stopped {
            return Err(GraphError::engine(operation, "engine has been shut down"));
        }
        Ok(state)
    }

    fn check_server(&self, server_idx: u32) -> Result<()> {
        if server_idx >= self.server_num {
            return Err(GraphError::invalid_shard(server_idx, self.server_num));
        }
        Ok(())
    }

    /// Shards owned by a server, in shard order.
    fn owned_shards(&self, server_idx: u32) -> impl Iterator<Item = usize> {
        (server_idx as usize..self.shard_num as usize).step_by(self.server_num as usize)
    }

    fn shard_of(&self, node: NodeId) -> usize {
        (node % self.shard_num as u64) as usize
    }
}

/// Read every non-comment line of the given files.
fn for_each_record(
    paths: &[PathBuf],
    mut handle: impl FnMut(&Path, usize, &str) -> Result<()>,
) -> Result<()> {
    for path in paths {
        let file = File::open(path)
            .map_err(|e| GraphError::io_with_source(path, "failed to open source file", e))?;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.map_err(|e| GraphError::io_with_source(path, "failed to read source file", e))?;
            let record = line.trim();
            if record.is_empty() || record.starts_with('#') {
                continue;
            }
            handle(path, index + 1, record)?;
        }
    }
    Ok(())
}

fn parse_node_id(operation: &str, path: &Path, line: usize, token: &str) -> Result<NodeId> {
    token.parse().map_err(|_| {
        GraphError::engine(
            operation,
            format!("{}:{}: invalid node id '{}'", path.display(), line, token),
        )
    })
}

impl RemoteGraphEngine for LocalGraphEngine {
    fn provision(&self, topology: &Topology, role: InstanceRole) -> Result<()> {
        if topology.shard_num != self.shard_num {
            return Err(GraphError::config(format!(
                "topology declares {} shards but the engine holds {}",
                topology.shard_num, self.shard_num
            )));
        }
        if let InstanceRole::Server { server_id } = role {
            self.check_server(server_id)?;
        }
        let mut state = self.write("provision")?;
        for node_type in &topology.node_types {
            state
                .nodes
                .entry(node_type.clone())
                .or_insert_with(|| NodeTable::new(self.shard_num));
        }
        for edge_type in &topology.edge_types {
            state.edges.entry(edge_type.clone()).or_default();
        }
        state.instances.push(role);
        tracing::info!(
            "provisioned {:?} against {} shards ({} node types, {} edge types)",
            role,
            topology.shard_num,
            topology.node_types.len(),
            topology.edge_types.len()
        );
        Ok(())
    }

    fn load_node_file(&self, node_type: &str, paths: &[PathBuf]) -> Result<()> {
        let mut parsed: Vec<(NodeId, HashMap<String, String>)> = Vec::new();
        for_each_record(paths, |path, line, record| {
            let mut fields = record.split('\t');
            let id = parse_node_id("load_node_file", path, line, fields.next().unwrap_or(""))?;
            let mut features = HashMap::new();
            for field in fields {
                let (name, value) = field.split_once(':').ok_or_else(|| {
                    GraphError::engine(
                        "load_node_file",
                        format!(
                            "{}:{}: feature field '{}' is not name:value",
                            path.display(),
                            line,
                            field
                        ),
                    )
                })?;
                features.insert(name.to_string(), value.trim().to_string());
            }
            parsed.push((id, features));
            Ok(())
        })?;

        let mut state = self.write("load_node_file")?;
        let shard_num = self.shard_num;
        let table = state
            .nodes
            .entry(node_type.to_string())
            .or_insert_with(|| NodeTable::new(shard_num));
        for (id, features) in parsed {
            if !table.features.contains_key(&id) {
                table.shards[self.shard_of(id)].push(id);
            }
            table.features.entry(id).or_default().extend(features);
        }
        Ok(())
    }

    fn load_edge_file(&self, edge_type: &str, paths: &[PathBuf], is_reverse: bool) -> Result<()> {
        let mut parsed: Vec<(NodeId, SampledNeighbor)> = Vec::new();
        for_each_record(paths, |path, line, record| {
            let fields: Vec<&str> = record.split_whitespace().collect();
            if fields.len() < 2 {
                return Err(GraphError::engine(
                    "load_edge_file",
                    format!("{}:{}: expected 'src dst [weight]'", path.display(), line),
                ));
            }
            let src = parse_node_id("load_edge_file", path, line, fields[0])?;
            let dst = parse_node_id("load_edge_file", path, line, fields[1])?;
            let weight = match fields.get(2) {
                Some(token) => Some(token.parse::<f32>().map_err(|_| {
                    GraphError::engine(
                        "load_edge_file",
                        format!("{}:{}: invalid weight '{}'", path.display(), line, token),
                    )
                })?),
                None => None,
            };
            let (from, to) = if is_reverse { (dst, src) } else { (src, dst) };
            parsed.push((from, SampledNeighbor { id: to, weight }));
            Ok(())
        })?;

        let mut state = self.write("load_edge_file")?;
        let adjacency = state.edges.entry(edge_type.to_string()).or_default();
        for (from, neighbor) in parsed {
            adjacency.entry(from).or_default().push(neighbor);
        }
        Ok(())
    }

    fn declare_feature(
        &self,
        node_type: &str,
        feature_name: &str,
        dtype: &str,
        _shape: &str,
    ) -> Result<()> {
        let dtype: FeatureDtype = dtype.parse()?;
        let mut state = self.write("declare_feature")?;
        state
            .features
            .insert((node_type.to_string(), feature_name.to_string()), dtype);
        Ok(())
    }

    fn sample_neighbors(
        &self,
        edge_type: &str,
        nodes: &[NodeId],
        max_degree: usize,
    ) -> Result<Vec<Vec<SampledNeighbor>>> {
        let state = self.read("sample_neighbors")?;
        let adjacency = state.edges.get(edge_type).ok_or_else(|| {
            GraphError::engine("sample_neighbors", format!("unknown edge type '{edge_type}'"))
        })?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| GraphError::engine("sample_neighbors", "rng lock poisoned"))?;

        Ok(nodes
            .iter()
            .map(|node| match adjacency.get(node) {
                None => Vec::new(),
                Some(neighbors) if neighbors.len() <= max_degree => neighbors.clone(),
                Some(neighbors) => {
                    rand::seq::index::sample(&mut *rng, neighbors.len(), max_degree)
                        .into_iter()
                        .map(|i| neighbors[i])
                        .collect()
                }
            })
            .collect())
    }

    fn random_sample_nodes(
        &self,
        node_type: &str,
        server_idx: u32,
        count: usize,
    ) -> Result<Vec<NodeId>> {
        self.check_server(server_idx)?;
        let state = self.read("random_sample_nodes")?;
        let table = state.nodes.get(node_type).ok_or_else(|| {
            GraphError::engine("random_sample_nodes", format!("unknown node type '{node_type}'"))
        })?;
        let candidates: Vec<NodeId> = self
            .owned_shards(server_idx)
            .flat_map(|shard| table.shards[shard].iter().copied())
            .collect();
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| GraphError::engine("random_sample_nodes", "rng lock poisoned"))?;

        let amount = count.min(candidates.len());
        Ok(rand::seq::index::sample(&mut *rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i])
            .collect())
    }

    fn pull_node_batch(
        &self,
        node_type: &str,
        server_idx: u32,
        start: usize,
        count: usize,
    ) -> Result<Vec<NodeId>> {
        self.check_server(server_idx)?;
        let state = self.read("pull_node_batch")?;
        let table = state.nodes.get(node_type).ok_or_else(|| {
            GraphError::engine("pull_node_batch", format!("unknown node type '{node_type}'"))
        })?;

        let mut skip = start;
        let mut batch = Vec::with_capacity(count);
        for shard in self.owned_shards(server_idx) {
            if batch.len() == count {
                break;
            }
            let nodes = &table.shards[shard];
            if skip >= nodes.len() {
                skip -= nodes.len();
                continue;
            }
            let take = (count - batch.len()).min(nodes.len() - skip);
            batch.extend_from_slice(&nodes[skip..skip + take]);
            skip = 0;
        }
        Ok(batch)
    }

    fn fetch_feature(
        &self,
        node_type: &str,
        nodes: &[NodeId],
        feature_names: &[String],
    ) -> Result<Vec<Vec<Bytes>>> {
        let state = self.read("fetch_feature")?;
        let table = state.nodes.get(node_type);

        feature_names
            .iter()
            .map(|name| {
                let dtype = state
                    .features
                    .get(&(node_type.to_string(), name.clone()))
                    .ok_or_else(|| {
                        GraphError::engine(
                            "fetch_feature",
                            format!("feature '{name}' is not declared for node type '{node_type}'"),
                        )
                    })?;
                nodes
                    .iter()
                    .map(|node| {
                        let raw = table
                            .and_then(|t| t.features.get(node))
                            .and_then(|features| features.get(name));
                        match raw {
                            Some(text) => {
                                let tokens: Vec<&str> = text.split_whitespace().collect();
                                dtype.encode_tokens(&tokens)
                            }
                            None => Ok(Bytes::new()),
                        }
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    fn shutdown(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| GraphError::engine("shutdown", "engine state lock poisoned"))?;
        if !state.stopped {
            state.stopped = true;
            tracing::info!("local graph engine stopped");
        }
        Ok(())
    }
}
