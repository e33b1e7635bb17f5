// rust/distgraph-core/src/client.rs

//! Client side of a distributed graph deployment.
//!
//! A [`DistGraphClient`] registers against the engine's shard topology and
//! then drives it: bulk loading, neighbor sampling, node iteration and
//! feature lookup.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalog::PartitionCatalog;
use crate::config::GraphConfig;
use crate::dataset::{DistributedBatchIterator, NodeBatchOptions};
use crate::engine::{
    InstanceRole, NodeId, RemoteGraphEngine, RetryConfig, RetryingEngine, Topology,
};
use crate::error::{GraphError, Result};
use crate::feature::{FeatureDecoder, FeatureTable, FeatureValue};
use crate::sampler::NeighborSampler;

/// A provisioned client instance.
pub struct DistGraphClient {
    engine: Arc<dyn RemoteGraphEngine>,
    catalog: PartitionCatalog,
    sampler: NeighborSampler,
    features: FeatureDecoder,
    client_id: u32,
    addresses: Vec<String>,
    shuffle_size: usize,
    rng: Mutex<StdRng>,
}

impl DistGraphClient {
    /// Validate `config`, resolve the engine addresses and provision a
    /// client instance.
    ///
    /// Engine calls made through the client follow the configured retry
    /// policy.
    pub fn new(
        config: &GraphConfig,
        engine: Arc<dyn RemoteGraphEngine>,
        client_id: u32,
    ) -> Result<Self> {
        config.validate()?;
        let addresses = config.cluster.address_source()?.resolve()?;
        let catalog = PartitionCatalog::from_config(config)?;
        let table = FeatureTable::from_infos(&config.graph.nfeat_info)?;

        let engine: Arc<dyn RemoteGraphEngine> = Arc::new(RetryingEngine::new(
            engine,
            RetryConfig::from(&config.engine),
        ));

        let topology = Topology {
            addresses: addresses.clone(),
            shard_num: catalog.shard_num(),
            node_types: catalog.node_types(),
            edge_types: catalog.edge_types(),
        };
        engine.provision(&topology, InstanceRole::Client { client_id })?;
        tracing::info!(
            "client {} provisioned: {} addresses, {} shards, {} servers",
            client_id,
            addresses.len(),
            catalog.shard_num(),
            catalog.server_num()
        );

        let rng = match config.iteration.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(client_id))),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            sampler: NeighborSampler::new(Arc::clone(&engine)),
            features: FeatureDecoder::new(Arc::clone(&engine), table),
            shuffle_size: config.stream_shuffle_size(),
            engine,
            catalog,
            client_id,
            addresses,
            rng: Mutex::new(rng),
        })
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn catalog(&self) -> &PartitionCatalog {
        &self.catalog
    }

    /// Load every declared node type from its source files.
    pub fn load_node_types(&self) -> Result<()> {
        for (node_type, paths) in self.catalog.node_loads()? {
            tracing::info!("load nodes of type {} from {} file(s)", node_type, paths.len());
            tracing::debug!("node files for {}: {:?}", node_type, paths);
            self.engine.load_node_file(&node_type, &paths)?;
        }
        Ok(())
    }

    /// Load every declared edge type, plus its reverse when symmetric
    /// loading is on.
    pub fn load_edges(&self) -> Result<()> {
        for load in self.catalog.edge_loads()? {
            tracing::info!(
                "load edges of type {} from {} file(s){}",
                load.edge_type,
                load.paths.len(),
                if load.is_reverse { " (reverse)" } else { "" }
            );
            self.engine
                .load_edge_file(&load.edge_type, &load.paths, load.is_reverse)?;
        }
        Ok(())
    }

    /// Up to `max_degree` out-neighbors of each node along `edge_type`.
    pub fn sample_successor(
        &self,
        nodes: &[NodeId],
        max_degree: usize,
        edge_type: &str,
    ) -> Result<Vec<Vec<NodeId>>> {
        self.sampler.sample(edge_type, nodes, max_degree)
    }

    /// Up to `max_degree` in-neighbors of each node along `edge_type`.
    ///
    /// Uses the reverse edge type when the graph was loaded symmetrically.
    pub fn sample_predecessor(
        &self,
        nodes: &[NodeId],
        max_degree: usize,
        edge_type: &str,
    ) -> Result<Vec<Vec<NodeId>>> {
        let edge_type = self.catalog.predecessor_edge_type(edge_type);
        self.sampler.sample(&edge_type, nodes, max_degree)
    }

    /// Up to `size` random nodes of a type from one randomly chosen server.
    pub fn random_sample_nodes(&self, node_type: &str, size: usize) -> Result<Vec<NodeId>> {
        let server_idx = self.lock_rng()?.gen_range(0..self.catalog.server_num());
        self.engine.random_sample_nodes(node_type, server_idx, size)
    }

    /// Iterate over all nodes of a type, split across `nrank` consumers.
    pub fn node_batch_iter(
        &self,
        batch_size: usize,
        node_type: &str,
        shuffle: bool,
        rank: u32,
        nrank: u32,
    ) -> Result<DistributedBatchIterator> {
        let options = NodeBatchOptions::new(node_type, batch_size)
            .with_shuffle(shuffle)
            .with_rank(rank, nrank);
        let rng = StdRng::seed_from_u64(self.lock_rng()?.gen());
        DistributedBatchIterator::new(
            Arc::clone(&self.engine),
            options,
            self.catalog.server_num(),
            self.shuffle_size,
            rng,
        )
    }

    /// One decoded feature value per node.
    pub fn node_feat_one(
        &self,
        nodes: &[NodeId],
        node_type: &str,
        feature: &str,
    ) -> Result<Vec<FeatureValue>> {
        self.features.fetch_one(nodes, node_type, feature)
    }

    /// One decoded list per feature name, each aligned with `nodes`.
    pub fn node_feat_many(
        &self,
        nodes: &[NodeId],
        node_type: &str,
        features: &[String],
    ) -> Result<Vec<Vec<FeatureValue>>> {
        self.features.fetch_many(nodes, node_type, features)
    }

    /// Ask the engine to shut down.
    pub fn stop_server(&self) -> Result<()> {
        tracing::info!("client {} stopping servers", self.client_id);
        self.engine.shutdown()
    }

    fn lock_rng(&self) -> Result<std::sync::MutexGuard<'_, StdRng>> {
        self.rng
            .lock()
            .map_err(|_| GraphError::engine("client", "rng lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SampledNeighbor;
    use bytes::Bytes;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Provision(Topology, InstanceRole),
        LoadNodes(String, usize),
        LoadEdges(String, usize, bool),
        Sample(String, Vec<NodeId>, usize),
        RandomNodes(String, u32, usize),
        Pull(u32, usize, usize),
        Fetch(String, Vec<String>),
        Shutdown,
    }

    /// Records every engine call.
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingEngine {
        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteGraphEngine for RecordingEngine {
        fn provision(&self, topology: &Topology, role: InstanceRole) -> Result<()> {
            self.record(Call::Provision(topology.clone(), role));
            Ok(())
        }

        fn load_node_file(&self, node_type: &str, paths: &[PathBuf]) -> Result<()> {
            self.record(Call::LoadNodes(node_type.to_string(), paths.len()));
            Ok(())
        }

        fn load_edge_file(&self, edge_type: &str, paths: &[PathBuf], is_reverse: bool) -> Result<()> {
            self.record(Call::LoadEdges(edge_type.to_string(), paths.len(), is_reverse));
            Ok(())
        }

        fn declare_feature(&self, _: &str, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn sample_neighbors(
            &self,
            edge_type: &str,
            nodes: &[NodeId],
            max_degree: usize,
        ) -> Result<Vec<Vec<SampledNeighbor>>> {
            self.record(Call::Sample(edge_type.to_string(), nodes.to_vec(), max_degree));
            Ok(nodes
                .iter()
                .map(|&n| vec![SampledNeighbor::weighted(n + 100, 1.0)])
                .collect())
        }

        fn random_sample_nodes(
            &self,
            node_type: &str,
            server_idx: u32,
            count: usize,
        ) -> Result<Vec<NodeId>> {
            self.record(Call::RandomNodes(node_type.to_string(), server_idx, count));
            Ok((0..count as u64).collect())
        }

        fn pull_node_batch(
            &self,
            _node_type: &str,
            server_idx: u32,
            start: usize,
            count: usize,
        ) -> Result<Vec<NodeId>> {
            self.record(Call::Pull(server_idx, start, count));
            // Every server holds 5 nodes.
            let end = (start + count).min(5);
            Ok((start.min(5)..end).map(|i| i as u64).collect())
        }

        fn fetch_feature(
            &self,
            node_type: &str,
            nodes: &[NodeId],
            feature_names: &[String],
        ) -> Result<Vec<Vec<Bytes>>> {
            self.record(Call::Fetch(node_type.to_string(), feature_names.to_vec()));
            Ok(feature_names
                .iter()
                .map(|_| {
                    nodes
                        .iter()
                        .map(|n| Bytes::from(format!("n{n}")))
                        .collect()
                })
                .collect())
        }

        fn shutdown(&self) -> Result<()> {
            self.record(Call::Shutdown);
            Ok(())
        }
    }

    fn graph_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["users/part-0", "users/part-1", "items.txt", "u2i/part-0", "u2u.txt"] {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "1\n").unwrap();
        }
        dir
    }

    fn config(dir: &TempDir, symmetry: bool) -> GraphConfig {
        format!(
            r#"
            [graph]
            symmetry = {symmetry}
            ntype2files = "u:{root}/users,i:{root}/items.txt"
            etype2files = "u2i:{root}/u2i,u2u:{root}/u2u.txt"
            node_batch_stream_shuffle_size = 4

            [[graph.nfeat_info]]
            node_type = "u"
            name = "name"
            dtype = "string"

            [cluster]
            shard_num = 4
            server_num = 2
            addresses = ["10.0.0.1:8245", "10.0.0.2:8245"]

            [iteration]
            seed = 17
            "#,
            root = dir.path().display()
        )
        .parse()
        .unwrap()
    }

    fn client(dir: &TempDir, symmetry: bool) -> (DistGraphClient, Arc<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::default());
        let client = DistGraphClient::new(&config(dir, symmetry), engine.clone(), 3).unwrap();
        (client, engine)
    }

    #[test]
    fn test_provisions_as_client() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, true);
        assert_eq!(client.client_id(), 3);
        assert_eq!(client.addresses().len(), 2);

        let calls = engine.calls();
        let Call::Provision(topology, role) = &calls[0] else {
            panic!("expected provision, got {:?}", calls[0]);
        };
        assert_eq!(*role, InstanceRole::Client { client_id: 3 });
        assert_eq!(topology.shard_num, 4);
        assert_eq!(topology.node_types, vec!["u", "i"]);
        assert_eq!(topology.edge_types, vec!["u2i", "i2u", "u2u"]);
    }

    #[test]
    fn test_load_node_types() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, false);
        client.load_node_types().unwrap();

        let loads: Vec<_> = engine.calls().into_iter().skip(1).collect();
        assert_eq!(
            loads,
            vec![
                Call::LoadNodes("u".into(), 2),
                Call::LoadNodes("i".into(), 1)
            ]
        );
    }

    #[test]
    fn test_symmetric_edge_loading() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, true);
        client.load_edges().unwrap();

        let loads: Vec<_> = engine.calls().into_iter().skip(1).collect();
        assert_eq!(
            loads,
            vec![
                Call::LoadEdges("u2i".into(), 1, false),
                Call::LoadEdges("i2u".into(), 1, true),
                Call::LoadEdges("u2u".into(), 1, false),
                Call::LoadEdges("u2u".into(), 1, true),
            ]
        );
    }

    #[test]
    fn test_asymmetric_edge_loading() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, false);
        client.load_edges().unwrap();

        let reverse = engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::LoadEdges(_, _, true)))
            .count();
        assert_eq!(reverse, 0);
    }

    #[test]
    fn test_load_reports_missing_files() {
        let dir = graph_dir();
        let (client, _engine) = client(&dir, false);
        std::fs::remove_file(dir.path().join("items.txt")).unwrap();
        assert!(matches!(
            client.load_node_types(),
            Err(GraphError::Config { .. })
        ));
    }

    #[test]
    fn test_sample_successor_and_predecessor() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, true);

        let successors = client.sample_successor(&[1, 2], 5, "u2i").unwrap();
        assert_eq!(successors, vec![vec![101], vec![102]]);
        client.sample_predecessor(&[7], 3, "u2i").unwrap();

        let calls = engine.calls();
        assert!(calls.contains(&Call::Sample("u2i".into(), vec![1, 2], 5)));
        assert!(calls.contains(&Call::Sample("i2u".into(), vec![7], 3)));
    }

    #[test]
    fn test_random_sample_nodes_picks_valid_server() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, false);
        for _ in 0..20 {
            assert_eq!(client.random_sample_nodes("u", 3).unwrap().len(), 3);
        }
        for call in engine.calls() {
            if let Call::RandomNodes(node_type, server_idx, count) = call {
                assert_eq!(node_type, "u");
                assert!(server_idx < 2);
                assert_eq!(count, 3);
            }
        }
    }

    #[test]
    fn test_node_batch_iter_covers_all_servers() {
        let dir = graph_dir();
        let (client, _engine) = client(&dir, false);

        let mut total = 0;
        for rank in 0..2 {
            for batch in client.node_batch_iter(2, "u", true, rank, 2).unwrap() {
                total += batch.unwrap().len();
            }
        }
        // 2 servers with 5 nodes each.
        assert_eq!(total, 10);
    }

    #[test]
    fn test_node_batch_iter_rejects_bad_rank() {
        let dir = graph_dir();
        let (client, _engine) = client(&dir, false);
        assert!(matches!(
            client.node_batch_iter(2, "u", false, 2, 2),
            Err(GraphError::InvalidRank { rank: 2, nrank: 2 })
        ));
    }

    #[test]
    fn test_node_features() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, false);

        let one = client.node_feat_one(&[1, 2], "u", "name").unwrap();
        assert_eq!(one[1].as_text(), Some("n2"));

        let many = client
            .node_feat_many(&[1, 2], "u", &["name".to_string()])
            .unwrap();
        assert_eq!(many, vec![one]);

        assert!(matches!(
            client.node_feat_one(&[1], "u", "age"),
            Err(GraphError::UnknownFeature { .. })
        ));
        let fetches = engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Fetch(..)))
            .count();
        assert_eq!(fetches, 2);
    }

    #[test]
    fn test_stop_server() {
        let dir = graph_dir();
        let (client, engine) = client(&dir, false);
        client.stop_server().unwrap();
        assert_eq!(engine.calls().last(), Some(&Call::Shutdown));
    }

    #[test]
    fn test_rejects_missing_addresses() {
        let dir = graph_dir();
        let mut config = config(&dir, false);
        config.cluster.addresses = None;
        let result = DistGraphClient::new(&config, Arc::new(RecordingEngine::default()), 0);
        assert!(matches!(result, Err(GraphError::Config { .. })));
    }
}
