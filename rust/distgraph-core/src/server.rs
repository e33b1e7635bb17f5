// rust/distgraph-core/src/server.rs

use std::sync::Arc;

use crate::catalog::PartitionCatalog;
use crate::config::GraphConfig;
use crate::engine::{InstanceRole, RemoteGraphEngine, RetryConfig, RetryingEngine, Topology};
use crate::error::{GraphError, Result};

/// A provisioned server instance.
///
/// Construction registers the instance with the engine under the shared
/// topology and declares every configured node feature, after which the
/// engine serves requests for this instance's shards.
pub struct DistGraphServer {
    engine: Arc<dyn RemoteGraphEngine>,
    catalog: PartitionCatalog,
    server_id: u32,
}

impl DistGraphServer {
    pub fn new(
        config: &GraphConfig,
        engine: Arc<dyn RemoteGraphEngine>,
        server_id: u32,
    ) -> Result<Self> {
        config.validate()?;
        let addresses = config.cluster.address_source()?.resolve()?;
        if server_id as usize >= addresses.len() {
            return Err(GraphError::config(format!(
                "server_id {} has no entry in the address list ({} addresses)",
                server_id,
                addresses.len()
            )));
        }
        let catalog = PartitionCatalog::from_config(config)?;

        let engine: Arc<dyn RemoteGraphEngine> = Arc::new(RetryingEngine::new(
            engine,
            RetryConfig::from(&config.engine),
        ));

        let topology = Topology {
            addresses,
            shard_num: catalog.shard_num(),
            node_types: catalog.node_types(),
            edge_types: catalog.edge_types(),
        };
        engine.provision(&topology, InstanceRole::Server { server_id })?;

        for info in &config.graph.nfeat_info {
            tracing::debug!(
                "declare feature {}.{} ({}, shape '{}')",
                info.node_type,
                info.name,
                info.dtype,
                info.shape
            );
            engine.declare_feature(&info.node_type, &info.name, &info.dtype, &info.shape)?;
        }

        tracing::info!(
            "server {} serving at {} with {} feature(s)",
            server_id,
            topology.addresses[server_id as usize],
            config.graph.nfeat_info.len()
        );

        Ok(Self {
            engine,
            catalog,
            server_id,
        })
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    /// Shards this instance serves, when it is one of the serving servers.
    pub fn shards(&self) -> Result<Vec<u32>> {
        self.catalog.shards_for_server(self.server_id)
    }

    pub fn shutdown(&self) -> Result<()> {
        tracing::info!("server {} shutting down", self.server_id);
        self.engine.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LocalGraphEngine;

    fn config() -> GraphConfig {
        r#"
        [graph]
        symmetry = true
        ntype2files = "u:/data/users"
        etype2files = "u2i:/data/u2i"

        [[graph.nfeat_info]]
        node_type = "u"
        name = "age"
        dtype = "int64"
        shape = "1"

        [[graph.nfeat_info]]
        node_type = "u"
        name = "name"
        dtype = "string"

        [cluster]
        shard_num = 6
        server_num = 2
        addresses = ["127.0.0.1:8245", "127.0.0.1:8246"]
        "#
        .parse()
        .unwrap()
    }

    #[test]
    fn test_server_provisions_and_declares_features() {
        let engine = Arc::new(LocalGraphEngine::new(6, 2, Some(1)).unwrap());
        let server = DistGraphServer::new(&config(), engine.clone(), 1).unwrap();

        assert_eq!(server.server_id(), 1);
        assert_eq!(server.shards().unwrap(), vec![1, 3, 5]);
        assert_eq!(
            engine.instances().unwrap(),
            vec![InstanceRole::Server { server_id: 1 }]
        );
    }

    #[test]
    fn test_server_id_must_have_an_address() {
        let engine = Arc::new(LocalGraphEngine::new(6, 2, Some(1)).unwrap());
        assert!(matches!(
            DistGraphServer::new(&config(), engine, 2),
            Err(GraphError::Config { .. })
        ));
    }

    #[test]
    fn test_shutdown_stops_engine() {
        let engine = Arc::new(LocalGraphEngine::new(6, 2, Some(1)).unwrap());
        let server = DistGraphServer::new(&config(), engine.clone(), 0).unwrap();
        server.shutdown().unwrap();
        assert!(engine.node_count("u").is_err());
    }
}
