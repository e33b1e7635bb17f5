// rust/distgraph-core/src/catalog/mod.rs

//! Node/edge type catalog and shard placement.
//!
//! The catalog is built once from the graph schema and never changes. It
//! knows which node and edge types exist, where their source files live,
//! which reverse edge types symmetric loading adds, and which server owns
//! which shard.

mod address;

pub use address::{parse_address_list, AddressSource};

use std::path::{Path, PathBuf};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};

/// One `load_edge_file` call in the load plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLoad {
    pub edge_type: String,
    pub paths: Vec<PathBuf>,
    pub is_reverse: bool,
}

/// Immutable view of the graph's types, sources and shard layout.
#[derive(Debug, Clone)]
pub struct PartitionCatalog {
    node_types: Vec<(String, Vec<PathBuf>)>,
    edge_types: Vec<(String, Vec<PathBuf>)>,
    symmetry: bool,
    shard_num: u32,
    server_num: u32,
}

impl PartitionCatalog {
    /// Build the catalog from configuration.
    ///
    /// Only the declarations are parsed here; file locations are resolved
    /// when a load plan is requested.
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        if config.cluster.shard_num == 0 || config.cluster.server_num == 0 {
            return Err(GraphError::config(
                "shard_num and server_num must be greater than 0",
            ));
        }
        Ok(Self {
            node_types: config.graph.ntype2files.entries()?,
            edge_types: config.graph.etype2files.entries()?,
            symmetry: config.graph.symmetry,
            shard_num: config.cluster.shard_num,
            server_num: config.cluster.server_num,
        })
    }

    /// Declared node type names.
    pub fn node_types(&self) -> Vec<String> {
        self.node_types.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Every edge type the engine serves: the declared types, plus each
    /// inverse type when symmetric loading is on. A self-inverse name is
    /// listed once.
    pub fn edge_types(&self) -> Vec<String> {
        let mut types = Vec::with_capacity(self.edge_types.len() * 2);
        for (etype, _) in &self.edge_types {
            types.push(etype.clone());
            if self.symmetry {
                let reverse = inverse_edge_type(etype);
                if reverse != *etype {
                    types.push(reverse);
                }
            }
        }
        types
    }

    pub fn symmetry(&self) -> bool {
        self.symmetry
    }

    pub fn shard_num(&self) -> u32 {
        self.shard_num
    }

    pub fn server_num(&self) -> u32 {
        self.server_num
    }

    /// Server indices that serve data, in index order.
    pub fn serving_servers(&self) -> Vec<u32> {
        (0..self.server_num).collect()
    }

    /// Shards owned by a server (shard `s` lives on server `s % server_num`).
    pub fn shards_for_server(&self, server_idx: u32) -> Result<Vec<u32>> {
        self.check_server(server_idx)?;
        Ok((server_idx..self.shard_num)
            .step_by(self.server_num as usize)
            .collect())
    }

    pub fn check_server(&self, server_idx: u32) -> Result<()> {
        if server_idx >= self.server_num {
            return Err(GraphError::invalid_shard(server_idx, self.server_num));
        }
        Ok(())
    }

    /// `(node_type, files)` for every node type, files resolved.
    pub fn node_loads(&self) -> Result<Vec<(String, Vec<PathBuf>)>> {
        self.node_types
            .iter()
            .map(|(ntype, locations)| Ok((ntype.clone(), resolve_locations(ntype, locations)?)))
            .collect()
    }

    /// Edge load plan: one forward load per declared type, followed by a
    /// reverse-flagged load of its inverse type over the same files when
    /// symmetric loading is on.
    pub fn edge_loads(&self) -> Result<Vec<EdgeLoad>> {
        let mut loads = Vec::new();
        for (etype, locations) in &self.edge_types {
            let paths = resolve_locations(etype, locations)?;
            if self.symmetry {
                loads.push(EdgeLoad {
                    edge_type: etype.clone(),
                    paths: paths.clone(),
                    is_reverse: false,
                });
                loads.push(EdgeLoad {
                    edge_type: inverse_edge_type(etype),
                    paths,
                    is_reverse: true,
                });
            } else {
                loads.push(EdgeLoad {
                    edge_type: etype.clone(),
                    paths,
                    is_reverse: false,
                });
            }
        }
        Ok(loads)
    }

    /// The edge type to sample when walking `edge_type` backwards.
    ///
    /// With symmetric loading this is the inverse type; otherwise the
    /// engine only knows the forward type, which is returned unchanged.
    pub fn predecessor_edge_type(&self, edge_type: &str) -> String {
        if self.symmetry {
            inverse_edge_type(edge_type)
        } else {
            edge_type.to_string()
        }
    }
}

/// Derive the reverse relation name.
///
/// Names are `2`-joined: `src2rel2dst` becomes `dst2rel2src`, anything else
/// has its fields reversed (`u2i` becomes `i2u`).
pub fn inverse_edge_type(edge_type: &str) -> String {
    let fields: Vec<&str> = edge_type.split('2').collect();
    if fields.len() == 3 {
        [fields[2], fields[1], fields[0]].join("2")
    } else {
        fields.into_iter().rev().collect::<Vec<_>>().join("2")
    }
}

fn resolve_locations(type_name: &str, locations: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if locations.is_empty() {
        return Err(GraphError::config(format!(
            "no source path declared for type '{type_name}'"
        )));
    }
    let mut files = Vec::new();
    for location in locations {
        files.extend(resolve_files(location)?);
    }
    Ok(files)
}

/// Expand a file-or-directory location into concrete files.
///
/// A file resolves to itself. A directory resolves to its non-hidden
/// regular files in name order. Missing paths and empty directories are
/// configuration errors.
pub fn resolve_files(location: &Path) -> Result<Vec<PathBuf>> {
    if location.is_file() {
        return Ok(vec![location.to_path_buf()]);
    }
    if !location.is_dir() {
        return Err(GraphError::config(format!(
            "source path '{}' does not exist",
            location.display()
        )));
    }

    let entries = std::fs::read_dir(location)
        .map_err(|e| GraphError::io_with_source(location, "failed to list directory", e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| GraphError::io_with_source(location, "failed to list directory", e))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path = entry.path();
        if !hidden && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(GraphError::config(format!(
            "source directory '{}' contains no files",
            location.display()
        )));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, "1\n").unwrap();
        path
    }

    fn config_for(dir: &TempDir, symmetry: bool) -> GraphConfig {
        let toml = format!(
            r#"
            [graph]
            symmetry = {symmetry}
            ntype2files = "u:{root}/users,i:{root}/items.txt"
            etype2files = "u2i:{root}/u2i,u2u:{root}/u2u"

            [cluster]
            shard_num = 10
            server_num = 4
            addresses = ["127.0.0.1:8245"]
            "#,
            root = dir.path().display()
        );
        toml.parse().unwrap()
    }

    fn populated_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(&dir, "users/part-1");
        write(&dir, "users/part-0");
        write(&dir, "users/.crc");
        write(&dir, "items.txt");
        write(&dir, "u2i/part-0");
        write(&dir, "u2u/part-0");
        dir
    }

    #[test]
    fn test_inverse_edge_type() {
        assert_eq!(inverse_edge_type("u2i"), "i2u");
        assert_eq!(inverse_edge_type("user2click2item"), "item2click2user");
        assert_eq!(inverse_edge_type("u2u"), "u2u");
        assert_eq!(inverse_edge_type("a2b2c2d"), "d2c2b2a");
        assert_eq!(inverse_edge_type("follows"), "follows");
    }

    #[test]
    fn test_resolve_directory_sorted_without_hidden() {
        let dir = populated_dir();
        let files = resolve_files(&dir.path().join("users")).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("users/part-0"),
                dir.path().join("users/part-1")
            ]
        );
    }

    #[test]
    fn test_resolve_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve_files(&dir.path().join("absent")),
            Err(GraphError::Config { .. })
        ));

        std::fs::create_dir(dir.path().join("empty")).unwrap();
        assert!(matches!(
            resolve_files(&dir.path().join("empty")),
            Err(GraphError::Config { .. })
        ));
    }

    #[test]
    fn test_symmetric_edge_types() {
        let dir = populated_dir();
        let catalog = PartitionCatalog::from_config(&config_for(&dir, true)).unwrap();
        assert_eq!(catalog.edge_types(), vec!["u2i", "i2u", "u2u"]);

        let loads = catalog.edge_loads().unwrap();
        assert_eq!(loads.len(), 4);
        let forward: Vec<_> = loads.iter().filter(|l| !l.is_reverse).collect();
        let reverse: Vec<_> = loads.iter().filter(|l| l.is_reverse).collect();
        assert_eq!(forward.len(), 2);
        assert_eq!(reverse.len(), 2);
        assert_eq!(reverse[0].edge_type, "i2u");
        assert_eq!(reverse[0].paths, forward[0].paths);
        assert_eq!(reverse[1].edge_type, "u2u");
    }

    #[test]
    fn test_asymmetric_edge_types() {
        let dir = populated_dir();
        let catalog = PartitionCatalog::from_config(&config_for(&dir, false)).unwrap();
        assert_eq!(catalog.edge_types(), vec!["u2i", "u2u"]);
        assert!(catalog.edge_loads().unwrap().iter().all(|l| !l.is_reverse));
        assert_eq!(catalog.predecessor_edge_type("u2i"), "u2i");
    }

    #[test]
    fn test_node_loads() {
        let dir = populated_dir();
        let catalog = PartitionCatalog::from_config(&config_for(&dir, false)).unwrap();
        assert_eq!(catalog.node_types(), vec!["u", "i"]);

        let loads = catalog.node_loads().unwrap();
        assert_eq!(loads[0].1.len(), 2);
        assert_eq!(loads[1].1, vec![dir.path().join("items.txt")]);
    }

    #[test]
    fn test_node_loads_report_missing_path() {
        let dir = TempDir::new().unwrap();
        let catalog = PartitionCatalog::from_config(&config_for(&dir, false)).unwrap();
        assert!(catalog.node_loads().is_err());
    }

    #[test]
    fn test_shards_for_server() {
        let dir = populated_dir();
        let catalog = PartitionCatalog::from_config(&config_for(&dir, false)).unwrap();
        assert_eq!(catalog.serving_servers(), vec![0, 1, 2, 3]);
        assert_eq!(catalog.shards_for_server(1).unwrap(), vec![1, 5, 9]);
        assert_eq!(catalog.shards_for_server(3).unwrap(), vec![3, 7]);
        assert!(matches!(
            catalog.shards_for_server(4),
            Err(GraphError::InvalidShard { server_idx: 4, server_num: 4 })
        ));
    }
}
