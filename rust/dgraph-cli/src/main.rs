//! Distributed Graph Client CLI
//!
//! Loads a graph into an in-process engine laid out like a real deployment
//! and runs one client operation against it.
//!
//! # Usage
//!
//! ```bash
//! # Stream every user node in shuffled batches of 128
//! dgraph --config graph.toml iterate --node-type u --batch-size 128
//!
//! # Rank 1 of 4, no shuffling
//! dgraph --config graph.toml iterate --node-type u --batch-size 128 --rank 1 --nrank 4 --no-shuffle
//!
//! # Sample up to 10 neighbors of two nodes
//! dgraph --config graph.toml sample --edge-type u2i --max-degree 10 1 2
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use distgraph_core::{
    DistGraphClient, DistGraphServer, GraphConfig, LocalGraphEngine, NodeId, RemoteGraphEngine,
};

/// Distributed Graph Client
#[derive(Parser, Debug)]
#[command(name = "dgraph")]
#[command(about = "Run client operations against a partitioned graph")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: String,

    /// Client id used when provisioning
    #[arg(long, default_value = "0")]
    client_id: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print node batches for one rank
    Iterate {
        #[arg(long)]
        node_type: String,
        #[arg(long, default_value = "256")]
        batch_size: usize,
        #[arg(long, default_value = "0")]
        rank: u32,
        #[arg(long, default_value = "1")]
        nrank: u32,
        /// Keep each server's storage order
        #[arg(long)]
        no_shuffle: bool,
    },
    /// Print sampled successors (or predecessors) of the given nodes
    Sample {
        #[arg(long)]
        edge_type: String,
        #[arg(long, default_value = "10")]
        max_degree: usize,
        /// Walk edges backwards
        #[arg(long)]
        predecessor: bool,
        nodes: Vec<NodeId>,
    },
    /// Print decoded feature values of the given nodes
    Features {
        #[arg(long)]
        node_type: String,
        /// Feature name; repeat for several
        #[arg(long = "name", required = true)]
        names: Vec<String>,
        nodes: Vec<NodeId>,
    },
    /// Print nodes drawn at random from one server
    RandomNodes {
        #[arg(long)]
        node_type: String,
        #[arg(long, default_value = "10")]
        count: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = GraphConfig::from_file(&args.config)?.with_env_overrides();
    config.validate()?;

    let engine: Arc<dyn RemoteGraphEngine> = Arc::new(LocalGraphEngine::from_config(&config)?);

    let addresses = config.cluster.address_source()?.resolve()?;
    let server_count = (config.cluster.server_num as usize).min(addresses.len()) as u32;
    let servers = (0..server_count)
        .map(|server_id| DistGraphServer::new(&config, Arc::clone(&engine), server_id))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!("Started {} server instance(s)", servers.len());

    let client = DistGraphClient::new(&config, Arc::clone(&engine), args.client_id)?;
    client.load_node_types()?;
    client.load_edges()?;

    match args.command {
        Command::Iterate {
            node_type,
            batch_size,
            rank,
            nrank,
            no_shuffle,
        } => {
            let mut batches = 0usize;
            let mut nodes = 0usize;
            for batch in client.node_batch_iter(batch_size, &node_type, !no_shuffle, rank, nrank)? {
                let batch = batch?;
                batches += 1;
                nodes += batch.len();
                println!("{}", join(&batch));
            }
            tracing::info!("Emitted {} nodes in {} batches", nodes, batches);
        }
        Command::Sample {
            edge_type,
            max_degree,
            predecessor,
            nodes,
        } => {
            let neighbors = if predecessor {
                client.sample_predecessor(&nodes, max_degree, &edge_type)?
            } else {
                client.sample_successor(&nodes, max_degree, &edge_type)?
            };
            for (node, neighbors) in nodes.iter().zip(neighbors) {
                println!("{}\t{}", node, join(&neighbors));
            }
        }
        Command::Features {
            node_type,
            names,
            nodes,
        } => {
            let values = client.node_feat_many(&nodes, &node_type, &names)?;
            for (name, values) in names.iter().zip(values) {
                for (node, value) in nodes.iter().zip(values) {
                    println!("{}\t{}\t{:?}", node, name, value);
                }
            }
        }
        Command::RandomNodes { node_type, count } => {
            println!("{}", join(&client.random_sample_nodes(&node_type, count)?));
        }
    }

    client.stop_server()?;
    Ok(())
}

fn join(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
