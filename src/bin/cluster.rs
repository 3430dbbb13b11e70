//! Run a small replica network in one process.
//!
//! Nodes join one after another over an in-process registry, trade random
//! orders for a while, then leave. Resting counts and book hashes are
//! printed at the end; equal hashes mean the replicas converged.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use peer_lob::{LocalGrape, Node, NodeConfig};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "cluster", about = "Run replica nodes on an in-process network")]
struct Args {
    /// Number of nodes to start
    #[arg(short, long, default_value_t = 3)]
    nodes: u16,

    /// Seconds to trade before shutting down (Ctrl-C stops early)
    #[arg(short, long, default_value_t = 60)]
    duration: u64,

    /// TOML config shared by every node
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Discovery rounds before a new advertisement becomes visible
    #[arg(long, default_value_t = 0)]
    visibility_delay: u32,

    /// Port of the first node; the rest count up from it
    #[arg(long, default_value_t = 1024)]
    base_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,peer_lob=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let base = match &args.config {
        Some(path) => NodeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };

    let grape = LocalGrape::with_visibility_delay(args.visibility_delay);
    let mut nodes: Vec<Node> = Vec::with_capacity(args.nodes as usize);

    for i in 0..args.nodes {
        let mut config = base.clone();
        config.network.port = Some(args.base_port.saturating_add(i));
        let node = grape.join(config.node_id(), config);
        node.start()
            .await
            .with_context(|| format!("bootstrapping {}", node.id()))?;
        tracing::info!(node = %node.id(), joined = i + 1, total = args.nodes, "Node joined");
        nodes.push(node);
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {}
        result = tokio::signal::ctrl_c() => result.context("waiting for Ctrl-C")?,
    }

    for node in &nodes {
        if let Err(e) = node.shutdown().await {
            tracing::warn!(node = %node.id(), error = %e, "Unclean shutdown");
        }
    }

    println!("\n=== Replica Summary ===");
    for node in &nodes {
        println!(
            "{:>21}  resting {:>5}  hash {:016x}",
            node.id().as_str(),
            node.resting_count(),
            node.state_hash()
        );
    }

    Ok(())
}
