//! Networked ring node binary
//!
//! Usage: `ring-node <id> <n> <k> <p0> <base_port>`
//!
//! Node 0 prints the run summary as JSON on stdout. Logs go to stderr.
//! `FIREWORKS_SEED`, `FIREWORKS_NODE0_EXIT` (`await-return` | `immediate`),
//! `FIREWORKS_MONITOR`, `FIREWORKS_HOST` and `FIREWORKS_FANOUT_GROUP`
//! override the defaults.

use anyhow::{bail, Context};
use fireworks_protocol::{NodeId, RingConfig};
use fireworks_ring::{env, run_network_node, NetworkConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: ring-node <id> <n> <k> <p0> <base_port>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ring_node=info,fireworks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [id, n, k, p0, base_port] = args.as_slice() else {
        bail!(USAGE);
    };

    let id: u64 = id.parse().with_context(|| format!("invalid node id {id:?}"))?;
    let n: usize = n.parse().with_context(|| format!("invalid ring size {n:?}"))?;
    let k: u64 = k.parse().with_context(|| format!("invalid threshold {k:?}"))?;
    let p0: f64 = p0.parse().with_context(|| format!("invalid probability {p0:?}"))?;
    let base_port: u16 = base_port
        .parse()
        .with_context(|| format!("invalid base port {base_port:?}"))?;

    let config = env::ring_overrides(RingConfig::new(n).with_threshold(k).with_probability(p0))?;
    let net = NetworkConfig::from_env()?.with_base_port(base_port);

    tracing::info!(node = id, ring_size = n, exit = %config.node0_exit, "Starting ring node");

    if let Some(summary) = run_network_node(NodeId::new(id), config, net).await? {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
