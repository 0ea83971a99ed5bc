//! In-process ring binary
//!
//! Usage: `ring-local <n> [k] [p0] [seed]`
//!
//! Runs every node as a tokio task and prints the summary as JSON. The seed
//! argument wins over `FIREWORKS_SEED`; `FIREWORKS_NODE0_EXIT` and
//! `FIREWORKS_MONITOR` apply as for `ring-node`.

use anyhow::{bail, Context};
use fireworks_protocol::RingConfig;
use fireworks_ring::{env, run_local};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: ring-local <n> [k] [p0] [seed]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ring_local=info,fireworks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.len() > 4 {
        bail!(USAGE);
    }

    let n: usize = args[0]
        .parse()
        .with_context(|| format!("invalid ring size {:?}", args[0]))?;
    let mut config = RingConfig::new(n);
    if let Some(k) = args.get(1) {
        let k: u64 = k.parse().with_context(|| format!("invalid threshold {k:?}"))?;
        config = config.with_threshold(k);
    }
    if let Some(p0) = args.get(2) {
        let p0: f64 = p0.parse().with_context(|| format!("invalid probability {p0:?}"))?;
        config = config.with_probability(p0);
    }
    config = env::ring_overrides(config)?;
    if let Some(seed) = args.get(3) {
        let seed: u64 = seed.parse().with_context(|| format!("invalid seed {seed:?}"))?;
        config = config.with_seed(seed);
    }

    let outcome = run_local(config).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);

    Ok(())
}
