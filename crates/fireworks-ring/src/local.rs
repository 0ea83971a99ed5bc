//! One tokio task per node inside a single process.

use fireworks_protocol::{Firing, InconsistencyCounter, NodeId, RingConfig, RingNode, RunSummary};
use fireworks_transfer::{ChannelLink, DEFAULT_NOTICE_CAPACITY};
use tracing::info;

use crate::driver::drive;
use crate::error::Result;
use crate::ledger::RunLedger;

/// Everything an in-process run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Every firing in the ring, by round.
    pub firings: Vec<Firing>,
    /// Round id carried by the stop token.
    pub stop_round: Option<u64>,
    /// Nodes that forwarded a stop token, in forwarding order.
    pub stop_forwards: Vec<NodeId>,
}

/// Run a ring of `config.ring_size` tasks to termination.
///
/// The event count in the summary is the ledger's exact tally rather than
/// what node 0 heard on the fan-out.
pub async fn run_local(config: RingConfig) -> Result<RunOutcome> {
    config.validate()?;

    let counter = InconsistencyCounter::new();
    let ledger = RunLedger::new();
    let nodes = config
        .node_ids()
        .map(|id| RingNode::new(id, &config, &counter))
        .collect::<fireworks_protocol::Result<Vec<_>>>()?;
    let links = ChannelLink::ring(config.ring_size, DEFAULT_NOTICE_CAPACITY);

    info!(
        ring_size = config.ring_size,
        threshold = config.silence_threshold,
        p0 = config.initial_probability,
        seed = config.seed,
        exit = %config.node0_exit,
        "Starting in-process ring"
    );

    let handles: Vec<_> = nodes
        .into_iter()
        .zip(links)
        .map(|(node, link)| tokio::spawn(drive(node, link, ledger.clone())))
        .collect();

    let mut stats = None;
    for handle in handles {
        let report = handle.await??;
        if report.node.is_coordinator() {
            stats = report.stats;
        }
    }

    let mut stats = stats.unwrap_or_default();
    stats.set_events_fired(ledger.events_fired());
    let snapshot = ledger.snapshot();
    let summary = stats.summarize(config.ring_size, counter.get());

    let mut firings = snapshot.firings;
    firings.sort_by_key(|f| f.round_id);

    info!(
        rounds = summary.rounds_completed,
        events = summary.events_fired,
        inconsistencies = summary.inconsistency_count,
        "In-process ring terminated"
    );

    Ok(RunOutcome {
        summary,
        firings,
        stop_round: snapshot.stop_round,
        stop_forwards: snapshot.stop_forwards,
    })
}
