//! Event loop running one ring node over a link.

use std::time::Instant;

use fireworks_protocol::{FiringSource, NodeId, RingNode, StatsCollector};
use fireworks_transfer::Link;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::ledger::RunLedger;

/// What a node task hands back when it terminates.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub node: NodeId,
    /// Times this node fired.
    pub firings: u64,
    /// Round timings and observed events; node 0 only.
    pub stats: Option<StatsCollector>,
}

/// Run `node` over `link` until it terminates.
///
/// Node 0 originates the first token. Every node then waits for a token,
/// evaluates it, announces a firing on the fan-out and forwards the result.
/// Node 0 additionally folds the notices it drained into its statistics.
pub async fn drive<L, S>(mut node: RingNode<S>, mut link: L, ledger: RunLedger) -> Result<NodeReport>
where
    L: Link,
    S: FiringSource,
{
    let id = node.id();
    let mut stats = id.is_coordinator().then(StatsCollector::new);

    if let Some(token) = node.originate(Instant::now()) {
        info!(node = %id, "Starting ring");
        link.send_token(token).await?;
    }

    while !node.is_terminated() {
        let token = link.recv_token().await?;
        let arrived = Instant::now();

        let notices = link.drain_notices();
        if let Some(stats) = stats.as_mut() {
            for notice in notices {
                stats.observe_notice(notice);
            }
        }

        let outcome = node.on_token(token, arrived);
        trace!(node = %id, received = %token, state = %outcome.state, "Processed");

        if let Some(firing) = outcome.firing {
            link.announce(firing.notice());
            ledger.record_firing(firing);
            if let Some(stats) = stats.as_mut() {
                stats.record_firing(&firing);
            }
        }
        if let (Some(stats), Some(duration)) = (stats.as_mut(), outcome.round_duration) {
            stats.record_round(duration);
        }
        if outcome.stop_issued {
            if let Some(next) = outcome.forward {
                if !ledger.raise_stop(next.round_id) {
                    warn!(node = %id, round = next.round_id, "Stop raised twice in one run");
                }
            }
        }

        let Some(next) = outcome.forward else {
            continue;
        };
        if next.stop {
            ledger.record_stop_forward(id);
        }
        match link.send_token(next).await {
            Ok(()) => {}
            // The successor may already have left once it saw its own stop.
            Err(e) if next.stop => {
                debug!(node = %id, error = %e, "Stop token not delivered, successor gone")
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(node = %id, firings = node.firings(), "Node terminated");
    Ok(NodeReport {
        node: id,
        firings: node.firings(),
        stats,
    })
}
