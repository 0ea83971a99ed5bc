//! Deterministic single-threaded ring execution.
//!
//! Passes the token from node to node in a plain loop, with a virtual clock
//! advancing one microsecond per hop. Useful as a reference execution for
//! the concurrent runtimes and for property tests of the protocol.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::RingConfig;
use crate::error::Result;
use crate::monitor::InconsistencyCounter;
use crate::node::{FiringSource, RingNode};
use crate::stats::{RunSummary, StatsCollector};
use crate::token::{Firing, NodeId, Token};

/// Virtual time spent on one hop.
pub const HOP_TICK: Duration = Duration::from_micros(1);

/// One delivery of the token to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub node: NodeId,
    pub received: Token,
    pub forwarded: Option<Token>,
}

/// Everything a simulated run produced.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub hops: Vec<Hop>,
    /// Firings in ring order.
    pub firings: Vec<Firing>,
    /// Round id carried by the stop token node 0 issued.
    pub stop_round: Option<u64>,
    /// Every node that issued stop, in order (at most node 0, once).
    pub stop_issuers: Vec<NodeId>,
    /// Every node that forwarded a stop-flagged token, in order.
    pub stop_forwarders: Vec<NodeId>,
    pub summary: RunSummary,
}

/// A ring whose nodes are stepped sequentially in one thread.
pub struct RingSimulation<S = ChaCha8Rng> {
    config: RingConfig,
    nodes: Vec<RingNode<S>>,
    counter: InconsistencyCounter,
}

impl RingSimulation<ChaCha8Rng> {
    /// Build a ring of seeded nodes from `config`.
    pub fn new(config: RingConfig) -> Result<Self> {
        config.validate()?;
        let counter = InconsistencyCounter::new();
        let nodes = config
            .node_ids()
            .map(|id| RingNode::new(id, &config, &counter))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            nodes,
            counter,
        })
    }
}

impl<S: FiringSource> RingSimulation<S> {
    /// Build a ring from prepared nodes, one per id in ring order.
    pub fn from_nodes(
        config: RingConfig,
        nodes: Vec<RingNode<S>>,
        counter: InconsistencyCounter,
    ) -> Result<Self> {
        config.validate()?;
        if nodes.len() != config.ring_size {
            return Err(crate::Error::InvalidRingSize(nodes.len()));
        }
        for (index, node) in nodes.iter().enumerate() {
            if node.id().raw() != index as u64 {
                return Err(crate::Error::NodeOutOfRange {
                    id: node.id().raw(),
                    ring_size: config.ring_size,
                });
            }
        }
        Ok(Self {
            config,
            nodes,
            counter,
        })
    }

    pub fn nodes(&self) -> &[RingNode<S>] {
        &self.nodes
    }

    /// Run until the stop token has drained out of the ring.
    pub fn run(&mut self) -> SimulationReport {
        let base = Instant::now();
        let mut clock = base;
        let mut stats = StatsCollector::new();
        let mut hops = Vec::new();
        let mut firings = Vec::new();
        let mut stop_round = None;
        let mut stop_issuers = Vec::new();
        let mut stop_forwarders = Vec::new();

        let origin = NodeId::COORDINATOR;
        let mut in_flight = VecDeque::new();
        if let Some(token) = self.nodes[0].originate(clock) {
            in_flight.push_back((self.config.successor(origin), token));
        }

        while let Some((dest, token)) = in_flight.pop_front() {
            clock += HOP_TICK;
            let index = dest.raw() as usize;
            let outcome = self.nodes[index].on_token(token, clock);

            if let Some(duration) = outcome.round_duration {
                stats.record_round(duration);
            }
            if let Some(firing) = outcome.firing {
                stats.record_firing(&firing);
                firings.push(firing);
            }
            if outcome.stop_issued {
                stop_issuers.push(dest);
                stop_round = outcome.forward.map(|t| t.round_id);
            }
            if outcome.forwards_stop() {
                stop_forwarders.push(dest);
            }
            if let Some(next) = outcome.forward {
                in_flight.push_back((self.config.successor(dest), next));
            }

            hops.push(Hop {
                node: dest,
                received: token,
                forwarded: outcome.forward,
            });
        }

        let summary = stats.summarize(self.config.ring_size, self.counter.get());
        info!(
            ring_size = self.config.ring_size,
            hops = hops.len(),
            events = summary.events_fired,
            "Simulated ring terminated"
        );

        SimulationReport {
            hops,
            firings,
            stop_round,
            stop_issuers,
            stop_forwarders,
            summary,
        }
    }
}
