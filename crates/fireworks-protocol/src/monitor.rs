//! Soft consistency auditing.
//!
//! Each node may carry a [`ConsistencyMonitor`] that checks two invariants
//! on every token it processes:
//!
//! - the incoming round id is strictly greater than the last one seen here;
//! - the node's own probability never increases across an evaluation.
//!
//! A violation bumps a counter shared by the whole run and is logged. It
//! never stops the node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::token::NodeId;

/// Absolute tolerance for the probability check.
pub const PROBABILITY_TOLERANCE: f64 = 1e-12;

/// Run-wide inconsistency counter. Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct InconsistencyCounter(Arc<AtomicU64>);

impl InconsistencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A detected inconsistency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Violation {
    /// A token arrived with a round id not above the last one seen.
    RoundRegression { last: u64, incoming: u64 },
    /// The node's probability grew during an evaluation.
    ProbabilityIncrease { before: f64, after: f64 },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRegression { last, incoming } => {
                write!(f, "round {} arrived after round {}", incoming, last)
            }
            Self::ProbabilityIncrease { before, after } => {
                write!(f, "probability rose from {} to {}", before, after)
            }
        }
    }
}

/// Per-node auditor.
#[derive(Debug, Clone)]
pub struct ConsistencyMonitor {
    node: NodeId,
    last_round: Option<u64>,
    counter: InconsistencyCounter,
}

impl ConsistencyMonitor {
    pub fn new(node: NodeId, counter: InconsistencyCounter) -> Self {
        Self {
            node,
            last_round: None,
            counter,
        }
    }

    /// Check an incoming round id and remember it.
    pub fn check_round(&mut self, incoming: u64) -> Option<Violation> {
        let violation = match self.last_round {
            Some(last) if incoming <= last => Some(Violation::RoundRegression { last, incoming }),
            _ => None,
        };
        self.last_round = Some(incoming);
        self.record(violation)
    }

    /// Check the node's probability across one evaluation.
    pub fn check_probability(&self, before: f64, after: f64) -> Option<Violation> {
        let violation = (after > before + PROBABILITY_TOLERANCE)
            .then_some(Violation::ProbabilityIncrease { before, after });
        self.record(violation)
    }

    /// Last round id this node has seen.
    pub fn last_round(&self) -> Option<u64> {
        self.last_round
    }

    pub fn counter(&self) -> &InconsistencyCounter {
        &self.counter
    }

    fn record(&self, violation: Option<Violation>) -> Option<Violation> {
        if let Some(v) = violation {
            self.counter.increment();
            warn!(node = %self.node, violation = %v, "Consistency violation");
        }
        violation
    }
}
