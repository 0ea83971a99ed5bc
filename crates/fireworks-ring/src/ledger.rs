//! The one piece of state shared by all nodes of an in-process run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fireworks_protocol::{Firing, NodeId};

#[derive(Debug, Default)]
struct LedgerState {
    stop_round: Option<u64>,
    firings: Vec<Firing>,
    stop_forwards: Vec<NodeId>,
}

/// Run-wide record of firings and stop handling.
///
/// Owned by the run and handed to each node task as a clone; every clone
/// shares the same state behind a single mutex.
#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    inner: Arc<Mutex<LedgerState>>,
}

/// Point-in-time copy of a [`RunLedger`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerSnapshot {
    /// Round id of the stop token, once raised.
    pub stop_round: Option<u64>,
    /// Firings in the order they were recorded.
    pub firings: Vec<Firing>,
    /// Nodes that forwarded a stop token, in order.
    pub stop_forwards: Vec<NodeId>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_firing(&self, firing: Firing) {
        self.lock().firings.push(firing);
    }

    /// Mark the stop as raised on the token with `round_id`.
    ///
    /// Returns `false` if a stop was already raised; the first one is kept.
    pub fn raise_stop(&self, round_id: u64) -> bool {
        let mut state = self.lock();
        if state.stop_round.is_some() {
            return false;
        }
        state.stop_round = Some(round_id);
        true
    }

    pub fn record_stop_forward(&self, node: NodeId) {
        self.lock().stop_forwards.push(node);
    }

    /// Authoritative count of firings so far.
    pub fn events_fired(&self) -> u64 {
        self.lock().firings.len() as u64
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock();
        LedgerSnapshot {
            stop_round: state.stop_round,
            firings: state.firings.clone(),
            stop_forwards: state.stop_forwards.clone(),
        }
    }

    // Every update is a single push or assignment, so a poisoned lock still
    // guards consistent state.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let ledger = RunLedger::new();
        let other = ledger.clone();
        other.record_firing(Firing {
            node: NodeId::new(1),
            round_id: 0,
            probability_after: 0.5,
        });
        other.record_stop_forward(NodeId::new(3));
        assert_eq!(ledger.events_fired(), 1);
        assert_eq!(ledger.snapshot().stop_forwards, vec![NodeId::new(3)]);
    }

    #[test]
    fn test_stop_raised_once() {
        let ledger = RunLedger::new();
        assert_eq!(ledger.snapshot().stop_round, None);
        assert!(ledger.raise_stop(8));
        assert!(!ledger.raise_stop(12));
        assert_eq!(ledger.snapshot().stop_round, Some(8));
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let ledger = RunLedger::new();
        let tasks: Vec<_> = (0..8u64)
            .map(|id| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    for round in 0..100 {
                        ledger.record_firing(Firing {
                            node: NodeId::new(id),
                            round_id: round,
                            probability_after: 0.5,
                        });
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(ledger.events_fired(), 800);
    }
}
