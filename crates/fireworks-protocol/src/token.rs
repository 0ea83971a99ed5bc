//! The circulating token and the small records that travel with it.

use serde::{Deserialize, Serialize};

/// Position of a node in the ring (`0..n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The node that originates the token and decides termination.
    pub const COORDINATOR: NodeId = NodeId(0);

    #[inline]
    pub const fn new(id: u64) -> Self {
        NodeId(id)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_coordinator(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// The single unit of circulating state.
///
/// Exactly one token is alive in the ring until node 0 sets `stop`; it is
/// rewritten at every hop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Hop counter, +1 on every forward.
    pub round_id: u64,
    /// Consecutive hops without a firing anywhere in the ring.
    pub silent_count: u64,
    /// The forwarding node's firing probability at forwarding time.
    pub probability: f64,
    /// One-shot termination flag, only ever set by node 0.
    pub stop: bool,
}

impl Token {
    /// The token node 0 originates at the start of a run.
    pub fn genesis(initial_probability: f64) -> Self {
        Self {
            round_id: 0,
            silent_count: 0,
            probability: initial_probability,
            stop: false,
        }
    }

    /// Whether this is a stop token.
    pub fn is_stop(&self) -> bool {
        self.stop
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "token(round={}, silent={}, p={:.6}{})",
            self.round_id,
            self.silent_count,
            self.probability,
            if self.stop { ", STOP" } else { "" }
        )
    }
}

/// Best-effort fan-out payload announcing a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventNotice {
    pub origin: NodeId,
    pub round_id: u64,
}

/// One firing as observed by the node that fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Firing {
    pub node: NodeId,
    pub round_id: u64,
    /// The node's probability after halving.
    pub probability_after: f64,
}

impl Firing {
    /// The fan-out notice for this firing.
    pub fn notice(&self) -> EventNotice {
        EventNotice {
            origin: self.node,
            round_id: self.round_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_token() {
        let t = Token::genesis(0.75);
        assert_eq!(t.round_id, 0);
        assert_eq!(t.silent_count, 0);
        assert_eq!(t.probability, 0.75);
        assert!(!t.is_stop());
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(3).to_string(), "N3");
        assert!(NodeId::COORDINATOR.is_coordinator());
        assert!(!NodeId::new(1).is_coordinator());
    }

    #[test]
    fn test_firing_notice() {
        let firing = Firing {
            node: NodeId::new(2),
            round_id: 9,
            probability_after: 0.25,
        };
        assert_eq!(
            firing.notice(),
            EventNotice {
                origin: NodeId::new(2),
                round_id: 9
            }
        );
    }
}
