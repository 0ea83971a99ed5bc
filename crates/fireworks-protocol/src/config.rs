//! Run configuration for a fireworks ring.

use crate::error::{Error, Result};
use crate::token::NodeId;

/// What node 0 does after forwarding the stop token it issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Node0Exit {
    /// Keep waiting until the stop token has travelled the whole ring, then
    /// absorb it without forwarding a second copy.
    #[default]
    AwaitReturn,
    /// Terminate right after forwarding the stop token.
    Immediate,
}

impl std::fmt::Display for Node0Exit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitReturn => write!(f, "await-return"),
            Self::Immediate => write!(f, "immediate"),
        }
    }
}

impl std::str::FromStr for Node0Exit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "await-return" => Ok(Self::AwaitReturn),
            "immediate" => Ok(Self::Immediate),
            other => Err(Error::UnknownExitMode(other.to_string())),
        }
    }
}

/// Parameters shared by every node of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RingConfig {
    /// Number of nodes in the ring (n >= 2).
    pub ring_size: usize,

    /// Firing probability every node starts with (0 < p0 <= 1).
    pub initial_probability: f64,

    /// Node 0 issues stop once the incoming silent count reaches this (K >= 1).
    pub silence_threshold: u64,

    /// Run seed mixed with each node id to seed the node's random source.
    pub seed: u64,

    /// Exit ordering of node 0 after it issues stop.
    pub node0_exit: Node0Exit,

    /// Whether every node audits round and probability monotonicity.
    pub monitor_consistency: bool,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_size: 4,
            initial_probability: 1.0,
            silence_threshold: 5,
            seed: 0,
            node0_exit: Node0Exit::default(),
            monitor_consistency: true,
        }
    }
}

impl RingConfig {
    /// Create a config for a ring of `ring_size` nodes with default parameters.
    #[must_use]
    pub fn new(ring_size: usize) -> Self {
        Self {
            ring_size,
            ..Default::default()
        }
    }

    /// Set the initial firing probability.
    #[must_use]
    pub fn with_probability(mut self, p0: f64) -> Self {
        self.initial_probability = p0;
        self
    }

    /// Set the silence threshold K.
    #[must_use]
    pub fn with_threshold(mut self, k: u64) -> Self {
        self.silence_threshold = k;
        self
    }

    /// Set the run seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set node 0's exit ordering.
    #[must_use]
    pub fn with_node0_exit(mut self, exit: Node0Exit) -> Self {
        self.node0_exit = exit;
        self
    }

    /// Enable or disable consistency monitoring.
    #[must_use]
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor_consistency = enabled;
        self
    }

    /// Check every parameter. Called before any node starts.
    pub fn validate(&self) -> Result<()> {
        if self.ring_size < 2 {
            return Err(Error::InvalidRingSize(self.ring_size));
        }
        let p0 = self.initial_probability;
        if !p0.is_finite() || p0 <= 0.0 || p0 > 1.0 {
            return Err(Error::InvalidProbability(p0));
        }
        if self.silence_threshold < 1 {
            return Err(Error::InvalidThreshold(self.silence_threshold));
        }
        Ok(())
    }

    /// Validate that `id` names a node of this ring.
    pub fn check_node(&self, id: NodeId) -> Result<()> {
        if id.raw() >= self.ring_size as u64 {
            return Err(Error::NodeOutOfRange {
                id: id.raw(),
                ring_size: self.ring_size,
            });
        }
        Ok(())
    }

    /// The node after `id` in the ring.
    ///
    /// # Panics
    ///
    /// Panics on an empty ring; call after [`validate`](Self::validate).
    pub fn successor(&self, id: NodeId) -> NodeId {
        debug_assert!(self.ring_size > 0, "successor of an empty ring");
        NodeId::new((id.raw() + 1) % self.ring_size as u64)
    }

    /// All node ids in ring order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.ring_size as u64).map(NodeId::new)
    }

    /// Seed for the random source of node `id` (splitmix64 over seed and id).
    pub fn node_seed(&self, id: NodeId) -> u64 {
        let mut z = self.seed ^ id.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
