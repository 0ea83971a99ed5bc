//! Termination coordinator - the role node 0 plays in the ring.
//!
//! Node 0 is the only node allowed to set the stop flag. It does so once,
//! the first time a token arrives whose silent count has reached the
//! configured threshold K. It also timestamps every round completion so the
//! stats collector can derive round durations.

use std::time::{Duration, Instant};

use tracing::info;

/// Stop decision and round timing held by node 0.
#[derive(Debug, Clone)]
pub struct TerminationCoordinator {
    /// Silence threshold K.
    threshold: u64,

    /// Latched once stop has been issued.
    stop_issued: bool,

    /// Instant of the previous round completion (or of origination).
    last_completion: Option<Instant>,
}

impl TerminationCoordinator {
    /// Create a coordinator for silence threshold `threshold`.
    #[must_use]
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            stop_issued: false,
            last_completion: None,
        }
    }

    /// The silence threshold K.
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Whether stop has already been issued this run.
    #[must_use]
    pub const fn stop_issued(&self) -> bool {
        self.stop_issued
    }

    /// Record the instant the first token left node 0.
    pub fn mark_origin(&mut self, at: Instant) {
        self.last_completion = Some(at);
    }

    /// Record that the token is back at node 0.
    ///
    /// Returns the time since the previous completion, or `None` if the
    /// origin was never marked.
    pub fn complete_round(&mut self, at: Instant) -> Option<Duration> {
        let elapsed = self
            .last_completion
            .map(|previous| at.saturating_duration_since(previous));
        self.last_completion = Some(at);
        elapsed
    }

    /// Decide the stop flag for the token node 0 is about to forward.
    ///
    /// `true` iff the incoming silent count reached the threshold and no
    /// stop was issued before. Returns `true` at most once.
    pub fn decide_stop(&mut self, incoming_silent: u64) -> bool {
        if self.stop_issued || incoming_silent < self.threshold {
            return false;
        }
        self.stop_issued = true;
        info!(
            silent = incoming_silent,
            threshold = self.threshold,
            "Silence threshold reached, issuing stop"
        );
        true
    }
}
