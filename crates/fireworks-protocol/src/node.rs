//! Ring node state machine.
//!
//! A [`RingNode`] is pure protocol logic: it is handed a token and returns
//! what to do with it. Moving tokens between nodes is the job of a link
//! (UDP or in-process channels) driven by the runtime, or of the
//! single-threaded [`RingSimulation`](crate::RingSimulation).
//!
//! # States
//!
//! ```text
//!            token            sample drawn          token built
//! WaitingToken ──► Evaluating ──────────► Forwarding ──────────► WaitingToken
//!      │
//!      │ stop token: forward unchanged once
//!      ▼
//!  Terminated
//! ```
//!
//! Node 0 also originates the very first token and decides the stop flag
//! through its [`TerminationCoordinator`].

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::config::{Node0Exit, RingConfig};
use crate::coordinator::TerminationCoordinator;
use crate::error::Result;
use crate::monitor::{ConsistencyMonitor, InconsistencyCounter};
use crate::token::{Firing, NodeId, Token};

/// Source of uniform samples in `[0, 1)` driving the firing decision.
pub trait FiringSource: Send {
    fn sample(&mut self) -> f64;
}

impl FiringSource for ChaCha8Rng {
    fn sample(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Protocol state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    WaitingToken,
    Evaluating,
    Forwarding,
    Terminated,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingToken => write!(f, "WaitingToken"),
            Self::Evaluating => write!(f, "Evaluating"),
            Self::Forwarding => write!(f, "Forwarding"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// What processing one token produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Token to send to the successor, if any.
    pub forward: Option<Token>,
    /// This node fired while evaluating.
    pub firing: Option<Firing>,
    /// Node 0 set the stop flag on `forward`.
    pub stop_issued: bool,
    /// Node 0 only: time since the previous round completion.
    pub round_duration: Option<Duration>,
    /// State after processing.
    pub state: NodeState,
}

impl Outcome {
    fn idle(state: NodeState) -> Self {
        Self {
            forward: None,
            firing: None,
            stop_issued: false,
            round_duration: None,
            state,
        }
    }

    /// Whether this outcome forwards a stop token.
    pub fn forwards_stop(&self) -> bool {
        self.forward.is_some_and(|t| t.stop)
    }
}

/// One node of the ring.
#[derive(Debug)]
pub struct RingNode<S = ChaCha8Rng> {
    id: NodeId,
    state: NodeState,
    source: S,
    local_probability: f64,
    local_silent_streak: u64,
    firings: u64,
    node0_exit: Node0Exit,
    coordinator: Option<TerminationCoordinator>,
    monitor: Option<ConsistencyMonitor>,
}

impl RingNode<ChaCha8Rng> {
    /// Create node `id` with its deterministic random source.
    pub fn new(id: NodeId, config: &RingConfig, counter: &InconsistencyCounter) -> Result<Self> {
        let source = ChaCha8Rng::seed_from_u64(config.node_seed(id));
        Self::with_source(id, config, source, counter)
    }
}

impl<S: FiringSource> RingNode<S> {
    /// Create node `id` drawing its samples from `source`.
    pub fn with_source(
        id: NodeId,
        config: &RingConfig,
        source: S,
        counter: &InconsistencyCounter,
    ) -> Result<Self> {
        config.validate()?;
        config.check_node(id)?;

        let coordinator = id
            .is_coordinator()
            .then(|| TerminationCoordinator::new(config.silence_threshold));
        let monitor = config
            .monitor_consistency
            .then(|| ConsistencyMonitor::new(id, counter.clone()));

        Ok(Self {
            id,
            state: NodeState::WaitingToken,
            source,
            local_probability: config.initial_probability,
            local_silent_streak: 0,
            firings: 0,
            node0_exit: config.node0_exit,
            coordinator,
            monitor,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == NodeState::Terminated
    }

    /// Current firing probability of this node.
    pub fn local_probability(&self) -> f64 {
        self.local_probability
    }

    /// Consecutive evaluations at this node without a firing.
    pub fn local_silent_streak(&self) -> u64 {
        self.local_silent_streak
    }

    /// Number of times this node fired.
    pub fn firings(&self) -> u64 {
        self.firings
    }

    /// The coordinator role, present on node 0 only.
    pub fn coordinator(&self) -> Option<&TerminationCoordinator> {
        self.coordinator.as_ref()
    }

    /// Produce the first token of the run. Only node 0 originates; every
    /// other node returns `None`.
    pub fn originate(&mut self, at: Instant) -> Option<Token> {
        let coordinator = self.coordinator.as_mut()?;
        coordinator.mark_origin(at);
        let token = Token::genesis(self.local_probability);
        debug!(node = %self.id, %token, "Originating token");
        Some(token)
    }

    /// Process one incoming token.
    ///
    /// `at` is the instant the token arrived; node 0 uses it to time rounds.
    pub fn on_token(&mut self, token: Token, at: Instant) -> Outcome {
        if self.state == NodeState::Terminated {
            debug!(node = %self.id, %token, "Token arrived after termination, ignoring");
            return Outcome::idle(self.state);
        }

        if let Some(monitor) = self.monitor.as_mut() {
            monitor.check_round(token.round_id);
        }

        if token.stop {
            return self.on_stop(token);
        }

        // EVALUATING
        self.state = NodeState::Evaluating;
        let round_duration = self
            .coordinator
            .as_mut()
            .and_then(|c| c.complete_round(at));

        let before = self.local_probability;
        let sample = self.source.sample();
        let firing = if sample < self.local_probability {
            self.local_probability /= 2.0;
            self.local_silent_streak = 0;
            self.firings += 1;
            let firing = Firing {
                node: self.id,
                round_id: token.round_id,
                probability_after: self.local_probability,
            };
            debug!(
                node = %self.id,
                round = token.round_id,
                p = self.local_probability,
                "Fired"
            );
            Some(firing)
        } else {
            self.local_silent_streak += 1;
            None
        };

        if let Some(monitor) = self.monitor.as_ref() {
            monitor.check_probability(before, self.local_probability);
        }

        let silent_count = if firing.is_some() {
            0
        } else {
            token.silent_count.saturating_add(1)
        };
        let stop = match self.coordinator.as_mut() {
            Some(c) => c.decide_stop(token.silent_count),
            None => token.stop,
        };

        // FORWARDING
        self.state = NodeState::Forwarding;
        let next = Token {
            round_id: token.round_id + 1,
            silent_count,
            probability: self.local_probability,
            stop,
        };
        trace!(node = %self.id, incoming = %token, outgoing = %next, "Forwarding");

        self.state = if stop && self.node0_exit == Node0Exit::Immediate {
            NodeState::Terminated
        } else {
            NodeState::WaitingToken
        };

        Outcome {
            forward: Some(next),
            firing,
            stop_issued: stop,
            round_duration,
            state: self.state,
        }
    }

    fn on_stop(&mut self, token: Token) -> Outcome {
        self.state = NodeState::Terminated;

        // Node 0 waiting for its own stop token: absorb it, it was already
        // forwarded once.
        if self.coordinator.as_ref().is_some_and(|c| c.stop_issued()) {
            debug!(node = %self.id, %token, "Stop token returned, terminating");
            return Outcome::idle(self.state);
        }

        debug!(node = %self.id, %token, "Relaying stop token and terminating");
        Outcome {
            forward: Some(token),
            firing: None,
            stop_issued: false,
            round_duration: None,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Replays a fixed list of samples, then repeats the last one.
    struct Scripted(VecDeque<f64>, f64);

    impl Scripted {
        fn new(samples: &[f64]) -> Self {
            let last = samples.last().copied().unwrap_or(0.999);
            Self(samples.iter().copied().collect(), last)
        }
    }

    impl FiringSource for Scripted {
        fn sample(&mut self) -> f64 {
            self.0.pop_front().unwrap_or(self.1)
        }
    }

    fn token(round_id: u64, silent_count: u64) -> Token {
        Token {
            round_id,
            silent_count,
            probability: 1.0,
            stop: false,
        }
    }

    fn node(id: u64, config: &RingConfig, samples: &[f64]) -> RingNode<Scripted> {
        RingNode::with_source(
            NodeId::new(id),
            config,
            Scripted::new(samples),
            &InconsistencyCounter::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_id() {
        let config = RingConfig::new(3);
        let err = RingNode::new(NodeId::new(3), &config, &InconsistencyCounter::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_only_node0_originates() {
        let config = RingConfig::new(3).with_probability(0.8);
        let now = Instant::now();
        assert_eq!(node(0, &config, &[]).originate(now), Some(Token::genesis(0.8)));
        assert_eq!(node(1, &config, &[]).originate(now), None);
    }

    #[test]
    fn test_firing_halves_probability_and_resets_silence() {
        let config = RingConfig::new(3).with_probability(1.0);
        let mut n = node(1, &config, &[0.0]);
        let out = n.on_token(token(4, 6), Instant::now());

        let fwd = out.forward.unwrap();
        assert_eq!(fwd.round_id, 5);
        assert_eq!(fwd.silent_count, 0);
        assert_eq!(fwd.probability, 0.5);
        assert!(!fwd.stop);
        assert_eq!(out.firing.unwrap().round_id, 4);
        assert_eq!(n.local_probability(), 0.5);
        assert_eq!(n.state(), NodeState::WaitingToken);
    }

    #[test]
    fn test_silence_increments_count() {
        let config = RingConfig::new(3).with_probability(0.5);
        let mut n = node(2, &config, &[0.7]);
        let out = n.on_token(token(2, 3), Instant::now());

        let fwd = out.forward.unwrap();
        assert_eq!(fwd.silent_count, 4);
        assert_eq!(fwd.probability, 0.5);
        assert!(out.firing.is_none());
        assert_eq!(n.local_silent_streak(), 1);
    }

    #[test]
    fn test_probability_halves_per_firing() {
        let config = RingConfig::new(2).with_probability(1.0);
        let mut n = node(1, &config, &[0.0, 0.0, 0.0, 0.0]);
        let mut expected = 1.0;
        for round in 0..4 {
            let out = n.on_token(token(round * 2, 0), Instant::now());
            expected /= 2.0;
            assert_eq!(out.firing.unwrap().probability_after, expected);
        }
        assert_eq!(n.firings(), 4);
    }

    #[test]
    fn test_stop_exactly_at_threshold() {
        // K = 2: node 0 issues stop when the incoming silent count is 2,
        // not at 1, and never again afterwards.
        let config = RingConfig::new(4).with_threshold(2);
        let mut n0 = node(0, &config, &[0.9]);
        let now = Instant::now();
        n0.originate(now);

        let out = n0.on_token(token(3, 1), now);
        assert!(!out.stop_issued);
        assert!(!out.forward.unwrap().stop);

        let out = n0.on_token(token(7, 2), now);
        assert!(out.stop_issued);
        assert!(out.forward.unwrap().stop);
    }

    #[test]
    fn test_non_coordinator_never_stops() {
        let config = RingConfig::new(4).with_threshold(1);
        let mut n = node(2, &config, &[0.9]);
        let out = n.on_token(token(1, 50), Instant::now());
        assert!(!out.forward.unwrap().stop);
        assert!(!out.stop_issued);
    }

    #[test]
    fn test_stop_token_relayed_once() {
        let config = RingConfig::new(4);
        let mut n = node(2, &config, &[]);
        let stop = Token {
            stop: true,
            ..token(9, 3)
        };
        let out = n.on_token(stop, Instant::now());
        assert_eq!(out.forward, Some(stop));
        assert!(n.is_terminated());

        let again = n.on_token(stop, Instant::now());
        assert_eq!(again.forward, None);
    }

    #[test]
    fn test_node0_await_return_absorbs_stop() {
        let config = RingConfig::new(2).with_threshold(1);
        let mut n0 = node(0, &config, &[0.9]);
        let now = Instant::now();
        n0.originate(now);

        let out = n0.on_token(token(1, 1), now);
        let stop = out.forward.unwrap();
        assert!(stop.stop);
        assert_eq!(n0.state(), NodeState::WaitingToken);

        let back = n0.on_token(stop, now);
        assert_eq!(back.forward, None);
        assert!(n0.is_terminated());
    }

    #[test]
    fn test_node0_immediate_exit() {
        let config = RingConfig::new(2)
            .with_threshold(1)
            .with_node0_exit(Node0Exit::Immediate);
        let mut n0 = node(0, &config, &[0.9]);
        let now = Instant::now();
        n0.originate(now);

        let out = n0.on_token(token(1, 1), now);
        assert!(out.forwards_stop());
        assert!(n0.is_terminated());
    }

    #[test]
    fn test_out_of_order_token_counted_and_processing_continues() {
        let config = RingConfig::new(4);
        let counter = InconsistencyCounter::new();
        let mut n = RingNode::with_source(
            NodeId::new(1),
            &config,
            Scripted::new(&[0.9]),
            &counter,
        )
        .unwrap();
        let now = Instant::now();

        n.on_token(token(7, 0), now);
        assert_eq!(counter.get(), 0);

        let out = n.on_token(token(5, 0), now);
        assert_eq!(counter.get(), 1);
        assert_eq!(out.forward.unwrap().round_id, 6);

        let out = n.on_token(token(11, 0), now);
        assert_eq!(counter.get(), 1);
        assert_eq!(out.forward.unwrap().round_id, 12);
        assert_eq!(n.state(), NodeState::WaitingToken);
    }

    #[test]
    fn test_monitoring_disabled() {
        let config = RingConfig::new(4).with_monitoring(false);
        let counter = InconsistencyCounter::new();
        let mut n =
            RingNode::with_source(NodeId::new(1), &config, Scripted::new(&[0.9]), &counter)
                .unwrap();
        n.on_token(token(7, 0), Instant::now());
        n.on_token(token(5, 0), Instant::now());
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_node0_times_rounds() {
        let config = RingConfig::new(2);
        let mut n0 = node(0, &config, &[0.9]);
        let t0 = Instant::now();
        n0.originate(t0);
        let out = n0.on_token(token(1, 0), t0 + Duration::from_millis(4));
        assert_eq!(out.round_duration, Some(Duration::from_millis(4)));

        let mut n1 = node(1, &config, &[0.9]);
        let out = n1.on_token(token(0, 0), t0);
        assert_eq!(out.round_duration, None);
    }

    #[test]
    fn test_seeded_nodes_are_reproducible() {
        let config = RingConfig::new(4).with_probability(0.5).with_seed(99);
        let counter = InconsistencyCounter::new();
        let run = || {
            let mut n = RingNode::new(NodeId::new(2), &config, &counter).unwrap();
            (0..50)
                .map(|r| n.on_token(token(r * 4, 0), Instant::now()).firing.is_some())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
