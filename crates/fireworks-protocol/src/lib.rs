//! Fireworks Ring - protocol core
//!
//! A single token circulates through a fixed ring of `n` nodes. Each node
//! holding the token draws a sample and, with its current probability,
//! *fires*: it announces an event, halves its own probability and resets the
//! ring-wide silent count carried on the token. Node 0 watches the silent
//! count and, once it reaches the threshold K, sets the one-shot stop flag.
//! Every node relays the stop token exactly once and terminates.
//!
//! # Crate layout
//!
//! | Module | Contents |
//! |---|---|
//! | [`token`] | [`Token`], [`NodeId`], [`EventNotice`], [`Firing`] |
//! | [`node`] | [`RingNode`] state machine and [`FiringSource`] |
//! | [`coordinator`] | [`TerminationCoordinator`] held by node 0 |
//! | [`monitor`] | [`ConsistencyMonitor`] and the shared [`InconsistencyCounter`] |
//! | [`stats`] | [`StatsCollector`] and the [`RunSummary`] record |
//! | [`simulation`] | [`RingSimulation`], a deterministic single-threaded driver |
//!
//! Everything here is synchronous and free of I/O. Transports live in
//! `fireworks-transfer`, the concurrent runtimes in `fireworks-ring`.
//!
//! # Example
//!
//! ```
//! use fireworks_protocol::{RingConfig, RingSimulation};
//!
//! let config = RingConfig::new(8).with_probability(1.0).with_threshold(3);
//! let report = RingSimulation::new(config).unwrap().run();
//! assert_eq!(report.stop_forwarders.len(), 8);
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod monitor;
pub mod node;
pub mod simulation;
pub mod stats;
pub mod token;

pub use config::{Node0Exit, RingConfig};
pub use coordinator::TerminationCoordinator;
pub use error::{Error, Result};
pub use monitor::{ConsistencyMonitor, InconsistencyCounter, Violation, PROBABILITY_TOLERANCE};
pub use node::{FiringSource, NodeState, Outcome, RingNode};
pub use simulation::{Hop, RingSimulation, SimulationReport};
pub use stats::{DurationStats, RunSummary, StatsCollector};
pub use token::{EventNotice, Firing, NodeId, Token};
