//! Fireworks Ring - runtimes
//!
//! Drives [`fireworks_protocol::RingNode`]s over [`fireworks_transfer`]
//! links until the stop token has passed every node:
//!
//! - [`run_local`]: one tokio task per node, in-process channels
//! - [`run_network_node`]: one node of a ring spread over processes, UDP
//!   token sockets and a multicast fan-out
//!
//! Both share the same per-node event loop in [`driver`].

pub mod driver;
pub mod env;
pub mod error;
pub mod ledger;
pub mod local;
pub mod network;

pub use driver::{drive, NodeReport};
pub use error::{Error, Result};
pub use ledger::{LedgerSnapshot, RunLedger};
pub use local::{run_local, RunOutcome};
pub use network::{run_network_node, NetworkConfig, DEFAULT_BASE_PORT, DEFAULT_START_DELAY};
