//! Error types for fireworks-ring.

use thiserror::Error;

/// Result type for ring runs.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a ring run.
#[derive(Debug, Error)]
pub enum Error {
    /// Ring or network parameters were rejected before start
    #[error("Configuration error: {0}")]
    Config(#[from] fireworks_protocol::Error),

    /// A node's link failed
    #[error("Link error: {0}")]
    Link(#[from] fireworks_transfer::LinkError),

    /// A node task panicked or was cancelled
    #[error("Node task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// An environment variable held an unparsable value
    #[error("Invalid {name}: {value:?}")]
    Env { name: &'static str, value: String },
}
