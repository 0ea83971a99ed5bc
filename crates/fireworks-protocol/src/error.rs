//! Error types for fireworks-protocol.

use thiserror::Error;

/// Result type for fireworks-protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors, reported before any node starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A ring needs at least two nodes.
    #[error("invalid ring size {0}: a ring needs at least 2 nodes")]
    InvalidRingSize(usize),

    /// The initial firing probability must lie in (0, 1].
    #[error("invalid initial probability {0}: must be in (0, 1]")]
    InvalidProbability(f64),

    /// The silence threshold must be at least one round.
    #[error("invalid silence threshold {0}: must be at least 1")]
    InvalidThreshold(u64),

    /// Network addressing cannot be realized (port overflow, non-multicast group, ...).
    #[error("invalid addressing: {0}")]
    InvalidAddressing(String),

    /// Node 0 exit ordering other than `await-return` or `immediate`.
    #[error("unknown node 0 exit mode {0:?}: expected await-return or immediate")]
    UnknownExitMode(String),

    /// A node id outside `0..ring_size` was requested.
    #[error("node {id} is out of range for a ring of {ring_size}")]
    NodeOutOfRange { id: u64, ring_size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::InvalidRingSize(1).to_string(),
            "invalid ring size 1: a ring needs at least 2 nodes"
        );
        let e = Error::NodeOutOfRange { id: 9, ring_size: 4 };
        assert!(e.to_string().contains("node 9"));
        assert!(e.to_string().contains("ring of 4"));
    }
}
