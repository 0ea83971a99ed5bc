//! Error types for fireworks-transfer.

use thiserror::Error;

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised by a [`Link`](crate::Link).
#[derive(Debug, Error)]
pub enum LinkError {
    /// Socket failure that is not a transient reset notification.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer side of an in-process queue is gone.
    #[error("link closed")]
    Closed,

    /// A datagram could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// Rejections of the datagram codec.
#[derive(Debug, Error)]
pub enum WireError {
    /// Datagram length does not match the frame kind.
    #[error("bad frame length: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("bad magic bytes")]
    BadMagic,

    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown frame kind {0}")]
    UnknownKind(u8),

    /// The body did not decode (for example a bool byte other than 0 or 1).
    #[error("body decode failed: {0}")]
    Decode(#[from] bincode::Error),

    /// A field decoded but holds a value the protocol never produces.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
}
