//! Fireworks Transfer - token links for the fireworks ring
//!
//! This crate provides:
//! - The [`Link`] trait a ring node drives: receive from the predecessor,
//!   send to the successor, announce and drain firing notices
//! - [`UdpLink`], one UDP socket per node plus an IPv4 multicast group for
//!   notices, for rings spread over processes
//! - [`ChannelLink`], tokio queues and a broadcast channel for rings of
//!   tasks inside one process
//! - The versioned datagram codec in [`wire`]
//!
//! # Example
//!
//! ```rust,ignore
//! use fireworks_transfer::{ChannelLink, Link, DEFAULT_NOTICE_CAPACITY};
//!
//! let mut links = ChannelLink::ring(4, DEFAULT_NOTICE_CAPACITY);
//! links[0].send_token(Token::genesis(1.0)).await?;
//! let token = links[1].recv_token().await?;
//! ```

pub mod channel;
pub mod error;
pub mod link;
pub mod udp;
pub mod wire;

// Re-export main types at crate root
pub use channel::{ChannelLink, DEFAULT_NOTICE_CAPACITY};
pub use error::{LinkError, Result, WireError};
pub use link::Link;
pub use udp::{UdpLink, UdpLinkConfig, DEFAULT_FANOUT_GROUP, DEFAULT_NOTICE_BUFFER};
pub use wire::Frame;
