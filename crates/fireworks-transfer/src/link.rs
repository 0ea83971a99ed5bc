//! The transport seam between a ring node and its neighbours.

use std::future::Future;

use fireworks_protocol::{EventNotice, Token};

use crate::error::Result;

/// Point-to-point token delivery to the successor plus best-effort fan-out.
///
/// A link belongs to exactly one node. Tokens arrive only from the
/// predecessor and leave only for the successor, in order.
pub trait Link: Send {
    /// Wait for the next token. Transient transport conditions are absorbed.
    fn recv_token(&mut self) -> impl Future<Output = Result<Token>> + Send;

    /// Hand `token` to the successor.
    fn send_token(&mut self, token: Token) -> impl Future<Output = Result<()>> + Send;

    /// Announce a firing to the whole ring. Never blocks; may be lost.
    fn announce(&mut self, notice: EventNotice);

    /// Notices received so far and not yet drained. Never blocks.
    fn drain_notices(&mut self) -> Vec<EventNotice>;
}
