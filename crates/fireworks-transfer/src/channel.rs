//! In-process links over tokio channels.

use fireworks_protocol::{EventNotice, NodeId, Token};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

use crate::error::{LinkError, Result};
use crate::link::Link;

/// Default capacity of the fan-out channel.
pub const DEFAULT_NOTICE_CAPACITY: usize = 1024;

/// One node's end of an in-process ring.
///
/// The inbox is consumed only by this node and fed only by its predecessor.
#[derive(Debug)]
pub struct ChannelLink {
    id: NodeId,
    inbox: mpsc::UnboundedReceiver<Token>,
    successor: mpsc::UnboundedSender<Token>,
    fanout: broadcast::Sender<EventNotice>,
    notices: broadcast::Receiver<EventNotice>,
}

impl ChannelLink {
    /// Wire up `ring_size` links, index `i` belonging to node `i`.
    ///
    /// The fan-out keeps at most `notice_capacity` undrained notices per
    /// receiver; older ones are lost.
    pub fn ring(ring_size: usize, notice_capacity: usize) -> Vec<ChannelLink> {
        let (fanout, _) = broadcast::channel(notice_capacity.max(1));
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..ring_size).map(|_| mpsc::unbounded_channel()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| ChannelLink {
                id: NodeId::new(i as u64),
                inbox,
                successor: senders[(i + 1) % ring_size].clone(),
                fanout: fanout.clone(),
                notices: fanout.subscribe(),
            })
            .collect()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Link for ChannelLink {
    async fn recv_token(&mut self) -> Result<Token> {
        self.inbox.recv().await.ok_or(LinkError::Closed)
    }

    async fn send_token(&mut self, token: Token) -> Result<()> {
        trace!(node = %self.id, %token, "Forwarding");
        self.successor.send(token).map_err(|_| LinkError::Closed)
    }

    fn announce(&mut self, notice: EventNotice) {
        if self.fanout.send(notice).is_err() {
            trace!(node = %self.id, "No fan-out receivers left");
        }
    }

    fn drain_notices(&mut self) -> Vec<EventNotice> {
        let mut drained = Vec::new();
        loop {
            match self.notices.try_recv() {
                Ok(notice) => drained.push(notice),
                Err(TryRecvError::Lagged(missed)) => {
                    debug!(node = %self.id, missed, "Fan-out lagged, notices lost");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        drained
    }
}
