//! UDP links between ring processes.
//!
//! Each node binds its own token socket and sends to its successor's. Firing
//! notices go out on a shared IPv4 multicast group; when the group cannot be
//! joined the link still carries tokens, just without fan-out.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use fireworks_protocol::{EventNotice, NodeId, Token};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::link::Link;
use crate::wire::{self, Frame};

/// Default multicast group for firing notices.
pub const DEFAULT_FANOUT_GROUP: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(239, 42, 42, 42), 51000);

/// Default bound on held notices.
pub const DEFAULT_NOTICE_BUFFER: usize = 1024;

/// Receive buffer; larger than any valid frame so oversize datagrams show
/// up as a length mismatch instead of being silently cut.
const RECV_BUF: usize = 512;

/// UDP link configuration
#[derive(Debug, Clone)]
pub struct UdpLinkConfig {
    /// Node this link belongs to
    pub node: NodeId,
    /// Token socket address of this node
    pub bind: SocketAddr,
    /// Token socket address of the successor
    pub successor: SocketAddr,
    /// Multicast group for notices; `None` disables fan-out
    pub fanout_group: Option<SocketAddrV4>,
    /// Maximum notices held between drains (oldest dropped)
    pub notice_buffer: usize,
}

/// A node's UDP link.
#[derive(Debug)]
pub struct UdpLink {
    node: NodeId,
    socket: UdpSocket,
    successor: SocketAddr,
    fanout: Option<Fanout>,
    held: VecDeque<EventNotice>,
    notice_buffer: usize,
}

#[derive(Debug)]
struct Fanout {
    socket: UdpSocket,
    group: SocketAddr,
}

enum Received {
    Token(io::Result<usize>),
    Notice(io::Result<usize>),
}

impl UdpLink {
    /// Bind the token socket and try to join the fan-out group.
    pub async fn bind(cfg: UdpLinkConfig) -> Result<Self> {
        let socket = bind_token_socket(cfg.bind)?;
        info!(node = %cfg.node, addr = %cfg.bind, successor = %cfg.successor, "UDP link bound");

        let fanout = match cfg.fanout_group {
            Some(group) => match join_fanout(group) {
                Ok(socket) => {
                    debug!(node = %cfg.node, %group, "Joined fan-out group");
                    Some(Fanout {
                        socket,
                        group: group.into(),
                    })
                }
                Err(e) => {
                    warn!(node = %cfg.node, %group, error = %e, "Fan-out unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            node: cfg.node,
            socket,
            successor: cfg.successor,
            fanout,
            held: VecDeque::new(),
            notice_buffer: cfg.notice_buffer.max(1),
        })
    }

    /// Local address of the token socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Whether firing notices are being exchanged.
    pub fn has_fanout(&self) -> bool {
        self.fanout.is_some()
    }

    fn hold(&mut self, notice: EventNotice) {
        if self.held.len() == self.notice_buffer {
            self.held.pop_front();
        }
        self.held.push_back(notice);
    }

    fn on_fanout_datagram(&mut self, data: &[u8]) {
        match wire::decode(data) {
            Ok(Frame::Notice(notice)) => self.hold(notice),
            Ok(Frame::Token(token)) => {
                warn!(node = %self.node, %token, "Token on fan-out group, discarding")
            }
            Err(e) => warn!(node = %self.node, error = %e, "Malformed notice, discarding"),
        }
    }

    /// Transient errors are skipped; anything else turns fan-out off.
    fn on_fanout_error(&mut self, e: io::Error) {
        if is_transient(&e) {
            trace!(node = %self.node, error = %e, "Transient fan-out condition");
        } else {
            warn!(node = %self.node, error = %e, "Fan-out socket failed, disabling fan-out");
            self.fanout = None;
        }
    }
}

impl Link for UdpLink {
    async fn recv_token(&mut self) -> Result<Token> {
        let mut token_buf = [0u8; RECV_BUF];
        let mut notice_buf = [0u8; RECV_BUF];
        loop {
            let received = tokio::select! {
                res = self.socket.recv_from(&mut token_buf) => {
                    Received::Token(res.map(|(len, _)| len))
                }
                res = recv_fanout(self.fanout.as_ref(), &mut notice_buf) => {
                    Received::Notice(res)
                }
            };

            match received {
                Received::Token(Ok(len)) => match wire::decode(&token_buf[..len]) {
                    Ok(Frame::Token(token)) => {
                        trace!(node = %self.node, %token, "Received");
                        return Ok(token);
                    }
                    Ok(Frame::Notice(notice)) => self.hold(notice),
                    Err(e) => {
                        warn!(node = %self.node, error = %e, len, "Malformed datagram, discarding")
                    }
                },
                Received::Token(Err(e)) if is_transient(&e) => {
                    trace!(node = %self.node, error = %e, "Transient socket condition");
                }
                Received::Token(Err(e)) => return Err(e.into()),
                Received::Notice(Ok(len)) => self.on_fanout_datagram(&notice_buf[..len]),
                Received::Notice(Err(e)) => self.on_fanout_error(e),
            }
        }
    }

    async fn send_token(&mut self, token: Token) -> Result<()> {
        let bytes = wire::encode_token(&token)?;
        trace!(node = %self.node, %token, to = %self.successor, "Forwarding");
        self.socket.send_to(&bytes, self.successor).await?;
        Ok(())
    }

    fn announce(&mut self, notice: EventNotice) {
        let Some(fanout) = self.fanout.as_ref() else {
            return;
        };
        let bytes = match wire::encode_notice(&notice) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(node = %self.node, error = %e, "Could not encode notice");
                return;
            }
        };
        if let Err(e) = fanout.socket.try_send_to(&bytes, fanout.group) {
            debug!(node = %self.node, error = %e, "Notice not sent");
        }
    }

    fn drain_notices(&mut self) -> Vec<EventNotice> {
        let mut buf = [0u8; RECV_BUF];
        loop {
            let Some(fanout) = self.fanout.as_ref() else {
                break;
            };
            match fanout.socket.try_recv_from(&mut buf) {
                Ok((len, _)) => self.on_fanout_datagram(&buf[..len]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => self.on_fanout_error(e),
            }
        }
        self.held.drain(..).collect()
    }
}

/// Wait on the fan-out socket, or forever when there is none.
async fn recv_fanout(fanout: Option<&Fanout>, buf: &mut [u8]) -> io::Result<usize> {
    match fanout {
        Some(fanout) => fanout.socket.recv_from(buf).await.map(|(len, _)| len),
        None => std::future::pending().await,
    }
}

/// Reset notifications and spurious wakeups are not failures.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
    )
}

fn bind_token_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    // Token addresses are exclusive to one node; no address reuse here.
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

fn join_fanout(group: SocketAddrV4) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    // Every node on the host binds the same group port.
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;

    let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port());
    socket.bind(&SocketAddr::V4(bind).into())?;
    socket.join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(1)?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}
