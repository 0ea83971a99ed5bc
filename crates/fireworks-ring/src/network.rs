//! One ring node per process, linked over UDP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use fireworks_protocol::{InconsistencyCounter, NodeId, RingConfig, RingNode, RunSummary};
use fireworks_transfer::{UdpLink, UdpLinkConfig, DEFAULT_FANOUT_GROUP, DEFAULT_NOTICE_BUFFER};
use tracing::info;

use crate::driver::drive;
use crate::env::{self, FANOUT_GROUP_VAR, HOST_VAR};
use crate::error::Result;
use crate::ledger::RunLedger;

/// Default port of node 0; node `i` listens on `base_port + i`.
pub const DEFAULT_BASE_PORT: u16 = 50000;

/// How long node 0 waits for its peers to bind before originating.
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(200);

/// Addressing of a UDP ring.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Address every node binds on
    pub host: IpAddr,
    /// Port of node 0
    pub base_port: u16,
    /// Multicast group for firing notices; `None` disables fan-out
    pub fanout_group: Option<SocketAddrV4>,
    /// Start barrier observed by node 0
    pub start_delay: Duration,
    /// Notices held per node between drains
    pub notice_buffer: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: DEFAULT_BASE_PORT,
            fanout_group: Some(DEFAULT_FANOUT_GROUP),
            start_delay: DEFAULT_START_DELAY,
            notice_buffer: DEFAULT_NOTICE_BUFFER,
        }
    }
}

impl NetworkConfig {
    /// Defaults overridden by `FIREWORKS_HOST` and `FIREWORKS_FANOUT_GROUP`.
    ///
    /// `FIREWORKS_FANOUT_GROUP=off` disables fan-out.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = env::parse_var(HOST_VAR)? {
            config.host = host;
        }
        match std::env::var(FANOUT_GROUP_VAR).as_deref().map(str::trim) {
            Ok("off") => config.fanout_group = None,
            _ => {
                if let Some(group) = env::parse_var(FANOUT_GROUP_VAR)? {
                    config.fanout_group = Some(group);
                }
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    #[must_use]
    pub fn with_fanout_group(mut self, group: Option<SocketAddrV4>) -> Self {
        self.fanout_group = group;
        self
    }

    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Check that every node of a `ring_size` ring gets a valid address.
    pub fn validate(&self, ring_size: usize) -> fireworks_protocol::Result<()> {
        use fireworks_protocol::Error;

        if self.base_port == 0 {
            return Err(Error::InvalidAddressing("base port must be non-zero".into()));
        }
        let last = u64::from(self.base_port) + (ring_size as u64).saturating_sub(1);
        if last > u64::from(u16::MAX) {
            return Err(Error::InvalidAddressing(format!(
                "ports {}..={} exceed {}",
                self.base_port,
                last,
                u16::MAX
            )));
        }
        if let Some(group) = self.fanout_group {
            if !group.ip().is_multicast() {
                return Err(Error::InvalidAddressing(format!(
                    "fan-out group {} is not a multicast address",
                    group
                )));
            }
        }
        Ok(())
    }

    /// Token socket address of node `id`.
    ///
    /// Call after [`validate`](Self::validate); ids whose port would pass
    /// `u16::MAX` trip a debug assertion and wrap in release builds.
    pub fn node_addr(&self, id: NodeId) -> SocketAddr {
        debug_assert!(
            u64::from(self.base_port).saturating_add(id.raw()) <= u64::from(u16::MAX),
            "port of {} overflows from base port {}",
            id,
            self.base_port
        );
        let port = self.base_port.wrapping_add(id.raw() as u16);
        SocketAddr::new(self.host, port)
    }

    /// Link configuration for node `id` of `ring`.
    pub fn link_config(&self, id: NodeId, ring: &RingConfig) -> UdpLinkConfig {
        UdpLinkConfig {
            node: id,
            bind: self.node_addr(id),
            successor: self.node_addr(ring.successor(id)),
            fanout_group: self.fanout_group,
            notice_buffer: self.notice_buffer,
        }
    }
}

/// Run node `id` of a UDP ring until it terminates.
///
/// Returns node 0's summary; every other node returns `None`. Event counts
/// come from node 0's own firings and the notices it heard on the fan-out,
/// and the inconsistency count covers this process only.
pub async fn run_network_node(
    id: NodeId,
    config: RingConfig,
    net: NetworkConfig,
) -> Result<Option<RunSummary>> {
    config.validate()?;
    config.check_node(id)?;
    net.validate(config.ring_size)?;

    let counter = InconsistencyCounter::new();
    let node = RingNode::new(id, &config, &counter)?;
    let link = UdpLink::bind(net.link_config(id, &config)).await?;

    if id.is_coordinator() {
        info!(
            ring_size = config.ring_size,
            threshold = config.silence_threshold,
            p0 = config.initial_probability,
            delay = ?net.start_delay,
            "Waiting for peers"
        );
        tokio::time::sleep(net.start_delay).await;
    }

    let report = drive(node, link, RunLedger::new()).await?;
    Ok(report
        .stats
        .map(|stats| stats.summarize(config.ring_size, counter.get())))
}
