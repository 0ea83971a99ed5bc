//! Small rings over loopback UDP.
//!
//! Every node runs as a task in this process but talks to its neighbours
//! only through its own UDP socket, as separate `ring-node` processes would.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use fireworks_protocol::{EventNotice, Node0Exit, NodeId, RingConfig, RingSimulation, RunSummary};
use fireworks_ring::{run_network_node, NetworkConfig};
use fireworks_transfer::{Link, UdpLink, UdpLinkConfig};

async fn run_ring(config: RingConfig, net: NetworkConfig) -> RunSummary {
    let handles: Vec<_> = config
        .node_ids()
        .map(|id| tokio::spawn(run_network_node(id, config.clone(), net.clone())))
        .collect();

    let mut summary = None;
    for (id, handle) in handles.into_iter().enumerate() {
        let result = tokio::time::timeout(Duration::from_secs(20), handle)
            .await
            .expect("ring stalled")
            .unwrap()
            .unwrap();
        if id == 0 {
            summary = result;
        } else {
            assert!(result.is_none());
        }
    }
    summary.expect("node 0 produced no summary")
}

fn net(base_port: u16) -> NetworkConfig {
    NetworkConfig::default()
        .with_base_port(base_port)
        .with_fanout_group(None)
        .with_start_delay(Duration::from_millis(100))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_udp_ring_terminates() {
    let config = RingConfig::new(4).with_probability(1.0).with_threshold(2);
    let summary = run_ring(config.clone(), net(47210)).await;

    assert_eq!(summary.ring_size, 4);
    assert_eq!(summary.inconsistency_count, 0);
    assert!(summary.min_round_duration <= summary.mean_round_duration);
    assert!(summary.mean_round_duration <= summary.max_round_duration);

    // Same decisions as the simulated ring: node 0 completes as many rounds.
    let report = RingSimulation::new(config).unwrap().run();
    assert_eq!(summary.rounds_completed, report.summary.rounds_completed);

    // Without fan-out node 0 only counts its own firings.
    let own = report
        .firings
        .iter()
        .filter(|f| f.node == NodeId::new(0))
        .count() as u64;
    assert_eq!(summary.events_fired, own);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_udp_ring_immediate_exit() {
    let config = RingConfig::new(3)
        .with_threshold(1)
        .with_node0_exit(Node0Exit::Immediate);
    let summary = run_ring(config, net(47230)).await;
    assert_eq!(summary.ring_size, 3);
}

/// Whether a notice announced on `group` comes back over multicast loopback.
async fn multicast_loops_back(group: SocketAddrV4) -> bool {
    let cfg = UdpLinkConfig {
        node: NodeId::new(0),
        bind: "127.0.0.1:0".parse().unwrap(),
        successor: "127.0.0.1:9".parse().unwrap(),
        fanout_group: Some(group),
        notice_buffer: 16,
    };
    let Ok(mut link) = UdpLink::bind(cfg).await else {
        return false;
    };
    if !link.has_fanout() {
        return false;
    }

    let notice = EventNotice {
        origin: NodeId::new(0),
        round_id: 0,
    };
    link.announce(notice);
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if link.drain_notices().contains(&notice) {
            return true;
        }
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_udp_ring_with_fanout() {
    // The availability check uses its own port so its notice never reaches
    // the ring under test.
    let check_group = SocketAddrV4::new(Ipv4Addr::new(239, 42, 42, 43), 51734);
    let multicast = multicast_loops_back(check_group).await;

    let config = RingConfig::new(3).with_probability(1.0).with_threshold(2);
    let group = SocketAddrV4::new(Ipv4Addr::new(239, 42, 42, 43), 51733);
    let summary = run_ring(config.clone(), net(47250).with_fanout_group(Some(group))).await;
    let report = RingSimulation::new(config).unwrap().run();

    if multicast {
        // Node 0 heard every other node's firings, not just its own.
        assert_eq!(summary.events_fired, report.firings.len() as u64);
    } else {
        let own = report
            .firings
            .iter()
            .filter(|f| f.node == NodeId::new(0))
            .count() as u64;
        assert!(summary.events_fired >= own);
        assert!(summary.events_fired <= report.firings.len() as u64);
    }
}
