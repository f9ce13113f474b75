use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use limewire_net::tcp::{PollEvent, SendBehavior, TcpConnector};
use limewire_proto::{Board, WireMessage};
use limewire_proxy::{ConnectionState, Proxy, ProxyConfig};

fn free_loopback_addr() -> SocketAddr {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap()
}

fn test_config(fc_addr: SocketAddr, listen_addr: SocketAddr, latency_log: std::path::PathBuf) -> ProxyConfig {
    ProxyConfig {
        fc_addr,
        listen_addr,
        heartbeat_interval: Duration::from_millis(20),
        reconnect_backoff: Duration::from_millis(100),
        latency_log,
    }
}

fn poll_until(deadline: Instant, mut check: impl FnMut() -> bool) -> bool {
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

#[test]
fn fans_out_fc_telemetry_to_every_connected_client() {
    let dir = tempfile::tempdir().unwrap();
    let fc_listen_addr = free_loopback_addr();
    let proxy_listen_addr = free_loopback_addr();

    let mut fc_server = TcpConnector::default();
    fc_server.listen_at(fc_listen_addr).unwrap();

    let mut proxy = Proxy::new(test_config(fc_listen_addr, proxy_listen_addr, dir.path().join("latency.csv"))).unwrap();

    let mut fc_client_token = None;
    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        proxy.poll_once();
        fc_server.poll_with(|event| {
            if let PollEvent::Accept { stream, .. } = event {
                fc_client_token = Some(stream);
            }
        });
        fc_client_token.is_some()
    });
    assert_eq!(proxy.state(), ConnectionState::Connected);
    let fc_client_token = fc_client_token.unwrap();

    let mut downstream_a = TcpConnector::default();
    let mut downstream_b = TcpConnector::default();
    let a_token = downstream_a.connect(proxy_listen_addr);
    let b_token = downstream_b.connect(proxy_listen_addr);

    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        proxy.poll_once();
        downstream_a.poll_with(|_| {});
        downstream_b.poll_with(|_| {});
        proxy.connected_client_count() == 2
    });
    assert_eq!(proxy.connected_client_count(), 2);

    let telemetry = WireMessage::Telemetry { board: Board::Fr, timestamp_ns: 42, values: vec![1.0; Board::Fr.num_values()] };
    fc_server.write_or_enqueue_with(SendBehavior::Single(fc_client_token), {
        let bytes = telemetry.encode();
        move |buf| buf.extend_from_slice(&bytes)
    });

    let mut received_a = None;
    let mut received_b = None;
    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        proxy.poll_once();
        downstream_a.poll_with(|event| {
            if let PollEvent::Message { payload, .. } = event {
                received_a = WireMessage::decode(payload).ok();
            }
        });
        downstream_b.poll_with(|event| {
            if let PollEvent::Message { payload, .. } = event {
                received_b = WireMessage::decode(payload).ok();
            }
        });
        received_a.is_some() && received_b.is_some()
    });

    assert_eq!(received_a, Some(telemetry.clone()));
    assert_eq!(received_b, Some(telemetry));
    let _ = (a_token, b_token);
}
