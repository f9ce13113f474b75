use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use limewire_net::tcp::{PollEvent, SendBehavior, TcpConnector};
use limewire_proto::{Board, DeviceCommand, Valve, WireMessage};
use limewire_simulator::{Simulator, SimulatorConfig};

fn free_loopback_addr() -> SocketAddr {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap()
}

fn test_config(listen_addr: SocketAddr) -> SimulatorConfig {
    SimulatorConfig {
        listen_addr,
        telemetry_udp_target: free_loopback_addr(),
        telemetry_period: Duration::from_millis(10),
        zero_timestamp_every: 100,
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
fn emits_telemetry_for_every_board_to_connected_clients() {
    let listen_addr = free_loopback_addr();
    let mut simulator = Simulator::new(test_config(listen_addr)).unwrap();

    let mut client = TcpConnector::default();
    client.connect(listen_addr);

    let mut seen_boards = std::collections::HashSet::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        simulator.poll_once();
        client.poll_with(|event| {
            if let PollEvent::Message { payload, .. } = event {
                if let Ok(WireMessage::Telemetry { board, values, .. }) = WireMessage::decode(payload) {
                    assert_eq!(values.len(), board.num_values());
                    seen_boards.insert(board.id());
                }
            }
        });
        seen_boards.len() == Board::ALL.len()
    });

    assert_eq!(seen_boards.len(), Board::ALL.len(), "expected telemetry from every board");
}

#[test]
fn echoes_valve_state_in_response_to_valve_command() {
    let listen_addr = free_loopback_addr();
    let mut simulator = Simulator::new(test_config(listen_addr)).unwrap();

    let mut client = TcpConnector::default();
    let token = client.connect(listen_addr);

    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        simulator.poll_once();
        client.poll_with(|_| {});
        token.is_some()
    });

    let valve = Valve::new(Board::Bb1, 1).unwrap();
    client.write_or_enqueue_with(SendBehavior::Broadcast, {
        let bytes = WireMessage::ValveCommand { valve, state: true }.encode();
        move |buf| buf.extend_from_slice(&bytes)
    });

    let mut reply = None;
    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        simulator.poll_once();
        client.poll_with(|event| {
            if let PollEvent::Message { payload, .. } = event {
                reply = WireMessage::decode(payload).ok();
            }
        });
        reply.is_some()
    });

    match reply {
        Some(WireMessage::ValveState { valve: replied_valve, state, .. }) => {
            assert_eq!(replied_valve, valve);
            assert!(state);
        }
        other => panic!("expected a valve state echo, got {other:?}"),
    }
}

#[test]
fn acknowledges_device_command_with_canned_response() {
    let listen_addr = free_loopback_addr();
    let mut simulator = Simulator::new(test_config(listen_addr)).unwrap();

    let mut client = TcpConnector::default();
    let token = client.connect(listen_addr);

    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        simulator.poll_once();
        client.poll_with(|_| {});
        token.is_some()
    });

    client.write_or_enqueue_with(SendBehavior::Broadcast, {
        let bytes = WireMessage::DeviceCommand { board: Board::Fc, command: DeviceCommand::FirmwareBuildInfo }.encode();
        move |buf| buf.extend_from_slice(&bytes)
    });

    let mut reply = None;
    let deadline = Instant::now() + Duration::from_secs(2);
    poll_until(deadline, || {
        simulator.poll_once();
        client.poll_with(|event| {
            if let PollEvent::Message { payload, .. } = event {
                reply = WireMessage::decode(payload).ok();
            }
        });
        reply.is_some()
    });

    match reply {
        Some(WireMessage::DeviceCommandAck { board, command, response }) => {
            assert_eq!(board, Board::Fc);
            assert_eq!(command, DeviceCommand::FirmwareBuildInfo);
            assert!(!response.is_empty());
        }
        other => panic!("expected a device command ack, got {other:?}"),
    }
}
