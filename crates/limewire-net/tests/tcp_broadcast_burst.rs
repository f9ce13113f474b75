use std::{net::SocketAddr, thread, time::Duration};

use limewire_net::tcp::{PollEvent, SendBehavior, TcpConnector};

const NUM_RECEIVERS: usize = 4;
const BURST_SIZE: usize = 20;
const PAYLOAD_SIZE: usize = 200;

/// Spawns a receiver thread that connects to `addr` via `TcpConnector` and
/// collects frames via `poll_with` until the sender disconnects.
fn spawn_receiver(addr: SocketAddr) -> thread::JoinHandle<Vec<Vec<u8>>> {
    thread::spawn(move || {
        let mut conn = TcpConnector::default();
        conn.connect(addr).expect("receiver: failed to connect");

        let mut frames: Vec<Vec<u8>> = Vec::new();
        let mut disconnected = false;
        let deadline = std::time::Instant::now() + Duration::from_secs(10);

        while !disconnected && std::time::Instant::now() < deadline {
            conn.poll_with(|event| match event {
                PollEvent::Message { payload, .. } => frames.push(payload.to_vec()),
                PollEvent::Disconnect { .. } => disconnected = true,
                _ => {}
            });
            thread::sleep(Duration::from_millis(1));
        }

        frames
    })
}

fn pump(conn: &mut TcpConnector, for_how_long: Duration) {
    let deadline = std::time::Instant::now() + for_how_long;
    while std::time::Instant::now() < deadline {
        while conn.poll_with(|_| {}) {}
        thread::sleep(Duration::from_millis(1));
    }
}

/// Broadcast a burst of messages to multiple receivers and verify every
/// receiver gets every frame, intact and in order.
#[test]
fn broadcast_burst_to_multiple_receivers() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("probe");
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let mut sender = TcpConnector::default();
    sender.listen_at(addr).expect("failed to listen");

    let handles: Vec<_> = (0..NUM_RECEIVERS).map(|_| spawn_receiver(addr)).collect();

    let mut accepted = 0;
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while accepted < NUM_RECEIVERS && std::time::Instant::now() < deadline {
        sender.poll_with(|event| {
            if let PollEvent::Accept { .. } = event {
                accepted += 1;
            }
        });
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(accepted, NUM_RECEIVERS, "not all receivers connected");

    for seq in 0..BURST_SIZE {
        sender.write_or_enqueue_with(SendBehavior::Broadcast, |buf| {
            buf.push(seq as u8);
            buf.resize(PAYLOAD_SIZE, (seq & 0xFF) as u8);
        });
        while sender.poll_with(|_| {}) {}
    }

    pump(&mut sender, Duration::from_secs(5));
    drop(sender);

    for (i, handle) in handles.into_iter().enumerate() {
        let frames = handle.join().unwrap_or_else(|_| panic!("receiver {i} panicked"));

        assert_eq!(
            frames.len(),
            BURST_SIZE,
            "receiver {i}: expected {BURST_SIZE} frames, got {}",
            frames.len()
        );

        for (seq, frame) in frames.iter().enumerate() {
            assert_eq!(frame.len(), PAYLOAD_SIZE, "receiver {i} frame {seq}: wrong payload size");
            assert_eq!(frame[0] as usize, seq, "receiver {i}: frame out of order");
            let expected_fill = (seq & 0xFF) as u8;
            assert!(
                frame[1..].iter().all(|&b| b == expected_fill),
                "receiver {i} frame {seq}: payload corrupted"
            );
        }
    }
}
