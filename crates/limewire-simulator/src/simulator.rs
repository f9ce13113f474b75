use std::time::{SystemTime, UNIX_EPOCH};

use limewire_net::{
    tcp::{PollEvent, SendBehavior, TcpConnector},
    Repeater, UdpFramer,
};
use limewire_proto::{Board, DeviceCommand, WireMessage};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{config::SimulatorConfig, error::SimulatorError};

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_nanos() as u64
}

fn canned_response(command: DeviceCommand) -> String {
    match command {
        DeviceCommand::ResetBoard => "reset ok".to_string(),
        DeviceCommand::ClearFlash => "flash cleared".to_string(),
        DeviceCommand::FlashSpace => "flash space: 87%".to_string(),
        DeviceCommand::FirmwareBuildInfo => "build 2026.07.27-sim".to_string(),
    }
}

fn random_telemetry(board: Board) -> WireMessage {
    let mut rng = rand::rng();
    let values = (0..board.num_values()).map(|_| rng.random_range(-100.0f32..100.0f32)).collect();
    WireMessage::Telemetry { board, timestamp_ns: now_ns(), values }
}

/// Drives the wire protocol from the flight computer's side of the link
/// (spec §4.9): at 50 Hz, emits randomized Telemetry for every board to
/// every connected TCP client and broadcasts the same messages over UDP;
/// replies to incoming commands; periodically injects a zero timestamp to
/// exercise the store's validation path downstream.
pub struct Simulator {
    tcp: TcpConnector,
    udp: UdpFramer,
    udp_target: std::net::SocketAddr,
    telemetry_tick: Repeater,
    zero_timestamp_every: u64,
    iteration: u64,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Simulator, SimulatorError> {
        let mut tcp = TcpConnector::default();
        tcp.listen_at(config.listen_addr)
            .ok_or(SimulatorError::ListenerBind {
                addr: config.listen_addr,
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "failed to bind simulator listener"),
            })?;

        let udp = UdpFramer::bind("0.0.0.0:0".parse().unwrap()).map_err(SimulatorError::UdpBind)?;

        Ok(Simulator {
            tcp,
            udp,
            udp_target: config.telemetry_udp_target,
            telemetry_tick: Repeater::every(config.telemetry_period),
            zero_timestamp_every: config.zero_timestamp_every,
            iteration: 0,
        })
    }

    pub fn poll_once(&mut self) {
        self.tick_clients();
        self.tick_telemetry();
    }

    fn tick_clients(&mut self) {
        let mut inbound = Vec::new();
        self.tcp.poll_with(|event| match event {
            PollEvent::Accept { peer_addr, .. } => info!(%peer_addr, "client connected to simulator"),
            PollEvent::Disconnect { token } => debug!(?token, "client disconnected from simulator"),
            PollEvent::Message { token, payload, .. } => inbound.push((token, payload.to_vec())),
        });

        for (token, payload) in inbound {
            self.handle_inbound(token, &payload);
        }
    }

    fn handle_inbound(&mut self, token: mio::Token, payload: &[u8]) {
        match WireMessage::decode(payload) {
            Ok(WireMessage::ValveCommand { valve, state }) => {
                let reply = WireMessage::ValveState { valve, state, timestamp_ns: now_ns() };
                self.tcp.write_or_enqueue_with(SendBehavior::Single(token), move |buf| {
                    buf.extend_from_slice(&reply.encode());
                });
            }
            Ok(WireMessage::DeviceCommand { board, command }) => {
                let response = canned_response(command);
                self.tcp.write_or_enqueue_with(SendBehavior::Single(token), move |buf| {
                    buf.extend_from_slice(&WireMessage::DeviceCommandAck { board, command, response: response.clone() }.encode());
                });
            }
            Ok(WireMessage::Heartbeat) => debug!(?token, "heartbeat received"),
            Ok(other) => warn!(?other, "simulator received unexpected message variant, ignoring"),
            Err(err) => warn!(?err, "simulator received malformed message"),
        }
    }

    fn tick_telemetry(&mut self) {
        if !self.telemetry_tick.fired() {
            return;
        }
        self.iteration += 1;
        let zero_timestamp_round = self.zero_timestamp_every != 0 && self.iteration % self.zero_timestamp_every == 0;

        for board in Board::ALL {
            let mut message = random_telemetry(board);
            if zero_timestamp_round {
                if let WireMessage::Telemetry { timestamp_ns, .. } = &mut message {
                    *timestamp_ns = 0;
                }
            }

            let encoded = message.encode();
            self.tcp.write_or_enqueue_with(SendBehavior::Broadcast, {
                let encoded = encoded.clone();
                move |buf| buf.extend_from_slice(&encoded)
            });
            if let Err(err) = self.udp.send_to(self.udp_target, move |buf| buf.extend_from_slice(&encoded)) {
                warn!(?err, "failed to broadcast telemetry over udp");
            }
        }

        if zero_timestamp_round {
            debug!(iteration = self.iteration, "emitted zero-timestamp telemetry round");
        }
    }
}
