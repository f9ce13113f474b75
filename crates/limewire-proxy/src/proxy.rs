use std::{
    collections::HashSet,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use limewire_latency::{LatencyRecorder, LatencySample};
use limewire_net::{
    tcp::{PollEvent, SendBehavior, TcpConnector},
    Repeater,
};
use limewire_proto::WireMessage;
use mio::Token;
use tracing::{debug, info, warn};

use crate::{config::ProxyConfig, error::ProxyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
}

enum RawOutcome {
    Connected,
    Disconnected,
    Message { payload: Vec<u8>, recv_ns: u64 },
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_nanos() as u64
}

/// Transparent interposer between the flight computer and any number of
/// downstream observers (spec §4.8): forwards raw framed bytes in both
/// directions unchanged, and records a latency sample for each decodable
/// Telemetry or ValveState message seen from the flight computer.
pub struct Proxy {
    config: ProxyConfig,
    latency: Option<LatencyRecorder>,

    fc: TcpConnector,
    fc_token: Token,
    state: ConnectionState,

    clients: TcpConnector,
    client_tokens: HashSet<Token>,

    heartbeat: Repeater,
}

impl Proxy {
    pub fn new(config: ProxyConfig) -> Result<Proxy, ProxyError> {
        let latency = Some(LatencyRecorder::open(&config.latency_log)?);

        let mut fc = TcpConnector::default().with_reconnect_interval(config.reconnect_backoff);
        let fc_token = Token(0);
        fc.connect(config.fc_addr);

        let mut clients = TcpConnector::default();
        clients
            .listen_at(config.listen_addr)
            .ok_or(ProxyError::ListenerBind {
                addr: config.listen_addr,
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "failed to bind client listener"),
            })?;

        let heartbeat = Repeater::every(config.heartbeat_interval);

        Ok(Proxy {
            config,
            latency,
            fc,
            fc_token,
            state: ConnectionState::Connecting,
            clients,
            client_tokens: HashSet::new(),
            heartbeat,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connected_client_count(&self) -> usize {
        self.client_tokens.len()
    }

    pub fn poll_once(&mut self) {
        self.tick_fc();
        self.tick_clients();
        self.tick_heartbeat();
    }

    fn tick_fc(&mut self) {
        let fc_token = self.fc_token;
        let mut outcomes = Vec::new();
        self.fc.poll_with(|event| match event {
            PollEvent::Accept { stream, .. } if stream == fc_token => outcomes.push(RawOutcome::Connected),
            PollEvent::Disconnect { token } if token == fc_token => outcomes.push(RawOutcome::Disconnected),
            PollEvent::Message { token, payload, recv_ts } if token == fc_token => {
                outcomes.push(RawOutcome::Message { payload: payload.to_vec(), recv_ns: recv_ts });
            }
            _ => {}
        });

        for outcome in outcomes {
            match outcome {
                RawOutcome::Connected => {
                    self.state = ConnectionState::Connected;
                    info!(addr = %self.config.fc_addr, "connected to flight computer");
                }
                RawOutcome::Disconnected => {
                    warn!("flight computer connection lost, disconnecting all downstream clients");
                    self.state = ConnectionState::Connecting;
                    self.disconnect_all_clients();
                }
                RawOutcome::Message { payload, recv_ns } => {
                    self.record_latency_if_decodable(&payload, recv_ns);
                    self.clients.write_or_enqueue_with(SendBehavior::Broadcast, move |buf| {
                        buf.extend_from_slice(&payload);
                    });
                }
            }
        }
    }

    fn record_latency_if_decodable(&mut self, payload: &[u8], recv_ns: u64) {
        let Some(latency) = &mut self.latency else { return };
        let sample = match WireMessage::decode(payload) {
            Ok(WireMessage::Telemetry { board, timestamp_ns, .. }) => {
                Some(LatencySample { now_ns: recv_ns, msg_ns: timestamp_ns, board: board.lower_name() })
            }
            Ok(WireMessage::ValveState { timestamp_ns, .. }) => {
                Some(LatencySample { now_ns: recv_ns, msg_ns: timestamp_ns, board: "" })
            }
            _ => None,
        };
        if let Some(sample) = sample {
            if let Err(err) = latency.record(sample) {
                warn!(?err, "failed to record latency sample");
            }
        }
    }

    fn tick_clients(&mut self) {
        let fc_token = self.fc_token;
        let state = self.state;
        let mut accepted = Vec::new();
        let mut disconnected = Vec::new();
        let mut to_forward = Vec::new();
        let mut to_reject = Vec::new();

        self.clients.poll_with(|event| match event {
            PollEvent::Accept { stream, peer_addr, .. } => {
                if state == ConnectionState::Connected {
                    accepted.push((stream, peer_addr));
                } else {
                    to_reject.push(stream);
                }
            }
            PollEvent::Disconnect { token } => disconnected.push(token),
            PollEvent::Message { token, payload, .. } => to_forward.push((token, payload.to_vec())),
        });

        for (token, peer_addr) in accepted {
            self.client_tokens.insert(token);
            info!(%peer_addr, "downstream client connected");
        }
        for token in to_reject {
            debug!(?token, "rejecting downstream client, flight computer not yet connected");
            self.clients.disconnect(token);
        }
        for token in disconnected {
            self.client_tokens.remove(&token);
        }
        for (_token, payload) in to_forward {
            self.fc.write_or_enqueue_with(SendBehavior::Single(fc_token), move |buf| {
                buf.extend_from_slice(&payload);
            });
        }
    }

    fn disconnect_all_clients(&mut self) {
        for token in self.client_tokens.drain() {
            self.clients.disconnect(token);
        }
    }

    fn tick_heartbeat(&mut self) {
        if !self.heartbeat.fired() {
            return;
        }
        if self.state == ConnectionState::Connected {
            self.fc.write_or_enqueue_with(SendBehavior::Single(self.fc_token), |buf| {
                buf.extend_from_slice(&WireMessage::Heartbeat.encode());
            });
        }
        debug!(clients = self.client_tokens.len(), state = ?self.state, "proxy heartbeat tick");
    }

    pub fn shutdown(&mut self) {
        self.disconnect_all_clients();
        self.fc.disconnect(self.fc_token);
    }
}
