use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use limewire_net::{
    tcp::{PollEvent, SendBehavior, TcpConnector},
    Repeater, UdpFramer,
};
use limewire_proto::{ControlSignal, Valve, WireMessage};
use limewire_store::{build_frame, ChannelMap, Frame, FrameValue, StoreClient};
use mio::Token;
use tracing::{debug, info, warn};

use crate::{
    config::SupervisorConfig,
    error::BridgeError,
    queue::{QueueEntry, TelemetryQueue},
};

/// The supervisor's connection state machine (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owned snapshot of one TCP poll event, collected outside the borrow of
/// [`TcpConnector::poll_with`]'s closure so the rest of `Supervisor`'s
/// fields are free to mutate while the events are processed.
enum TcpOutcome {
    Connected,
    Disconnected,
    Message { payload: Vec<u8>, recv_ns: u64 },
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_nanos() as u64
}

/// The "Limewire" bridge supervisor (spec §4.7): owns the FC TCP session,
/// the board UDP broadcast socket, the bounded ingest queue, and the store
/// adapter, and drives all of it from a single-threaded, non-blocking tick
/// loop. Each call to [`poll_once`](Supervisor::poll_once) advances every
/// cooperating "task" described in the spec (TCP reader, UDP reader,
/// writer, command relay, handoff relay, heartbeat) by one step, matching
/// §5's requirement that the design "remain correct on a single thread."
pub struct Supervisor<S: StoreClient> {
    config: SupervisorConfig,
    channel_map: ChannelMap,
    store: S,

    tcp: TcpConnector,
    fc_token: Token,
    udp: UdpFramer,

    state: ConnectionState,
    connecting_since: Instant,
    last_tcp_activity: Instant,

    queue: TelemetryQueue,
    writer_open: bool,
    heartbeat: Repeater,
}

impl<S: StoreClient> Supervisor<S> {
    pub fn new(config: SupervisorConfig, channel_map: ChannelMap, mut store: S) -> Result<Supervisor<S>, BridgeError> {
        let command_channels: Vec<String> = channel_map
            .index_channels()
            .filter_map(|idx| channel_map.get(idx))
            .flat_map(|meta| meta.data_channels.iter())
            .filter(|name| channel_map.is_valve_command(name))
            .cloned()
            .collect();
        store.subscribe_command_channels(command_channels);
        store.subscribe_handoff_channel(None);

        let mut tcp = TcpConnector::default().with_reconnect_interval(config.reconnect_backoff);
        // `tcp` is freshly constructed, so its first-ever `connect()` call
        // always allocates `Token(0)`, and keeps reusing that same token on
        // every automatic reconnect attempt regardless of whether this
        // first dial succeeds immediately (see `ConnectionManager::connect`).
        let fc_token = Token(0);
        tcp.connect(config.fc_addr);

        let udp = UdpFramer::bind(config.telemetry_udp_addr)
            .map_err(|source| BridgeError::UdpBind { addr: config.telemetry_udp_addr, source })?;

        let now = Instant::now();
        Ok(Supervisor {
            queue: TelemetryQueue::new(config.queue_capacity),
            heartbeat: Repeater::every(config.heartbeat_interval),
            config,
            channel_map,
            store,
            tcp,
            fc_token,
            udp,
            state: ConnectionState::Connecting,
            connecting_since: now,
            last_tcp_activity: now,
            writer_open: false,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Advances every cooperating task by one non-blocking step. Intended
    /// to be called in a tight loop from `main` (or a test harness).
    pub fn poll_once(&mut self) {
        self.tick_dial_watchdog();
        self.tick_tcp();
        self.tick_read_idle_watchdog();
        self.tick_udp();
        self.drain_queue();
        self.relay_commands();
        self.relay_handoff();
        self.tick_heartbeat();
    }

    fn tick_dial_watchdog(&mut self) {
        if self.state == ConnectionState::Connecting && self.connecting_since.elapsed() > self.config.dial_timeout {
            warn!(dial_timeout = ?self.config.dial_timeout, "dial timed out, forcing reconnect attempt");
            self.tcp.force_reconnect();
            self.connecting_since = Instant::now();
        }
    }

    fn tick_tcp(&mut self) {
        let fc_token = self.fc_token;
        let mut outcomes = Vec::new();
        self.tcp.poll_with(|event| match event {
            PollEvent::Accept { stream, .. } if stream == fc_token => outcomes.push(TcpOutcome::Connected),
            PollEvent::Disconnect { token } if token == fc_token => outcomes.push(TcpOutcome::Disconnected),
            PollEvent::Message { token, payload, recv_ts } if token == fc_token => {
                outcomes.push(TcpOutcome::Message { payload: payload.to_vec(), recv_ns: recv_ts });
            }
            _ => {}
        });

        for outcome in outcomes {
            match outcome {
                TcpOutcome::Connected => {
                    self.state = ConnectionState::Connected;
                    self.last_tcp_activity = Instant::now();
                    info!(addr = %self.config.fc_addr, "connected to flight computer");
                }
                TcpOutcome::Disconnected => self.handle_transport_reset("flight computer connection lost"),
                TcpOutcome::Message { payload, recv_ns } => {
                    self.last_tcp_activity = Instant::now();
                    self.dispatch_tcp_message(&payload, recv_ns);
                }
            }
        }
    }

    fn tick_read_idle_watchdog(&mut self) {
        if self.state == ConnectionState::Connected && self.last_tcp_activity.elapsed() > self.config.read_idle_timeout {
            warn!(timeout = ?self.config.read_idle_timeout, "tcp read idle timeout, treating as a reset");
            self.tcp.disconnect(self.fc_token);
            self.handle_transport_reset("read idle timeout");
        }
    }

    /// Dispatches one decoded TCP payload (spec §4.7 "TCP reader"). Codec
    /// errors escalate to a reconnect: the sender's state is untrusted once
    /// a malformed frame is observed (spec §7).
    fn dispatch_tcp_message(&mut self, payload: &[u8], recv_ns: u64) {
        match WireMessage::decode(payload) {
            Ok(message @ WireMessage::ValveState { .. }) => self.queue.push(QueueEntry { message, recv_ns }),
            Ok(WireMessage::Heartbeat) => debug!("heartbeat acknowledged by flight computer"),
            Ok(other) => warn!(?other, "tcp reader: unexpected message variant, discarding"),
            Err(err) => {
                warn!(?err, "tcp reader: malformed message, connection is untrusted, reconnecting");
                self.tcp.disconnect(self.fc_token);
                self.handle_transport_reset("malformed tcp message");
            }
        }
    }

    fn handle_transport_reset(&mut self, reason: &str) {
        warn!(reason, "session reset, returning to connecting state");
        self.state = ConnectionState::Connecting;
        self.connecting_since = Instant::now();
    }

    /// UDP reader task (spec §4.7): enqueues each decoded Telemetry
    /// datagram with its receive timestamp. When the supervisor was
    /// started with `--overwrite-timestamps`, the board's own wire
    /// timestamp is replaced with the receive wall-clock before enqueue.
    fn tick_udp(&mut self) {
        let overwrite = self.config.overwrite_timestamps;
        let mut decoded = Vec::new();
        self.udp.poll_recv(|_peer, payload| match WireMessage::decode(payload) {
            Ok(WireMessage::Telemetry { board, timestamp_ns, values }) => {
                let recv_ns = now_ns();
                let timestamp_ns = if overwrite { recv_ns } else { timestamp_ns };
                decoded.push((WireMessage::Telemetry { board, timestamp_ns, values }, recv_ns));
            }
            Ok(other) => warn!(?other, "udp reader: unexpected message variant, dropping"),
            Err(err) => warn!(?err, "udp reader: malformed datagram, dropping"),
        });

        for (message, recv_ns) in decoded {
            self.queue.push(QueueEntry { message, recv_ns });
        }
    }

    fn ensure_writer_open(&mut self) {
        if !self.writer_open {
            match self.store.open_writer() {
                Ok(()) => self.writer_open = true,
                Err(err) => warn!(?err, "failed to open store writer"),
            }
        }
    }

    /// Writer task (spec §4.7): builds a frame from each queued message,
    /// stamps per-message latency, and appends it to the store. A
    /// validation error closes and nulls the writer and requests a
    /// clock-resync; the next message reopens the writer (spec §4.6,
    /// §4.12).
    fn drain_queue(&mut self) {
        while let Some(entry) = self.queue.pop() {
            self.process_queue_entry(entry);
        }
    }

    fn process_queue_entry(&mut self, entry: QueueEntry) {
        let kind = match &entry.message {
            WireMessage::Telemetry { .. } => "telemetry",
            WireMessage::ValveState { .. } => "valve_state",
            _ => return,
        };

        match build_frame(&self.channel_map, &entry.message) {
            Ok(Some(mut frame)) => {
                let now = now_ns();
                let latency_ns = now.saturating_sub(entry.recv_ns);
                frame.insert(format!("limewire_{kind}_latency"), FrameValue::Float32(latency_ns as f32));
                frame.insert(format!("limewire_{kind}_latency_timestamp"), FrameValue::Timestamp(now));
                self.write_frame(frame);
            }
            Ok(None) => {}
            Err(err) => warn!(?err, "dropping frame: schema mismatch or unknown board"),
        }
    }

    fn write_frame(&mut self, frame: Frame) {
        self.ensure_writer_open();
        if let Err(err) = self.store.write(&frame) {
            warn!(?err, "store rejected frame, reopening writer and requesting clock resync");
            self.writer_open = false;
            info!("clock-resync requested");
        }
    }

    /// Command relay task (spec §4.7): for each newest-wins command update
    /// delivered by the store subscription, translate the channel name back
    /// into a wire valve identifier and forward it; also records a
    /// `limewire_valve_command_latency` sample per command emitted.
    fn relay_commands(&mut self) {
        let updates = self.store.poll_command_updates();
        for update in updates {
            match Valve::from_channel_name(&update.channel) {
                Ok(valve) => {
                    let state = update.value != 0;
                    self.tcp.write_or_enqueue_with(SendBehavior::Single(self.fc_token), move |buf| {
                        buf.extend_from_slice(&WireMessage::ValveCommand { valve, state }.encode());
                    });

                    let now = now_ns();
                    let latency_ns = now.saturating_sub(update.queued_ns);
                    let mut frame = Frame::new();
                    frame.insert("limewire_valve_command_latency".to_string(), FrameValue::Float32(latency_ns as f32));
                    frame.insert("limewire_valve_command_latency_timestamp".to_string(), FrameValue::Timestamp(now));
                    self.write_frame(frame);
                }
                Err(err) => warn!(?err, channel = %update.channel, "command relay: not a valve channel name"),
            }
        }
    }

    /// Handoff relay task (spec §4.7, optional): forwards a Handoff message
    /// when a value arrives on the distinguished control channel.
    fn relay_handoff(&mut self) {
        let Some(signal_byte) = self.store.poll_handoff() else { return };
        let signal = match signal_byte {
            0 => ControlSignal::Abort,
            1 => ControlSignal::Handoff,
            other => {
                warn!(signal = other, "handoff relay: invalid control signal byte, dropping");
                return;
            }
        };
        self.tcp.write_or_enqueue_with(SendBehavior::Single(self.fc_token), move |buf| {
            buf.extend_from_slice(&WireMessage::Handoff { signal }.encode());
        });
    }

    /// Heartbeat task (spec §4.7): sends a Heartbeat every configured
    /// interval and logs queue depth. A send failure is treated as a reset
    /// via the ordinary TCP write path (the connector surfaces it as a
    /// `Disconnect` event on the next tick).
    fn tick_heartbeat(&mut self) {
        if !self.heartbeat.fired() {
            return;
        }
        if self.state == ConnectionState::Connected {
            self.tcp.write_or_enqueue_with(SendBehavior::Single(self.fc_token), |buf| {
                buf.extend_from_slice(&WireMessage::Heartbeat.encode());
            });
        }
        debug!(queue_depth = self.queue.len(), dropped_total = self.queue.dropped_total(), state = ?self.state, "heartbeat tick");
    }

    /// Releases the TCP connection on shutdown (spec §5: "the supervisor's
    /// lifespan guard closes the TCP framer and the store writer
    /// unconditionally on teardown").
    pub fn shutdown(&mut self) {
        self.tcp.disconnect(self.fc_token);
        self.writer_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limewire_store::MockStore;
    use std::net::SocketAddr;

    fn free_loopback_addr() -> SocketAddr {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    }

    fn sample_channel_map() -> ChannelMap {
        ChannelMap::from_json_str(
            r#"{"fc_timestamp": ["fc_pt1", "fc_limewire_write_time", "fc_vlv_1", "fc_state_1"]}"#,
        )
        .unwrap()
    }

    fn test_config(fc_addr: SocketAddr) -> SupervisorConfig {
        SupervisorConfig {
            fc_addr,
            telemetry_udp_addr: "127.0.0.1:0".parse().unwrap(),
            overwrite_timestamps: false,
            heartbeat_interval: Duration::from_millis(50),
            read_idle_timeout: Duration::from_secs(5),
            dial_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_millis(100),
            queue_capacity: 16,
        }
    }

    #[test]
    fn starts_connecting_and_subscribes_to_command_channels() {
        let addr = free_loopback_addr();
        let sup = Supervisor::new(test_config(addr), sample_channel_map(), MockStore::new(vec![])).unwrap();
        assert_eq!(sup.state(), ConnectionState::Connecting);
    }

    #[test]
    fn reaches_connected_once_fc_listener_accepts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut sup = Supervisor::new(test_config(addr), sample_channel_map(), MockStore::new(vec![])).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while sup.state() != ConnectionState::Connected && Instant::now() < deadline {
            sup.poll_once();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sup.state(), ConnectionState::Connected);
        drop(listener);
    }

    #[test]
    fn malformed_command_channel_name_is_dropped_without_panicking() {
        let addr = free_loopback_addr();
        let mut sup = Supervisor::new(test_config(addr), sample_channel_map(), MockStore::new(vec!["fc_vlv_1".to_string()])).unwrap();
        sup.store_mut().subscribe_command_channels(vec!["fc_vlv_1".to_string()]);
        sup.store_mut().push_command_update("fc_vlv_1", 1, 0);
        sup.relay_commands();
    }
}
