use std::{net::SocketAddr, time::Duration};

use mio::{Events, Interest, Poll, Token, event::Event, net::TcpListener};
use tracing::{debug, error, warn};

use crate::repeater::Repeater;

use super::stream::{ConnState, TcpStream};

#[derive(Clone, Copy, Debug)]
pub enum SendBehavior {
    Broadcast,
    Single(Token),
}

/// Outbound connections are reconnected on failure; inbound are not.
enum ConnectionVariant {
    /// Connections we initiated; scheduled for reconnection on failure.
    Outbound(TcpStream),
    /// Connections accepted through one of our listeners.
    Inbound(TcpStream),
    /// Listens for new connections; accepted streams become `Inbound`.
    Listener(TcpListener),
}

/// Event emitted by [`TcpConnector::poll_with`] for each notable IO occurrence.
pub enum PollEvent<'a> {
    /// A new connection was accepted from a listener.
    Accept { listener: Token, stream: Token, peer_addr: SocketAddr },
    /// A connection was closed (by the remote or due to an IO error).
    Disconnect { token: Token },
    /// A complete framed message was received.
    Message { token: Token, payload: &'a [u8], recv_ts: u64 },
}

struct ConnectionManager {
    poll: Poll,
    conns: Vec<(Token, ConnectionVariant)>,
    reconnector: Repeater,
    on_connect_msg: Option<Vec<u8>>,

    // Always only outbound/client side connection streams.
    to_be_reconnected: Vec<(Token, SocketAddr)>,
    // Outbound connections that completed during maybe_reconnect, drained in poll_with.
    newly_connected: Vec<(Token, SocketAddr)>,
    next_token: usize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            conns: Vec::with_capacity(5),
            reconnector: Repeater::every(Duration::from_secs(2)),
            on_connect_msg: None,
            to_be_reconnected: Vec::with_capacity(10),
            newly_connected: Vec::with_capacity(10),
            poll: Poll::new().expect("couldn't set up a poll for tcp connector"),
            next_token: 0,
        }
    }
}

impl ConnectionManager {
    fn disconnect_all_outbound(&mut self) {
        let mut i = self.conns.len();
        while i != 0 {
            i -= 1;
            if matches!(self.conns[i].1, ConnectionVariant::Outbound(_)) {
                self.disconnect_at_index(i);
            }
        }
    }

    fn disconnect_at_index(&mut self, index: usize) {
        let (token, variant) = self.conns.swap_remove(index);
        match variant {
            ConnectionVariant::Outbound(mut tcp_connection) => {
                let addr = tcp_connection.close(self.poll.registry());
                self.to_be_reconnected.push((token, addr));
            }
            ConnectionVariant::Inbound(mut tcp_connection) => {
                let _ = tcp_connection.close(self.poll.registry());
            }
            ConnectionVariant::Listener(mut tcp_listener) => {
                let _ = self.poll.registry().deregister(&mut tcp_listener);
            }
        }
    }

    fn disconnect_token(&mut self, token: Token) {
        if let Some(i) = self.conns.iter().position(|(t, _)| *t == token) {
            self.disconnect_at_index(i);
        }
    }

    fn broadcast<F>(&mut self, serialise: &F)
    where
        F: Fn(&mut Vec<u8>),
    {
        let mut i = self.conns.len();
        while i != 0 {
            i -= 1;
            match &mut self.conns[i].1 {
                ConnectionVariant::Outbound(tcp_connection) | ConnectionVariant::Inbound(tcp_connection) => {
                    if tcp_connection.write_or_enqueue_with(self.poll.registry(), serialise)
                        == ConnState::Disconnected
                    {
                        self.disconnect_at_index(i);
                    }
                }
                ConnectionVariant::Listener(_) => {}
            }
        }
    }

    fn write_or_enqueue_with<F>(&mut self, serialise: F, where_to: SendBehavior)
    where
        F: Fn(&mut Vec<u8>),
    {
        match where_to {
            SendBehavior::Broadcast => self.broadcast(&serialise),
            SendBehavior::Single(token) => {
                if let Some(i) = self.conns.iter().position(|(t, _)| *t == token) {
                    match &mut self.conns[i].1 {
                        ConnectionVariant::Outbound(tcp_connection)
                        | ConnectionVariant::Inbound(tcp_connection) => {
                            if tcp_connection.write_or_enqueue_with(self.poll.registry(), serialise)
                                == ConnState::Disconnected
                            {
                                warn!("issue when writing to {token:?}, disconnecting");
                                self.disconnect_at_index(i);
                            }
                        }
                        ConnectionVariant::Listener(_) => {
                            error!("cannot write to listener bound to token {token:?}");
                        }
                    }
                } else {
                    error!("tcp sending: unknown token {token:?}");
                }
            }
        }
    }

    fn connect(&mut self, addr: SocketAddr) -> Option<Token> {
        let token = Token(self.next_token);
        self.to_be_reconnected.push((token, addr));
        self.reconnector.force_fire();
        self.maybe_reconnect();
        if self.conns.iter().any(|(t, _)| t == &token) {
            self.next_token += 1;
            Some(token)
        } else {
            None
        }
    }

    /// Starts listening on `addr`, returning the token tied to that port.
    fn listen_at(&mut self, addr: SocketAddr) -> Option<Token> {
        let mut listener = mio::net::TcpListener::bind(addr)
            .inspect_err(|e| warn!("couldn't start listening at {addr:?}: {e}"))
            .ok()?;
        let token = Token(self.next_token);
        self.poll
            .registry()
            .register(&mut listener, token, Interest::READABLE)
            .inspect_err(|err| warn!("couldn't register listening addr {addr:?}: {err}"))
            .ok()?;
        self.conns.push((token, ConnectionVariant::Listener(listener)));
        self.next_token += 1;
        Some(token)
    }

    fn maybe_reconnect(&mut self) {
        if !self.reconnector.fired() {
            return;
        }

        let mut i = self.to_be_reconnected.len();
        while i != 0 {
            i -= 1;
            let (token, addr) = self.to_be_reconnected[i];
            let Ok(mut stream) =
                mio::net::TcpStream::connect(addr).inspect_err(|e| warn!("couldn't connect to {addr}: {e}"))
            else {
                continue;
            };
            let Ok(err) = stream.take_error().inspect_err(|e| error!("couldn't take error on stream: {e}"))
            else {
                continue;
            };
            if let Some(err) = err {
                warn!("got error while connecting to {addr}: {err}");
                continue;
            }
            if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                error!("couldn't register tcp stream for {addr} with registry: {e}");
                continue;
            }
            let Ok(mut conn) = TcpStream::from_stream(stream, addr, token)
                .inspect_err(|e| error!("couldn't construct tcp stream for {addr}: {e}"))
            else {
                continue;
            };
            if let Some(msg) = &self.on_connect_msg {
                if conn.write_or_enqueue_with(self.poll.registry(), |buf: &mut Vec<u8>| {
                    buf.extend_from_slice(msg);
                }) == ConnState::Disconnected
                {
                    warn!(?addr, "on_connect_msg send failed");
                    continue;
                }
            }

            self.newly_connected.push(self.to_be_reconnected.swap_remove(i));
            self.conns.push((token, ConnectionVariant::Outbound(conn)));
            debug!(?addr, "connected");
        }
    }

    fn currently_disconnected(&self) -> impl Iterator<Item = Token> + '_ {
        self.to_be_reconnected.iter().map(|(t, _)| *t)
    }

    fn force_reconnect(&mut self) {
        self.reconnector.reset();
        self.maybe_reconnect();
    }

    fn handle_event<F>(&mut self, e: &Event, handler: &mut F)
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        let event_token = e.token();
        let Some(stream_id) = self.conns.iter().position(|(t, _)| t == &event_token) else {
            debug!(?event_token, "got event for unknown token");
            return;
        };

        loop {
            match &mut self.conns[stream_id].1 {
                ConnectionVariant::Outbound(tcp_connection) | ConnectionVariant::Inbound(tcp_connection) => {
                    if tcp_connection.poll_with(self.poll.registry(), e, &mut |token, payload, recv_ts| {
                        handler(PollEvent::Message { token, payload, recv_ts });
                    }) == ConnState::Disconnected
                    {
                        handler(PollEvent::Disconnect { token: event_token });
                        self.disconnect_at_index(stream_id);
                    }
                    return;
                }
                ConnectionVariant::Listener(tcp_listener) => {
                    if let Ok((mut stream, addr)) = tcp_listener.accept() {
                        tracing::info!(?addr, "client connected");
                        let token = Token(self.next_token);
                        if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                            error!("couldn't register client: {e}");
                            let _ = stream.shutdown(std::net::Shutdown::Both);
                            continue;
                        }
                        let Ok(mut conn) = TcpStream::from_stream(stream, addr, token) else {
                            continue;
                        };

                        if let Some(msg) = &self.on_connect_msg {
                            if conn.write_or_enqueue_with(self.poll.registry(), |buf: &mut Vec<u8>| {
                                buf.extend_from_slice(msg);
                            }) == ConnState::Disconnected
                            {
                                continue;
                            }
                        }
                        handler(PollEvent::Accept { listener: event_token, stream: token, peer_addr: addr });
                        self.conns.push((token, ConnectionVariant::Inbound(conn)));
                        self.next_token += 1;
                    } else {
                        return;
                    }
                }
            }
        }
    }
}

/// Non-blocking TCP connector/acceptor built on `mio`.
///
/// Manages:
/// - **Outbound (client) connections** created via [`connect`](Self::connect).
///   These are **auto-retried** on failure/disconnect at the configured
///   reconnect interval.
/// - **Listeners** created via [`listen_at`](Self::listen_at) and **inbound
///   (server) connections** accepted from them. Inbound connections are
///   **not** reconnected.
///
/// Drive all IO by calling [`poll_with`](Self::poll_with) regularly
/// (typically in your event loop). Use
/// [`write_or_enqueue_with`](Self::write_or_enqueue_with) to send to one
/// connection or broadcast to all.
pub struct TcpConnector {
    events: Events,
    conn_mgr: ConnectionManager,
}

impl Default for TcpConnector {
    /// Creates a new connector. The default outbound reconnect interval is
    /// 2 seconds.
    fn default() -> Self {
        Self { events: Events::with_capacity(128), conn_mgr: ConnectionManager::default() }
    }
}

impl TcpConnector {
    /// Sets the interval used to retry disconnected/failed outbound
    /// connections.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.conn_mgr.reconnector = Repeater::every(interval);
        self
    }

    /// Sends this message once immediately after a connection becomes
    /// usable (outbound after (re)connect, inbound right after accept).
    ///
    /// # Panics
    /// Panics if `msg.len() > TcpStream::SEND_BUF_SIZE`.
    pub fn with_on_connect_msg(mut self, msg: Vec<u8>) -> Self {
        assert!(msg.len() <= TcpStream::SEND_BUF_SIZE, "on_connect_msg exceeds send buffer size");
        self.conn_mgr.on_connect_msg = Some(msg);
        self
    }

    /// Polls sockets once (non-blocking) and dispatches events via
    /// [`PollEvent`].
    ///
    /// This call: 1) attempts outbound reconnects if the interval fired, 2)
    /// polls `mio` with a zero timeout, 3) for each event calls `handler`
    /// with the appropriate [`PollEvent`], and 4) returns whether any IO
    /// events were processed.
    pub fn poll_with<F>(&mut self, mut handler: F) -> bool
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        self.conn_mgr.maybe_reconnect();
        for (token, peer_addr) in self.conn_mgr.newly_connected.drain(..) {
            handler(PollEvent::Accept { listener: token, stream: token, peer_addr });
        }
        if let Err(e) = self.conn_mgr.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            error!("got error polling: {e}");
            return false;
        }

        let mut any = false;
        for e in self.events.iter() {
            any = true;
            self.conn_mgr.handle_event(e, &mut handler);
        }
        any
    }

    /// Writes immediately or enqueues bytes for later sending.
    pub fn write_or_enqueue_with<F>(&mut self, where_to: SendBehavior, serialise: F)
    where
        F: Fn(&mut Vec<u8>),
    {
        self.conn_mgr.write_or_enqueue_with(serialise, where_to);
    }

    /// Disconnects all outbound connections and schedules them for
    /// reconnection. Inbound connections and listeners are untouched.
    pub fn disconnect_outbound(&mut self) {
        self.conn_mgr.disconnect_all_outbound();
    }

    /// Disconnects a specific connection by token. Outbound connections are
    /// scheduled for reconnection; inbound are simply closed. No-op if the
    /// token is not found.
    pub fn disconnect(&mut self, token: Token) {
        self.conn_mgr.disconnect_token(token);
    }

    /// Initiates (or schedules) an outbound connection to `addr`. Returns
    /// the token for this connection if it becomes established immediately;
    /// otherwise `None` (the connector may still retry later).
    pub fn connect(&mut self, addr: SocketAddr) -> Option<Token> {
        self.conn_mgr.connect(addr)
    }

    /// Starts listening on `addr`. Returns the token associated with the
    /// listener socket.
    pub fn listen_at(&mut self, addr: SocketAddr) -> Option<Token> {
        self.conn_mgr.listen_at(addr)
    }

    /// Tokens currently pending reconnection (outbound only).
    pub fn currently_disconnected(&self) -> impl Iterator<Item = Token> + '_ {
        self.conn_mgr.currently_disconnected()
    }

    /// Forces the reconnect timer to fire and immediately attempts
    /// reconnections.
    pub fn force_reconnect(&mut self) {
        self.conn_mgr.force_reconnect();
    }
}
