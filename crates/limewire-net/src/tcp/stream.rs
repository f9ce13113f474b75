use std::{
    collections::VecDeque,
    io::{self, IoSlice, Read, Write},
    net::SocketAddr,
    time::{SystemTime, UNIX_EPOCH},
};

use mio::{Interest, Registry, Token, event::Event};
use tracing::{debug, warn};

/// Frame length prefix: one byte, the length of the message (including
/// MSG_ID) that follows. Spec §4.2.
const LEN_HEADER_SIZE: usize = 1;
const RX_BUF_SIZE: usize = 4 * 1024;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_nanos() as u64
}

/// Response type for all external calls.
///
/// `Alive` means the connection is still usable.
/// `Disconnected` means the peer is gone and the connection must be rebuilt.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

enum ReadOutcome<'a> {
    PayloadDone { frame: &'a [u8], recv_ts: u64 },
    WouldBlock,
    Disconnected,
}

#[derive(Clone, Copy)]
enum RxState {
    /// Waiting for the single length byte.
    ReadingHeader,
    /// Reading the payload of `msg_len` bytes.
    ReadingPayload { msg_len: usize, offset: usize },
}

/// Single mio-backed TCP connection, framed per spec §4.2:
///   - 1-byte length header (length of the message including MSG_ID)
///   - payload bytes
///
/// Outbound:
///   - `write_or_enqueue_with(msg)` serialises `msg` into an internal staging
///     buffer, then attempts a non-blocking write.
///   - Any unwritten remainder is queued (this path allocates).
///   - Backlogged frames are flushed whenever the socket becomes writable.
///
/// Inbound:
///   - Reads the length byte, then reads exactly that many more bytes.
///   - When a full frame is assembled, `poll_with` invokes the caller
///     callback with the decoded bytes.
///   - Continues reading frames until `WouldBlock`.
///
/// Reconnect handling:
///   - If `ConnState::Disconnected` is returned, the caller must treat the
///     connection as dead and rebuild the state (this is what
///     [`super::connector::TcpConnector`] does for outbound connections).
pub struct TcpStream {
    stream: mio::net::TcpStream,
    peer_addr: SocketAddr,
    token: Token,

    rx_state: RxState,
    rx_buf: Vec<u8>,
    send_buf: Vec<u8>,
    /// Filled when send would block. First entry will either be a full
    /// message or the current partially written head.
    send_backlog: VecDeque<Vec<u8>>,

    /// True if WRITABLE interest is currently registered.
    /// Invariant: `writable_armed == !send_backlog.is_empty()`
    writable_armed: bool,
}

impl TcpStream {
    pub const SEND_BUF_SIZE: usize = 4 * 1024;

    pub(crate) fn from_stream(
        stream: mio::net::TcpStream,
        peer_addr: SocketAddr,
        token: Token,
    ) -> io::Result<Self> {
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            peer_addr,
            token,
            rx_state: RxState::ReadingHeader,
            rx_buf: vec![0; RX_BUF_SIZE],
            send_buf: Vec::with_capacity(Self::SEND_BUF_SIZE),
            send_backlog: VecDeque::with_capacity(8),
            writable_armed: false,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Poll socket and call `on_msg` for every fully assembled frame.
    /// Frame data is only valid for the duration of the callback.
    pub fn poll_with<F>(&mut self, registry: &Registry, ev: &Event, on_msg: &mut F) -> ConnState
    where
        F: for<'a> FnMut(Token, &'a [u8], u64),
    {
        if ev.is_readable() {
            loop {
                match self.read_frame() {
                    ReadOutcome::PayloadDone { frame, recv_ts } => {
                        on_msg(self.token, frame, recv_ts);
                    }
                    ReadOutcome::WouldBlock => break,
                    ReadOutcome::Disconnected => return ConnState::Disconnected,
                }
            }
        }

        if ev.is_writable() && self.drain_backlog(registry) == ConnState::Disconnected {
            return ConnState::Disconnected;
        }

        ConnState::Alive
    }

    /// Happy path: serialises into `self.send_buf`, writes the frame to the
    /// stream. If the write would block, or a previous write already
    /// blocked, the remainder is queued to be flushed on the next writable
    /// event.
    pub fn write_or_enqueue_with<F>(&mut self, registry: &Registry, serialise: F) -> ConnState
    where
        F: Fn(&mut Vec<u8>),
    {
        let Some(frame) = self.serialise_frame(serialise) else {
            warn!("tcp: message too large for a one-byte length prefix, dropping");
            return ConnState::Alive;
        };

        if !self.send_backlog.is_empty() {
            return self.enqueue_back(registry, frame);
        }

        match self.stream.write(&frame) {
            Ok(0) => {
                warn!("tcp: stream failed to write, disconnecting");
                ConnState::Disconnected
            }
            Ok(n) if n == frame.len() => ConnState::Alive,
            Ok(n) => {
                let remainder = frame[n..].to_vec();
                self.enqueue_front(registry, remainder)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.enqueue_back(registry, frame)
            }
            Err(err) => {
                warn!(?err, "tcp: stream write fail");
                ConnState::Disconnected
            }
        }
    }

    /// Flush queued data until the kernel blocks or the queue is empty.
    fn drain_backlog(&mut self, registry: &Registry) -> ConnState {
        while let Some(front) = self.send_backlog.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) => {
                    if n == front.len() {
                        self.send_backlog.pop_front();
                    } else {
                        front.drain(..n);
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(?err, "tcp: write from backlog");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.send_backlog.is_empty() && self.writable_armed {
            if let Err(err) = registry.reregister(&mut self.stream, self.token, Interest::READABLE)
            {
                debug!(?err, "tcp: reregister drop writable");
                return ConnState::Disconnected;
            }
            self.writable_armed = false;
        }

        ConnState::Alive
    }

    /// Read a single complete frame if present. Loops until a frame is
    /// received or reading would block.
    ///
    /// Per spec §4.2: a zero-byte read exactly at a record boundary (header
    /// not yet started) is end-of-stream, not an error; either way the
    /// caller treats it as a disconnect and rebuilds the connection.
    fn read_frame(&mut self) -> ReadOutcome<'_> {
        loop {
            match self.rx_state {
                RxState::ReadingHeader => {
                    let mut len_byte = [0u8; LEN_HEADER_SIZE];
                    match self.stream.read(&mut len_byte) {
                        Ok(0) => return ReadOutcome::Disconnected,
                        Ok(_) => {
                            let msg_len = len_byte[0] as usize;
                            if msg_len > self.rx_buf.len() {
                                self.rx_buf.resize(msg_len, 0);
                            }
                            self.rx_state = RxState::ReadingPayload { msg_len, offset: 0 };
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                            return ReadOutcome::WouldBlock;
                        }
                        Err(err) => {
                            debug!(?err, "tcp: read header");
                            return ReadOutcome::Disconnected;
                        }
                    }
                }

                RxState::ReadingPayload { msg_len, mut offset } => {
                    if msg_len == 0 {
                        self.rx_state = RxState::ReadingHeader;
                        return ReadOutcome::PayloadDone { frame: &[], recv_ts: now_ns() };
                    }
                    while offset < msg_len {
                        match self.stream.read(&mut self.rx_buf[offset..msg_len]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => {
                                offset += n;
                                if offset == msg_len {
                                    self.rx_state = RxState::ReadingHeader;
                                    return ReadOutcome::PayloadDone {
                                        frame: &self.rx_buf[..msg_len],
                                        recv_ts: now_ns(),
                                    };
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                self.rx_state = RxState::ReadingPayload { msg_len, offset };
                                return ReadOutcome::WouldBlock;
                            }
                            Err(err) => {
                                debug!(?err, "tcp: read payload");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }
                }
            }
        }
    }

    fn enqueue_front(&mut self, registry: &Registry, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_front(data);
        self.arm_writable(registry)
    }

    fn enqueue_back(&mut self, registry: &Registry, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_back(data);
        self.arm_writable(registry)
    }

    /// Arm WRITABLE notifications when transitioning from empty -> non-empty
    /// backlog.
    fn arm_writable(&mut self, registry: &Registry) -> ConnState {
        if !self.writable_armed {
            if let Err(err) = registry.reregister(
                &mut self.stream,
                self.token,
                Interest::READABLE | Interest::WRITABLE,
            ) {
                debug!(?err, "tcp: poll reregister");
                return ConnState::Disconnected;
            }
            self.writable_armed = true;
        }
        ConnState::Alive
    }

    /// Serialise payload into the send buffer and prepend the length byte.
    /// Returns `None` if the serialised payload exceeds 255 bytes (the
    /// largest value a one-byte length prefix can express).
    fn serialise_frame<F>(&mut self, serialise: F) -> Option<Vec<u8>>
    where
        F: Fn(&mut Vec<u8>),
    {
        self.send_buf.clear();
        serialise(&mut self.send_buf);
        if self.send_buf.len() > u8::MAX as usize {
            return None;
        }
        let mut frame = Vec::with_capacity(1 + self.send_buf.len());
        frame.push(self.send_buf.len() as u8);
        frame.extend_from_slice(&self.send_buf);
        Some(frame)
    }

    pub fn close(&mut self, registry: &Registry) -> SocketAddr {
        debug!("terminating connection");
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        self.peer_addr
    }
}
