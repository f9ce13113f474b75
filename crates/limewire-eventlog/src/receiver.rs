use std::{io, net::SocketAddr, time::Duration};

use mio::{Events, Interest, Poll, Token, net::UdpSocket};
use tracing::warn;

use crate::record::{parse_line, FirmwareLogRecord};

const MAX_DATAGRAM: usize = 2 * 1024;
const TOKEN: Token = Token(0);

/// Listens on a UDP port for firmware event-log lines (spec §4.10). Each
/// datagram is one ASCII line; decode failures are dropped with a logged
/// warning rather than terminating the receive loop.
pub struct EventLogReceiver {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
    buf: Vec<u8>,
}

impl EventLogReceiver {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let mut socket = UdpSocket::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut socket, TOKEN, Interest::READABLE)?;
        Ok(Self { socket, poll, events: Events::with_capacity(32), buf: vec![0; MAX_DATAGRAM] })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Polls for incoming datagrams (zero-timeout, non-blocking) and calls
    /// `on_record` once per successfully parsed line.
    pub fn poll_recv<F>(&mut self, mut on_record: F)
    where
        F: FnMut(FirmwareLogRecord),
    {
        if let Err(err) = self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            warn!(?err, "eventlog: poll error");
            return;
        }
        if self.events.is_empty() {
            return;
        }

        loop {
            match self.socket.recv_from(&mut self.buf) {
                Ok((len, peer)) => match parse_line(&self.buf[..len]) {
                    Ok(record) => on_record(record),
                    Err(err) => warn!(?err, %peer, "eventlog: dropping malformed line"),
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(?err, "eventlog: recv error");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn receives_and_parses_a_line() {
        let mut receiver = EventLogReceiver::bind(loopback(0)).unwrap();
        let addr = receiver.local_addr().unwrap();
        let sender = std::net::UdpSocket::bind(loopback(0)).unwrap();
        sender.send_to(b"0004 telemetry resumed", addr).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let mut got = None;
        receiver.poll_recv(|record| got = Some(record));
        let record = got.expect("expected a record");
        assert_eq!(record.message, "telemetry resumed");
    }

    #[test]
    fn drops_malformed_line_without_crashing() {
        let mut receiver = EventLogReceiver::bind(loopback(0)).unwrap();
        let addr = receiver.local_addr().unwrap();
        let sender = std::net::UdpSocket::bind(loopback(0)).unwrap();
        sender.send_to(b"9999 bad code", addr).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let mut called = false;
        receiver.poll_recv(|_| called = true);
        assert!(!called);
    }
}
