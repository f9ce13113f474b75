use std::{
    io::{self},
    net::SocketAddr,
    time::Duration,
};

use mio::{Events, Interest, Poll, Token, net::UdpSocket};
use tracing::warn;

const MAX_DATAGRAM: usize = 4 * 1024;
const UDP_TOKEN: Token = Token(0);

/// Non-blocking UDP datagram framer (spec §4.3).
///
/// Each datagram carries a one-byte length prefix followed by exactly that
/// many message bytes. Unlike the TCP framer, a socket can both send and
/// receive without a connection handshake, so `UdpFramer` owns a single
/// `mio::net::UdpSocket` registered against its own `Poll`.
///
/// Datagrams whose length prefix disagrees with the body length are dropped
/// with a logged warning and do not interrupt the receive loop; out-of-order
/// datagrams are accepted as-is, with no reassembly.
pub struct UdpFramer {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
    recv_buf: Vec<u8>,
}

impl UdpFramer {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let mut socket = UdpSocket::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut socket, UDP_TOKEN, Interest::READABLE)?;
        Ok(Self { socket, poll, events: Events::with_capacity(32), recv_buf: vec![0; MAX_DATAGRAM] })
    }

    pub fn set_broadcast(&self, on: bool) -> io::Result<()> {
        self.socket.set_broadcast(on)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serialises `msg` via `serialise` and sends it as one length-prefixed
    /// datagram to `addr`. Silently drops the datagram (with a warning) if
    /// the payload exceeds 255 bytes, since the length prefix is one byte.
    pub fn send_to<F>(&self, addr: SocketAddr, serialise: F) -> io::Result<()>
    where
        F: Fn(&mut Vec<u8>),
    {
        let mut payload = Vec::new();
        serialise(&mut payload);
        if payload.len() > u8::MAX as usize {
            warn!(len = payload.len(), "udp: payload too large for one-byte length prefix, dropping");
            return Ok(());
        }
        let mut datagram = Vec::with_capacity(1 + payload.len());
        datagram.push(payload.len() as u8);
        datagram.extend_from_slice(&payload);
        self.socket.send_to(&datagram, addr)?;
        Ok(())
    }

    /// Polls for incoming datagrams (zero-timeout, non-blocking) and calls
    /// `on_msg` once per well-formed datagram. Malformed datagrams (prefix
    /// disagreeing with body length) are dropped with a warning; this never
    /// terminates the poll.
    pub fn poll_recv<F>(&mut self, mut on_msg: F)
    where
        F: FnMut(SocketAddr, &[u8]),
    {
        if let Err(err) = self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            warn!(?err, "udp: poll error");
            return;
        }
        if self.events.is_empty() {
            return;
        }

        loop {
            match self.socket.recv_from(&mut self.recv_buf) {
                Ok((len, peer)) => self.dispatch_datagram(peer, len, &mut on_msg),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(?err, "udp: recv error");
                    break;
                }
            }
        }
    }

    fn dispatch_datagram<F>(&self, peer: SocketAddr, len: usize, on_msg: &mut F)
    where
        F: FnMut(SocketAddr, &[u8]),
    {
        if len == 0 {
            warn!("udp: empty datagram from {peer}, dropping");
            return;
        }
        let prefix = self.recv_buf[0] as usize;
        let body = &self.recv_buf[1..len];
        if prefix != body.len() {
            warn!(prefix, body_len = body.len(), %peer, "udp: length prefix mismatch, dropping datagram");
            return;
        }
        on_msg(peer, body);
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
    fn round_trips_a_datagram() {
        let mut a = UdpFramer::bind(loopback(0)).unwrap();
        let b = UdpFramer::bind(loopback(0)).unwrap();
        let a_addr = a.local_addr().unwrap();

        b.send_to(a_addr, |buf| buf.extend_from_slice(b"hello")).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let mut received = None;
        a.poll_recv(|_peer, payload| received = Some(payload.to_vec()));
        assert_eq!(received.unwrap(), b"hello");
    }

    #[test]
    fn drops_mismatched_length_prefix_without_crashing() {
        let mut a = UdpFramer::bind(loopback(0)).unwrap();
        let a_addr = a.local_addr().unwrap();
        let sender = UdpSocket::bind(loopback(0)).unwrap();
        // length prefix says 10 but only 2 bytes follow.
        sender.send_to(&[10, 1, 2], a_addr).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let mut called = false;
        a.poll_recv(|_peer, _payload| called = true);
        assert!(!called);
    }
}
