//! Non-blocking TCP and UDP framers for the limewire ground bridge.

mod repeater;
pub mod tcp;
mod udp;

pub use repeater::Repeater;
pub use tcp::{ConnState, PollEvent, SendBehavior, TcpConnector, TcpStream};
pub use udp::UdpFramer;
