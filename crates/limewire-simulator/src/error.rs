use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("invalid listen address {0:?}: {1}")]
    InvalidListenAddress(String, std::net::AddrParseError),
    #[error("invalid telemetry udp target {0:?}: {1}")]
    InvalidUdpTarget(String, std::net::AddrParseError),
    #[error("failed to bind tcp listener on {addr}: {source}")]
    ListenerBind { addr: std::net::SocketAddr, source: std::io::Error },
    #[error("failed to bind udp broadcast socket: {0}")]
    UdpBind(#[source] std::io::Error),
}
