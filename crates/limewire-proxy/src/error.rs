use thiserror::Error;

/// Fatal startup failures only; steady-state transport problems are
/// recovered locally by the proxy's reconnect loop (spec §4.8, §4.12).
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid flight computer address {0:?}: {1}")]
    InvalidFcAddress(String, std::net::AddrParseError),
    #[error("invalid listen address {0:?}: {1}")]
    InvalidListenAddress(String, std::net::AddrParseError),
    #[error("failed to bind client listener on {addr}: {source}")]
    ListenerBind { addr: std::net::SocketAddr, source: std::io::Error },
    #[error("failed to open latency log: {0}")]
    LatencyLog(#[from] limewire_latency::LatencyRecorderError),
}
