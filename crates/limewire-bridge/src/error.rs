use thiserror::Error;

/// Fatal startup failures only (spec §7 `ErrKind::Config`). Everything else
/// the supervisor encounters — transport resets, framing errors, malformed
/// messages, schema mismatches, store validation failures — is recovered
/// from locally and only ever surfaces as a log line, never as a returned
/// error, matching spec §7's propagation policy.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("invalid flight computer address {0:?}: {1}")]
    InvalidFcAddress(String, std::net::AddrParseError),
    #[error("failed to load channel map: {0}")]
    ChannelMap(#[from] limewire_store::ChannelMapError),
    #[error("failed to bind udp telemetry socket on {addr}: {source}")]
    UdpBind { addr: std::net::SocketAddr, source: std::io::Error },
}
