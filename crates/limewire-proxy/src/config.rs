use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

use crate::error::ProxyError;

pub const DEFAULT_FC_ADDRESS: &str = "141.212.192.170:5000";
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:5050";

/// Command-line surface of the proxy (spec §4.8).
#[derive(Parser, Debug)]
#[command(name = "limewire-proxy", about = "Transparent fan-out proxy for the flight computer link")]
pub struct Cli {
    /// Flight computer address in `ip:port` form.
    #[arg(default_value = DEFAULT_FC_ADDRESS)]
    pub fc_address: String,

    /// Address downstream clients connect to.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen: String,

    /// Enable verbose (debug-level) logging.
    #[arg(long)]
    pub debug: bool,

    /// Path to the append-only latency CSV log.
    #[arg(long, default_value = "proxy_log.csv")]
    pub latency_log: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub fc_addr: SocketAddr,
    pub listen_addr: SocketAddr,
    pub heartbeat_interval: Duration,
    pub reconnect_backoff: Duration,
    pub latency_log: PathBuf,
}

impl ProxyConfig {
    pub fn from_cli(cli: &Cli) -> Result<ProxyConfig, ProxyError> {
        let fc_addr = cli
            .fc_address
            .parse()
            .map_err(|e| ProxyError::InvalidFcAddress(cli.fc_address.clone(), e))?;
        let listen_addr = cli.listen.parse().map_err(|e| ProxyError::InvalidListenAddress(cli.listen.clone(), e))?;
        Ok(ProxyConfig {
            fc_addr,
            listen_addr,
            heartbeat_interval: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(1),
            latency_log: cli.latency_log.clone(),
        })
    }
}
