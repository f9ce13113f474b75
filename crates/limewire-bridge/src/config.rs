use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

use crate::error::BridgeError;

pub const DEFAULT_FC_ADDRESS: &str = "141.212.192.170:5000";
pub const DEFAULT_TELEMETRY_UDP_PORT: u16 = 6767;
pub const DEFAULT_EVENTLOG_UDP_PORT: u16 = 1234;

/// Command-line surface of the bridge (spec §6): one positional
/// `fc_address`, plus `--debug` and `--overwrite-timestamps` flags.
#[derive(Parser, Debug)]
#[command(name = "limewire", about = "Ground-side telemetry and command bridge")]
pub struct Cli {
    /// Flight computer address in `ip:port` form.
    #[arg(default_value = DEFAULT_FC_ADDRESS)]
    pub fc_address: String,

    /// Enable verbose (debug-level) logging.
    #[arg(long)]
    pub debug: bool,

    /// Stamp inbound telemetry with receive wall-clock instead of the
    /// board's own wire timestamp.
    #[arg(long)]
    pub overwrite_timestamps: bool,

    /// Path to the channel-map JSON file (spec §4.4).
    #[arg(long, default_value = "channels.json")]
    pub channel_map: PathBuf,

    /// UDP port boards broadcast telemetry on.
    #[arg(long, default_value_t = DEFAULT_TELEMETRY_UDP_PORT)]
    pub telemetry_udp_port: u16,
}

/// Store connection settings, read from the environment per spec §6. No
/// real store client crate is available in this workspace (spec §1 treats
/// the store as an external collaborator), so these are parsed and logged
/// for parity with the original deployment surface but otherwise unused by
/// [`limewire_store::MockStore`].
#[derive(Debug, Clone)]
pub struct StoreEnv {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secure: bool,
    pub dev_mode: bool,
}

impl StoreEnv {
    pub fn from_env() -> StoreEnv {
        StoreEnv {
            host: std::env::var("SYNNAX_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SYNNAX_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(9090),
            username: std::env::var("SYNNAX_USERNAME").unwrap_or_else(|_| "synnax".to_string()),
            secure: env_flag("SYNNAX_SECURE"),
            dev_mode: env_flag("LIMEWIRE_DEV_SYNNAX"),
        }
    }
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1" | "true" | "True" | "TRUE"))
}

/// Fully resolved supervisor configuration (spec §4.7, §4.12, §5 timeouts).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub fc_addr: SocketAddr,
    pub telemetry_udp_addr: SocketAddr,
    pub overwrite_timestamps: bool,
    pub heartbeat_interval: Duration,
    pub read_idle_timeout: Duration,
    pub dial_timeout: Duration,
    pub reconnect_backoff: Duration,
    pub queue_capacity: usize,
}

impl SupervisorConfig {
    pub fn from_cli(cli: &Cli) -> Result<SupervisorConfig, BridgeError> {
        let fc_addr = cli
            .fc_address
            .parse()
            .map_err(|e| BridgeError::InvalidFcAddress(cli.fc_address.clone(), e))?;
        let telemetry_udp_addr: SocketAddr =
            format!("0.0.0.0:{}", cli.telemetry_udp_port).parse().expect("well-formed literal");
        Ok(SupervisorConfig {
            fc_addr,
            telemetry_udp_addr,
            overwrite_timestamps: cli.overwrite_timestamps,
            heartbeat_interval: Duration::from_secs(1),
            read_idle_timeout: Duration::from_secs(5),
            dial_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_secs(1),
            queue_capacity: 4096,
        })
    }
}
