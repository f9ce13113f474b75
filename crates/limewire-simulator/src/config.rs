use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::error::SimulatorError;

pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:5000";
pub const DEFAULT_UDP_TARGET: &str = "127.0.0.1:6767";

/// Command-line surface of the simulator (spec §4.9). There is no equivalent
/// surface in the original `fc_simulator.py`, which hardcoded its socket
/// addresses; this follows the bridge's and proxy's CLI conventions instead.
#[derive(Parser, Debug)]
#[command(name = "limewire-fc-simulator", about = "Flight computer protocol simulator")]
pub struct Cli {
    /// Address the simulator listens on for the bridge/proxy's TCP session.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen: String,

    /// Where simulated board telemetry is additionally broadcast over UDP.
    #[arg(long, default_value = DEFAULT_UDP_TARGET)]
    pub telemetry_udp_target: String,

    /// Enable verbose (debug-level) logging.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub listen_addr: SocketAddr,
    pub telemetry_udp_target: SocketAddr,
    pub telemetry_period: Duration,
    /// Every `zero_timestamp_every`-th telemetry tick is stamped with a zero
    /// timestamp to exercise the store's validation path (spec §4.9).
    pub zero_timestamp_every: u64,
}

impl SimulatorConfig {
    pub fn from_cli(cli: &Cli) -> Result<SimulatorConfig, SimulatorError> {
        let listen_addr =
            cli.listen.parse().map_err(|e| SimulatorError::InvalidListenAddress(cli.listen.clone(), e))?;
        let telemetry_udp_target = cli
            .telemetry_udp_target
            .parse()
            .map_err(|e| SimulatorError::InvalidUdpTarget(cli.telemetry_udp_target.clone(), e))?;
        Ok(SimulatorConfig {
            listen_addr,
            telemetry_udp_target,
            telemetry_period: Duration::from_millis(20),
            zero_timestamp_every: 100,
        })
    }
}
