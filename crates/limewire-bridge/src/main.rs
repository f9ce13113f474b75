use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use limewire_bridge::{BridgeError, Cli, StoreEnv, Supervisor, SupervisorConfig};
use limewire_store::{ChannelMap, MockStore};
use tracing_subscriber::EnvFilter;

const TICK_INTERVAL: Duration = Duration::from_millis(10);

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(%err, "fatal startup error");
            std::process::exit(1);
        }
    }
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<(), BridgeError> {
    let store_env = StoreEnv::from_env();
    tracing::info!(host = %store_env.host, port = store_env.port, dev_mode = store_env.dev_mode, "store environment resolved");

    let mut channel_map = ChannelMap::load(&cli.channel_map)?;
    if store_env.dev_mode {
        channel_map = channel_map.restrict_to_dev_mode()?;
        tracing::warn!("LIMEWIRE_DEV_SYNNAX set: restricting channel map to the fc_timestamp index only");
    }

    let config = SupervisorConfig::from_cli(&cli)?;
    tracing::info!(fc_addr = %config.fc_addr, telemetry_udp_addr = %config.telemetry_udp_addr, "supervisor configuration resolved");

    let store = MockStore::new(Vec::new());
    let mut supervisor = Supervisor::new(config, channel_map, store)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("failed to install ctrl-c handler");

    while !shutdown.load(Ordering::SeqCst) {
        supervisor.poll_once();
        std::thread::sleep(TICK_INTERVAL);
    }

    tracing::info!("shutting down");
    supervisor.shutdown();
    Ok(())
}
