use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use limewire_simulator::{Cli, Simulator, SimulatorConfig, SimulatorError};
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

fn run(cli: Cli) -> Result<(), SimulatorError> {
    let config = SimulatorConfig::from_cli(&cli)?;
    tracing::info!(listen_addr = %config.listen_addr, udp_target = %config.telemetry_udp_target, "simulator configuration resolved");

    let mut simulator = Simulator::new(config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("failed to install ctrl-c handler");

    while !shutdown.load(Ordering::SeqCst) {
        simulator.poll_once();
        std::thread::sleep(TICK_INTERVAL);
    }

    tracing::info!("shutting down");
    Ok(())
}
