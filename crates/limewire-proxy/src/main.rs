use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use limewire_proxy::{Cli, Proxy, ProxyConfig, ProxyError};
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

fn run(cli: Cli) -> Result<(), ProxyError> {
    let config = ProxyConfig::from_cli(&cli)?;
    tracing::info!(fc_addr = %config.fc_addr, listen_addr = %config.listen_addr, "proxy configuration resolved");

    let mut proxy = Proxy::new(config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("failed to install ctrl-c handler");

    while !shutdown.load(Ordering::SeqCst) {
        proxy.poll_once();
        std::thread::sleep(TICK_INTERVAL);
    }

    tracing::info!("shutting down");
    proxy.shutdown();
    Ok(())
}
