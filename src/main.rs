//! Process entry point: parse CLI flags, layer config sources, bring up
//! logging, then hand off to the daemon orchestrator.

use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use meshswap::config::{Cli, Config};
use meshswap::daemon::Daemon;
use meshswap::logging;
use meshswap_store::MemoryStore;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    config.apply_env_overrides();
    config.apply_cli_overrides(&cli);

    logging::init(&config.log_level);

    info!("starting meshswapd on {}", config.listen_addr);

    let store = Arc::new(MemoryStore::new());
    let daemon = match Daemon::start(config, store).await {
        Ok(d) => d,
        Err(e) => {
            error!("fatal startup error: {e:#}");
            std::process::exit(1);
        }
    };
    let _ = daemon;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::process::exit(1);
    }
    info!("shutdown signal received, exiting");
}
