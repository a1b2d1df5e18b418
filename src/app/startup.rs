//! Application startup
//!
//! Wires the configuration file, command-line overrides, logging and the
//! broker together, then parks until a shutdown signal arrives.

use crate::app::cli::Args;
use crate::broker::Broker;
use crate::core::config::BrokerConfig;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use clap::Parser;
use std::process::ExitCode;

pub fn startup() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("herald: {message}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(mode) = &args.delivery_mode {
        if let Err(err) = config.override_delivery_mode(mode) {
            eprintln!("herald: {err}");
            return ExitCode::FAILURE;
        }
    }
    if args.purge {
        config.storage.purge_on_start = true;
    }

    let log_level = args.log_level.as_deref().or(config.logging.level.as_deref());
    let log_format = args
        .log_format
        .as_deref()
        .or(config.logging.format.as_deref());
    let log_file = args
        .log_file
        .as_deref()
        .map(|p| p.to_string_lossy().to_string())
        .or(config.logging.file.clone());
    if let Err(err) = init_logging(log_level, log_format, log_file.as_deref()) {
        eprintln!("herald: cannot initialise logging: {err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Cannot start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(serve(config))
}

fn load_config(args: &Args) -> Result<BrokerConfig, String> {
    match &args.config_file {
        Some(path) => BrokerConfig::load(path).map_err(|err| err.to_string()),
        None => Ok(BrokerConfig::default()),
    }
}

async fn serve(config: BrokerConfig) -> ExitCode {
    log::info!("herald: notification broker starting");

    let broker = match Broker::start(&config).await {
        Ok(broker) => broker,
        Err(err) => {
            log::error!("Broker failed to start: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (coordinator, mut shutdown_rx) = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    let _ = shutdown_rx.recv().await;
    log::info!("Shutdown requested, draining deliveries");
    broker.shutdown().await;

    ExitCode::SUCCESS
}
