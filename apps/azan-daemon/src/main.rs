//! Azan Daemon - plays the adhan at each prayer time.
//!
//! This binary computes the day's prayer times for the device's location, plays
//! the configured audio file once per prayer and serves the current and next
//! prayer to a status bar widget on `http://127.0.0.1:<port>/status`.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use azan_core::{bootstrap_services, start_server};
use clap::Parser;
use tokio::signal;

use crate::config::DaemonConfig;

/// Azan Daemon - prayer time notifier with a status bar endpoint.
#[derive(Parser, Debug)]
#[command(name = "azan-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "AZAN_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Status server port (overrides config file).
    #[arg(short = 'p', long, env = "AZAN_PORT")]
    port: Option<u16>,

    /// Audio file to play (overrides config file).
    #[arg(short = 'a', long, env = "AZAN_AUDIO_FILE")]
    audio_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Azan Daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        DaemonConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(audio_file) = args.audio_file {
        config.audio_file = audio_file;
    }

    log::info!(
        "Configuration: port={}, poll_interval={}s, catch_up={}min, method={:?}, audio_file={}",
        config.port,
        config.poll_interval_secs,
        config.catch_up_minutes,
        config.calculation_method,
        config.audio_file.display()
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // The scheduler's first tick computes today's table.
    services.start_background_tasks();

    let app_state = services.app_state();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed is logged and never completes, leaving
/// the other one in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
