//! picotemp sensor server.
//!
//! Answers every HTTP request with the current temperature as JSON and
//! blinks the status LED.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use picotemp_server::shutdown::{Shutdown, shutdown_signal};
use picotemp_server::{
    ConnectionLoop, Indicator, ServerConfig, StatusLed, bind_listener, event_channel,
};

/// How often to log that the server is still waiting.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// picotemp sensor server.
#[derive(Parser, Debug)]
#[command(name = "picotemp-server")]
#[command(about = "Serve the local temperature as JSON over HTTP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    picotemp_common::init_tracing(&config.logging)?;

    info!("Starting picotemp sensor server");

    // LED on: the device is up and about to listen
    let mut led = config.led.open();
    if let Err(e) = led.set(true) {
        error!(error = %e, "Failed to change LED state");
    }

    let listen_addr = config.listen_addr()?;
    let listener = bind_listener(listen_addr).context("Failed to create listener")?;
    info!(addr = %format!("http://{}", listener.local_addr()?), "Listening");

    let (events, event_rx) = event_channel();
    tokio::spawn(Indicator::new(led).run(event_rx));
    tokio::spawn(ConnectionLoop::new(listener, config.thermometer.open(), events).run());

    let shutdown = shutdown_signal().context("Failed to install signal handlers")?;
    tokio::pin!(shutdown);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                info!("Waiting for connections...");
            }
            reason = &mut shutdown => {
                match reason {
                    Shutdown::Interrupt => info!("Received Ctrl+C, shutting down..."),
                    Shutdown::Terminate => info!("Received SIGTERM, shutting down..."),
                }
                break;
            }
        }
    }

    Ok(())
}
