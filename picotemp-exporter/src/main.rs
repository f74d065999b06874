//! Prometheus exporter for a remote temperature sensor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use picotemp_exporter::{ExporterConfig, HttpServer, SensorClient, TemperatureCollector};

/// Prometheus exporter for a remote temperature sensor.
#[derive(Parser, Debug)]
#[command(name = "picotemp-exporter")]
#[command(about = "Export a remote temperature sensor as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Sensor URL (overrides config).
    #[arg(long, env = "PICO_SERVER_URL")]
    sensor_url: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Command line wins over the config file
    if let Some(url) = args.sensor_url {
        config.sensor.url = Some(url);
    }
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    picotemp_common::init_tracing(&config.logging)?;

    let sensor_url = config.sensor_url()?.to_string();
    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    if config.startup_delay_secs > 0 {
        info!(
            delay_secs = config.startup_delay_secs,
            "Waiting for the sensor to come up"
        );
        tokio::time::sleep(Duration::from_secs(config.startup_delay_secs)).await;
    }

    info!(sensor = %sensor_url, "Starting picotemp exporter");

    let client = SensorClient::new()?;
    let collector = Arc::new(TemperatureCollector::new(
        client,
        sensor_url,
        config.prometheus.prefix.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        collector.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );
    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    // Wait for shutdown signal or a server failure
    tokio::select! {
        result = &mut http_task => {
            match result {
                Ok(Ok(())) => info!("HTTP server exited"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
            }
            anyhow::bail!("HTTP server stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = collector.stats();
    info!(
        refreshes = stats.refreshes,
        refresh_failures = stats.refresh_failures,
        cache_hits = stats.hits,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn sigterm() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
