//! DX Cluster Client CLI - Stream spots from a DX cluster and report on them.

use anyhow::{Context, Result};
use clap::Parser;
use dx_cluster_client::{
    client::{ClusterClient, ConnectionState},
    config::Config,
    http::start_http_server,
    query::{DEFAULT_SPOTS_COUNT, format_spot_list},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// DX Cluster Client - Stream spots from an amateur radio DX cluster
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Callsign to use for cluster login
    #[arg(short, long)]
    callsign: Option<String>,

    /// Cluster hostname
    #[arg(long)]
    host: Option<String>,

    /// Cluster port
    #[arg(long)]
    port: Option<u32>,

    /// IARU region for band lookups (1, 2 or 3)
    #[arg(long)]
    region: Option<String>,

    /// Number of spots kept in memory
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Print a status report every N seconds
    #[arg(short, long)]
    report_interval: Option<u64>,

    /// Band to list in each report (e.g. 20m); lists recent spots if unset
    #[arg(short, long)]
    band: Option<String>,

    /// Serve HTTP status endpoints on this port
    #[arg(long)]
    http_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable auto-reconnect
    #[arg(long)]
    no_reconnect: bool,

    /// Maximum runtime in seconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_runtime: u64,
}

impl Args {
    /// Load the config file and environment, then apply command-line overrides.
    fn into_config(self) -> Result<(Config, Option<String>, u64)> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        config.apply_env()?;

        if let Some(callsign) = self.callsign {
            config.callsign = callsign;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(region) = self.region {
            config.iaru_region = region;
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if let Some(interval) = self.report_interval {
            config.report_interval = interval;
        }
        if let Some(port) = self.http_port {
            config.http_enabled = true;
            config.http_port = port;
        }
        if self.no_reconnect {
            config.reconnect = false;
        }

        Ok((config, self.band, self.max_runtime))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let (config, band, max_runtime) = args.into_config()?;
    let client_config = config
        .client_config()
        .context("Invalid configuration")?;

    info!("DX cluster client starting...");
    info!("Callsign: {}", client_config.callsign);
    info!("Server: {}:{}", client_config.host, client_config.port);

    let client = Arc::new(ClusterClient::new(client_config)?);

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        let _ = shutdown_tx_clone.send(true);
    });

    // Optional max runtime
    if max_runtime > 0 {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_runtime)).await;
            info!("Max runtime reached");
            let _ = shutdown_tx_clone.send(true);
        });
    }

    if config.http_enabled {
        let client = Arc::clone(&client);
        let port = config.http_port;
        tokio::spawn(async move {
            if let Err(e) = start_http_server(port, client).await {
                error!("HTTP server failed: {}", e);
            }
        });
    }

    // Start status reporter
    let reporter = Arc::clone(&client);
    let report_interval = config.report_interval.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(report_interval));
        loop {
            interval.tick().await;
            println!("\n{}", reporter.status());
            println!("{}", report(&reporter, band.as_deref()));
        }
    });

    let reconnect_delay = Duration::from_secs(config.reconnect_delay);
    let mut state_rx = client.watch_state();

    // Main connection loop; retrying is this binary's policy, not the client's.
    'outer: loop {
        match client.connect().await {
            Ok(()) => {
                info!("Connected, {} spots cached", client.store().len());
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break 'outer,
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                break 'outer;
                            }
                            if *state_rx.borrow_and_update() == ConnectionState::Disconnected {
                                warn!("Disconnected from cluster");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                error!("Connection failed: {}", e);
            }
        }

        if !config.reconnect {
            break;
        }

        info!("Reconnecting in {} seconds...", reconnect_delay.as_secs());
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    client.disconnect().await;

    println!("\n\nFINAL STATUS");
    println!("{}", client.status());

    Ok(())
}

/// Render the spot listing printed with each status report.
fn report(client: &ClusterClient, band: Option<&str>) -> String {
    match band {
        Some(band) => {
            let spots = client.by_band(band, None);
            format_spot_list(
                &spots,
                &format!("Found {} spots on {} band:", spots.len(), band),
            )
        }
        None => {
            let spots = client.recent(DEFAULT_SPOTS_COUNT);
            format_spot_list(&spots, &format!("Found {} recent spots:", spots.len()))
        }
    }
}
