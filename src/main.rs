//! Route Gateway
//!
//! A predicate-routed API gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                      GATEWAY                          │
//!  Client Request     │  ┌─────────┐   ┌────────────────┐   ┌──────────────┐ │
//!  ───────────────────┼─▶│  http   │──▶│ route matcher  │──▶│ filter chain │ │
//!                     │  │ server  │   │ (cached table) │   │ route+global │ │
//!                     │  └─────────┘   └───────▲────────┘   └──────┬───────┘ │
//!                     │                        │                   │         │
//!                     │              ┌─────────┴────────┐   ┌──────▼───────┐ │
//!                     │              │ route compiler   │   │ lb / http /  │ │──▶ Upstream
//!                     │              │ config+discovery │   │ forward      │ │
//!                     │              └──────────────────┘   └──────────────┘ │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use route_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use route_gateway::lifecycle::{spawn_signal_handler, Shutdown};
use route_gateway::observability::{logging, metrics};
use route_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "route-gateway")]
#[command(about = "Predicate-routed API gateway", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("route-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        routes = config.gateway.routes.len(),
        "Configuration loaded"
    );

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                metrics::init_metrics(addr);
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Hot reload; the watcher must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = GatewayServer::new(config);
    let shutdown = Shutdown::new();
    spawn_signal_handler(server.state().events.clone(), shutdown.clone());

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
