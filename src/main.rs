//! Runtime configuration service.
//!
//! # Architecture Overview
//!
//! ```text
//!   module declarations ──▶ SchemaRegistry (frozen)
//!                                 │
//!                 ┌───────────────┴───────────────┐
//!                 ▼                               ▼
//!           Reconciler ──lock──▶ Cache ◀──── RuntimeConfig ◀──── HTTP (public + admin)
//!                 │                               │
//!                 └──────────▶ Store ◀────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use runtime_config::config::{load_config, ServiceConfig};
use runtime_config::lifecycle::{self, signals, Shutdown};
use runtime_config::modules::default_registry;
use runtime_config::observability::{logging, metrics};
use runtime_config::HttpServer;

#[derive(Parser)]
#[command(name = "runtime-config")]
#[command(about = "Runtime configuration service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("runtime-config v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.backend,
        cache = ?config.cache.backend,
        cache_ttl_secs = config.cache.ttl_secs,
        lock_ttl_secs = config.cache.lock_ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = default_registry()?;
    let services = lifecycle::start(&config, registry).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal(&signal_shutdown).await;
    });

    HttpServer::new(config, services).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
