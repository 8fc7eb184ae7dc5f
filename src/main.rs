//! Request Guard
//!
//! A request-security gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                    REQUEST GUARD                      │
//!   Client Request  │  ┌──────────┐   ┌──────────┐   ┌───────┐   ┌──────┐  │
//!   ────────────────┼─▶│ global   │──▶│ request  │──▶│ route │──▶│ auth │──┼──▶ Upstream
//!                   │  │ limiter  │   │ gate     │   │limiter│   │      │  │    application
//!                   │  └──────────┘   └────┬─────┘   └───────┘   └──┬───┘  │
//!                   │                      │                        │      │
//!                   │              ┌───────▼──────┐          ┌──────▼────┐ │
//!                   │              │ blocklist +  │          │ token     │ │
//!                   │              │ audit sink   │          │ cache     │ │
//!                   │              └──────────────┘          └───────────┘ │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use request_guard::admin::setup_admin_router;
use request_guard::config::{load_config, loader::default_config};
use request_guard::config::watcher::ConfigWatcher;
use request_guard::lifecycle::{wait_for_shutdown_signal, Shutdown};
use request_guard::observability::{logging::init_logging, metrics::init_metrics};
use request_guard::{GuardDeps, GuardServer};

#[derive(Parser)]
#[command(name = "request-guard", version, about = "Request-security gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "REQUEST_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    // Keep the watcher alive for the life of the process.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    (updates, None)
                }
            }
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let deps = GuardDeps::from_config(&config)?;
    let server = GuardServer::new(config.clone(), deps)?;

    if config.admin.enabled {
        let admin_router = setup_admin_router(server.state().clone(), &config.admin.api_key);
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");

        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(admin_listener, admin_router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let gateway = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    wait_for_shutdown_signal().await;
    shutdown.trigger();
    gateway.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
