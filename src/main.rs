//! Plugin router server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request ID, timeout, trace, body buffer)
//!                          │
//!                          ▼
//!                     routing::Router ──▶ routing::PluginRegistry (snapshot lookup)
//!                          │
//!                          ▼
//!                     middleware chain ──▶ plugin handler
//!                          │
//!     Client Response ◀────┘ (JSON errors, CORS)
//!
//!     Cross-cutting: config (+ watcher), observability, lifecycle, admin API
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use plugin_router::admin::{self, AdminState};
use plugin_router::config::{load_config, watcher::ConfigWatcher, AppConfig};
use plugin_router::http::HttpServer;
use plugin_router::lifecycle::{signals, Shutdown};
use plugin_router::observability::{logging, metrics};
use plugin_router::plugin::builtin::system_plugin;
use plugin_router::routing::{PluginRegistry, Router};

#[derive(Parser)]
#[command(name = "plugin-router")]
#[command(about = "Plugin registry and request router", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted
    #[arg(short, long, env = "PLUGIN_ROUTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability, config.environment)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        bind_address = %config.server.bind_address,
        max_plugins = config.registry.max_plugins,
        "plugin-router starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(PluginRegistry::new(config.registry.clone(), config.environment));
    registry.register(system_plugin(&registry)).await?;
    let router = Arc::new(Router::new(registry.clone(), config.router.clone(), config.environment));

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    // The watcher handle must outlive the server
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            registry: registry.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve_admin(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config, router);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
