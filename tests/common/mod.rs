//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::mpsc;

use plugin_router::config::{AppConfig, Environment, RegistryConfig, RouterConfig};
use plugin_router::http::{HttpServer, PluginResponse};
use plugin_router::lifecycle::Shutdown;
use plugin_router::plugin::PluginDescriptor;
use plugin_router::routing::{PluginRegistry, Router};

/// The `users` plugin: list and fetch-by-id.
pub fn users_plugin() -> PluginDescriptor {
    PluginDescriptor::builder("users", "1.0.0")
        .description("User directory")
        .get("/api/users", |_req, _ctx| async {
            Ok(PluginResponse::ok_json(&json!([{ "id": "1" }, { "id": "2" }])))
        })
        .get("/api/users/:id", |_req, ctx| async move {
            Ok(PluginResponse::ok_json(&json!({ "id": ctx.param("id") })))
        })
        .build()
}

/// A plugin with one GET route answering `200 <body>`.
#[allow(dead_code)]
pub fn text_plugin(name: &str, path: &str, body: &'static str) -> PluginDescriptor {
    PluginDescriptor::builder(name, "1.0.0")
        .get(path, move |_req, _ctx| async move { Ok(PluginResponse::text(StatusCode::OK, body)) })
        .build()
}

pub fn new_registry(environment: Environment) -> Arc<PluginRegistry> {
    Arc::new(PluginRegistry::new(RegistryConfig::default(), environment))
}

#[allow(dead_code)]
pub fn new_router(registry: Arc<PluginRegistry>, environment: Environment) -> Router {
    Router::new(registry, RouterConfig::default(), environment)
}

/// Boot the HTTP server on an ephemeral loopback port.
#[allow(dead_code)]
pub async fn start_server(
    config: AppConfig,
    registry: Arc<PluginRegistry>,
) -> (SocketAddr, Shutdown, mpsc::UnboundedSender<AppConfig>) {
    let router = Arc::new(Router::new(registry, config.router.clone(), config.environment));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, router);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown, updates_tx)
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
