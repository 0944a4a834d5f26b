//! Admin API over the plugin registry.
//!
//! # Endpoints
//! - `GET /admin/status`, `GET /admin/stats`
//! - `GET /admin/plugins`, `GET /admin/plugins/{name}`, `GET /admin/routes`
//! - `POST /admin/plugins/{name}/enable`, `POST /admin/plugins/{name}/disable`
//! - `DELETE /admin/plugins/{name}`
//!
//! Every endpoint requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::routing::PluginRegistry;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<PluginRegistry>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/routes", get(list_routes))
        .route("/admin/plugins", get(list_plugins))
        .route("/admin/plugins/{name}", get(get_plugin).delete(unregister_plugin))
        .route("/admin/plugins/{name}/enable", post(enable_plugin))
        .route("/admin/plugins/{name}/disable", post(disable_plugin))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
