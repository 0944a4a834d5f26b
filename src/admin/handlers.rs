use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::config::Environment;
use crate::error::error_response;
use crate::routing::{PluginInfo, RegistryStats, RouteInfo};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub environment: Environment,
    pub plugins: usize,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct PluginStateChange {
    pub name: String,
    pub enabled: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        environment: state.registry.environment(),
        plugins: state.registry.plugin_count(),
        uptime_secs: state.registry.uptime_secs(),
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<RegistryStats> {
    Json(state.registry.get_stats())
}

pub async fn list_plugins(State(state): State<AdminState>) -> Json<Vec<PluginInfo>> {
    Json(state.registry.get_all_plugins())
}

pub async fn list_routes(State(state): State<AdminState>) -> Json<Vec<RouteInfo>> {
    Json(state.registry.routes())
}

pub async fn get_plugin(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    match state.registry.get_plugin(&name) {
        Some(info) => Json(info).into_response(),
        None => plugin_not_found(&name),
    }
}

pub async fn enable_plugin(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    set_enabled(&state, name, true)
}

pub async fn disable_plugin(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    set_enabled(&state, name, false)
}

pub async fn unregister_plugin(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    if state.registry.unregister(&name).await {
        tracing::info!(plugin = %name, "Plugin unregistered via admin API");
        StatusCode::NO_CONTENT.into_response()
    } else {
        plugin_not_found(&name)
    }
}

fn set_enabled(state: &AdminState, name: String, enabled: bool) -> Response {
    let changed = if enabled {
        state.registry.enable_plugin(&name)
    } else {
        state.registry.disable_plugin(&name)
    };
    if changed {
        Json(PluginStateChange { name, enabled }).into_response()
    } else {
        plugin_not_found(&name)
    }
}

fn plugin_not_found(name: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "Not Found",
        format!("Plugin '{}' is not registered", name),
    )
    .into_response()
}
