//! Built-in `system` plugin exposing registry introspection over the
//! regular dispatch path.
//!
//! Routes:
//! - `GET /_system/health` → `{status, plugins}`
//! - `GET /_system/stats` → `RegistryStats`
//! - `GET /_system/plugins` → `[PluginInfo]`

use std::sync::{Arc, Weak};

use axum::http::StatusCode;
use serde_json::json;

use crate::error::{DispatchError, HttpFailure};
use crate::http::PluginResponse;
use crate::plugin::descriptor::PluginDescriptor;
use crate::routing::registry::PluginRegistry;

pub const SYSTEM_PLUGIN: &str = "system";

/// Build the system plugin. It holds the registry weakly so registering it
/// does not create a reference cycle.
pub fn system_plugin(registry: &Arc<PluginRegistry>) -> PluginDescriptor {
    let health = Arc::downgrade(registry);
    let stats = health.clone();
    let plugins = health.clone();

    PluginDescriptor::builder(SYSTEM_PLUGIN, env!("CARGO_PKG_VERSION"))
        .description("Registry health and introspection")
        .get("/_system/health", move |_req, _ctx| {
            let registry = upgrade(&health);
            async move {
                registry.map(|registry| {
                    PluginResponse::ok_json(&json!({
                        "status": "ok",
                        "plugins": registry.plugin_count(),
                    }))
                })
            }
        })
        .get("/_system/stats", move |_req, _ctx| {
            let registry = upgrade(&stats);
            async move { registry.map(|r| PluginResponse::ok_json(&r.get_stats())) }
        })
        .get("/_system/plugins", move |_req, _ctx| {
            let registry = upgrade(&plugins);
            async move { registry.map(|r| PluginResponse::ok_json(&r.get_all_plugins())) }
        })
        .build()
}

fn upgrade(registry: &Weak<PluginRegistry>) -> Result<Arc<PluginRegistry>, DispatchError> {
    registry.upgrade().ok_or_else(|| {
        HttpFailure::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable",
            "Registry is shutting down",
        )
        .into()
    })
}
