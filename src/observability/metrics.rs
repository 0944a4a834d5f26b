//! Metrics collection and exposition.
//!
//! # Metrics
//! - `plugin_router_requests_total` (counter): dispatched requests by method, status, plugin
//! - `plugin_router_request_duration_seconds` (histogram): dispatch latency
//! - `plugin_router_hook_failures_total` (counter): failed or panicked hooks by plugin, hook
//! - `plugin_router_registry_events_total` (counter): register/unregister/enable/disable outcomes
//! - `plugin_router_plugins` (gauge): currently registered plugins
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus exporter is optional and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Record one dispatched request. `plugin` is `"none"` when no route matched.
pub fn record_request(method: &str, status: u16, plugin: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("plugin", plugin.to_string()),
    ];
    metrics::counter!("plugin_router_requests_total", &labels).increment(1);
    metrics::histogram!("plugin_router_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_hook_failure(plugin: &str, hook: &'static str) {
    metrics::counter!(
        "plugin_router_hook_failures_total",
        "plugin" => plugin.to_string(),
        "hook" => hook
    )
    .increment(1);
}

/// `event` is one of `registered`, `rejected`, `unregistered`, `enabled`, `disabled`, `cleared`.
pub fn record_registry_event(event: &'static str) {
    metrics::counter!("plugin_router_registry_events_total", "event" => event).increment(1);
}

pub fn set_plugin_count(count: usize) {
    metrics::gauge!("plugin_router_plugins").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("GET", 200, "users", Instant::now());
        record_hook_failure("users", "onInit");
        record_registry_event("registered");
        set_plugin_count(3);
    }
}
