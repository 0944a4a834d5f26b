//! Request dispatch: the single entry point every request goes through.
//!
//! # Data Flow
//! ```text
//! PluginRequest
//!     → CORS preflight? → 204
//!     → registry lookup → 404 when nothing matches
//!     → owner disabled? → 503
//!     → onRequest hook
//!     → middleware chain (or handler directly)
//!     → onResponse / onError hook
//!     → error mapping, CORS headers
//! PluginResponse
//! ```
//!
//! # Design Decisions
//! - `handle` never fails; every error becomes a JSON response here
//! - Panics in handlers and middleware are caught and answered with 500
//! - Settings are swapped atomically on reload; in-flight requests keep the old ones

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use futures_util::FutureExt;
use uuid::Uuid;

use crate::config::{Environment, RouterConfig};
use crate::error::{default_error_response, error_response, DispatchError, ErrorContext, ErrorHandler, HandlerResult};
use crate::http::{HttpMethod, PluginRequest, PluginResponse};
use crate::observability::metrics;
use crate::plugin::hooks::{panic_message, HookDispatcher};
use crate::routing::cors;
use crate::routing::middleware::{ChainConfig, MiddlewareChain, Terminal};
use crate::routing::registry::{PluginRegistry, RouteMatch};

pub struct Router {
    registry: Arc<PluginRegistry>,
    settings: ArcSwap<RouterConfig>,
    environment: Environment,
    error_handler: ErrorHandler,
    hooks: HookDispatcher,
}

impl Router {
    pub fn new(registry: Arc<PluginRegistry>, config: RouterConfig, environment: Environment) -> Self {
        Self {
            registry,
            settings: ArcSwap::from_pointee(config),
            environment,
            error_handler: Arc::new(default_error_response),
            hooks: HookDispatcher::new(environment),
        }
    }

    /// Replace the default error-to-response mapping.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn config(&self) -> Arc<RouterConfig> {
        self.settings.load_full()
    }

    /// Apply new settings to every request that starts after this call.
    pub fn reload(&self, config: RouterConfig) {
        tracing::info!(
            enable_middleware = config.enable_middleware,
            cors_enabled = config.cors.enabled,
            chain_timeout_ms = ?config.chain_timeout_ms,
            middleware_timeout_ms = ?config.middleware_timeout_ms,
            "Router configuration reloaded"
        );
        self.settings.store(Arc::new(config));
    }

    pub async fn handle(&self, request: PluginRequest) -> PluginResponse {
        let start = Instant::now();
        let settings = self.settings.load_full();
        let method = request.method();

        if settings.cors.enabled && method == HttpMethod::Options {
            let response = cors::preflight_response(&settings.cors);
            metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
            return response;
        }

        let (mut response, plugin) = self.dispatch(request, &settings).await;

        if settings.cors.enabled {
            cors::apply_cors_headers(&mut response, &settings.cors);
        }
        metrics::record_request(
            method.as_str(),
            response.status().as_u16(),
            plugin.as_deref().unwrap_or("none"),
            start,
        );
        response
    }

    /// Returns the response and the name of the plugin that handled it.
    async fn dispatch(&self, request: PluginRequest, settings: &RouterConfig) -> (PluginResponse, Option<String>) {
        let method = request.method();
        // Requests built outside the HTTP server have no ID yet
        let request_id = request
            .request_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let route = match self.registry.get_handler(request.path(), method) {
            Ok(Some(route)) => route,
            Ok(None) => {
                tracing::debug!(request_id = %request_id, method = %method, path = %request.path(), "No route matched");
                let response = error_response(
                    StatusCode::NOT_FOUND,
                    "Not Found",
                    format!("No handler found for {} {}", method, request.path()),
                );
                return (response, None);
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Route table references a missing plugin");
                return (self.render_error(&DispatchError::Route(e), None), None);
            }
        };

        let plugin = route.plugin.name.clone();
        if !route.plugin.enabled {
            tracing::debug!(request_id = %request_id, plugin = %plugin, "Route owner is disabled");
            let response = error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Plugin Disabled",
                format!("Plugin '{}' is currently disabled", plugin),
            );
            return (response, Some(plugin));
        }

        self.hooks.request(&plugin, &route.hooks, &request).await;

        let hook_request = request.clone();
        let result = self.run_route(&route, request, settings).await;

        let response = match result {
            Ok(response) => {
                self.hooks
                    .response(&plugin, &route.hooks, &hook_request, response.status())
                    .await;
                tracing::debug!(
                    request_id = %request_id,
                    plugin = %plugin,
                    route = %route.route,
                    status = response.status().as_u16(),
                    "Request handled"
                );
                response
            }
            Err(err) => {
                self.hooks
                    .error(&plugin, &route.hooks, &hook_request, &err.to_string())
                    .await;
                if err.status().is_server_error() {
                    tracing::error!(request_id = %request_id, plugin = %plugin, route = %route.route, error = %err, "Request failed");
                } else {
                    tracing::debug!(request_id = %request_id, plugin = %plugin, route = %route.route, error = %err, "Request rejected");
                }
                self.render_error(&err, Some(&plugin))
            }
        };
        (response, Some(plugin))
    }

    async fn run_route(&self, route: &RouteMatch, request: PluginRequest, settings: &RouterConfig) -> HandlerResult {
        let registry = self.registry.clone();
        let target = route.clone();
        let terminal: Terminal = Box::new(move |req| registry.execute_route(&target, req));

        let run = async {
            if settings.enable_middleware && !route.middleware.is_empty() {
                let chain = MiddlewareChain::new(
                    route.middleware.clone(),
                    ChainConfig {
                        chain_timeout: settings.chain_timeout(),
                        middleware_timeout: settings.middleware_timeout(),
                    },
                );
                chain.execute(request, terminal).await
            } else {
                terminal(request).await
            }
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(plugin = %route.plugin.name, route = %route.route, panic = %message, "Handler panicked");
                Err(DispatchError::Internal(anyhow::anyhow!("Handler panicked: {}", message)))
            }
        }
    }

    fn render_error(&self, err: &DispatchError, plugin: Option<&str>) -> PluginResponse {
        (self.error_handler)(
            err,
            ErrorContext {
                plugin,
                environment: self.environment,
            },
        )
    }
}
