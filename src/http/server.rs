//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum catch-all route that feeds every request to the plugin router
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer request bodies up to the configured limit
//! - Apply reloaded router settings while serving
//! - Stop accepting on shutdown and drain in-flight requests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::error_response;
use crate::http::request::{PluginRequest, RequestError};
use crate::routing::Router;

/// Application state injected into the catch-all handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub max_body_bytes: usize,
}

/// HTTP entry point in front of the plugin router.
pub struct HttpServer {
    app: axum::Router,
    router: Arc<Router>,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig, router: Arc<Router>) -> Self {
        let state = AppState {
            router: router.clone(),
            max_body_bytes: config.server.max_body_bytes,
        };
        let app = Self::build_app(&config, state);
        Self { app, router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &AppConfig, state: AppState) -> axum::Router {
        axum::Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until `shutdown` fires. Configs arriving on `config_updates`
    /// have their `[router]` section applied live.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            "HTTP server starting"
        );

        let router = self.router.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                router.reload(config.router);
            }
        });

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Buffer the body, convert to a `PluginRequest` and dispatch.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.max_body_bytes) {
        return body_too_large(state.max_body_bytes);
    }

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        // Chunked bodies have no declared length and only trip the limit while buffering
        Err(e) if exceeds_length_limit(&e) => {
            tracing::debug!(path = %parts.uri.path(), limit = state.max_body_bytes, "Request body over limit");
            return body_too_large(state.max_body_bytes);
        }
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                "Bad Request",
                format!("Failed to read request body: {}", e),
            )
            .into_response();
        }
    };

    let request = match PluginRequest::from_parts(&parts, bytes) {
        Ok(request) => request,
        // Unknown methods can never match a route
        Err(RequestError::Method(e)) => {
            tracing::debug!(method = %parts.method, path = %parts.uri.path(), error = %e, "Unsupported method");
            return error_response(
                StatusCode::NOT_FOUND,
                "Not Found",
                format!("No handler found for {} {}", parts.method, parts.uri.path()),
            )
            .into_response();
        }
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, "Bad Request", e.to_string()).into_response();
        }
    };

    state.router.handle(request).await.into_response()
}

fn body_too_large(limit: usize) -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        "Payload Too Large",
        format!("Request body exceeds the {} byte limit", limit),
    )
    .into_response()
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
