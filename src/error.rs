//! Error taxonomy for registration and dispatch, and its mapping to
//! structured JSON error responses.
//!
//! # Kinds
//! - `ValidationError` (400): malformed plugin descriptor
//! - `RegistrationError` (500): capacity, name or route conflict
//! - `RouteError` (404): table entry whose owning plugin is missing
//! - `HttpFailure` (declared): plugin-level error with its own status
//! - `TimeoutError` (504): middleware or chain deadline exceeded
//! - anything else (500): message suppressed in production
//!
//! # Design Decisions
//! - Registration errors are returned to the caller of `register`, never logged away
//! - Dispatch errors are converted to responses in exactly one place (the router)

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;

use crate::config::Environment;
use crate::http::{HttpMethod, PluginResponse};

/// Machine-readable reason attached to a `RegistrationError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationCode {
    MaxPluginsExceeded,
    PluginAlreadyExists,
    RouteConflict,
}

impl RegistrationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationCode::MaxPluginsExceeded => "MAX_PLUGINS_EXCEEDED",
            RegistrationCode::PluginAlreadyExists => "PLUGIN_ALREADY_EXISTS",
            RegistrationCode::RouteConflict => "ROUTE_CONFLICT",
        }
    }
}

/// Every violation found in one plugin descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Plugin '{plugin}' failed validation: {}", .violations.join("; "))]
pub struct ValidationError {
    pub plugin: String,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RegistrationError {
    pub code: RegistrationCode,
    pub plugin: String,
    pub message: String,
}

impl RegistrationError {
    pub fn max_plugins_exceeded(plugin: &str, max: usize) -> Self {
        Self {
            code: RegistrationCode::MaxPluginsExceeded,
            plugin: plugin.to_string(),
            message: format!(
                "Cannot register plugin '{}': maximum of {} plugins reached",
                plugin, max
            ),
        }
    }

    pub fn already_exists(plugin: &str) -> Self {
        Self {
            code: RegistrationCode::PluginAlreadyExists,
            plugin: plugin.to_string(),
            message: format!("Plugin '{}' is already registered", plugin),
        }
    }

    pub fn route_conflict(plugin: &str, method: HttpMethod, path: &str, owner: &str) -> Self {
        Self {
            code: RegistrationCode::RouteConflict,
            plugin: plugin.to_string(),
            message: format!(
                "Route conflict: {} {} is already registered by plugin '{}'",
                method, path, owner
            ),
        }
    }
}

/// A route table entry points at a plugin that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Route {method} {path} is owned by unknown plugin '{owner}'")]
pub struct RouteError {
    pub method: HttpMethod,
    pub path: String,
    pub owner: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    Middleware,
    Chain,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct TimeoutError {
    pub scope: TimeoutScope,
    /// Middleware name, for per-middleware timeouts.
    pub name: Option<String>,
    pub after: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.scope, &self.name) {
            (TimeoutScope::Middleware, Some(name)) => {
                write!(f, "Middleware '{}' timed out after {}ms", name, self.after.as_millis())
            }
            _ => write!(f, "Middleware chain timed out after {}ms", self.after.as_millis()),
        }
    }
}

impl TimeoutError {
    pub fn code(&self) -> &'static str {
        match self.scope {
            TimeoutScope::Middleware => "MIDDLEWARE_TIMEOUT",
            TimeoutScope::Chain => "CHAIN_TIMEOUT",
        }
    }
}

/// An error a plugin raises deliberately, with the status it should map to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HttpFailure {
    pub status: StatusCode,
    /// Reported as the `error` field of the response body.
    pub name: String,
    pub message: String,
    pub code: Option<String>,
    /// Filled in by the router from the matched route when left empty.
    pub plugin: Option<String>,
}

impl HttpFailure {
    pub fn new(status: StatusCode, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            name: name.into(),
            message: message.into(),
            code: None,
            plugin: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", message).with_code("BAD_REQUEST")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", message).with_code("UNAUTHORIZED")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden", message).with_code("FORBIDDEN")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", message).with_code("NOT_FOUND")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "Conflict", message).with_code("CONFLICT")
    }
}

/// Failures of `PluginRegistry::register`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Failures raised by handlers, middleware and the dispatch path.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Http(#[from] HttpFailure),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(e) => DispatchError::Validation(e),
            RegistryError::Registration(e) => DispatchError::Registration(e),
        }
    }
}

/// Body decoding failures are the client's fault.
impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Http(
            HttpFailure::bad_request(format!("Invalid JSON body: {}", err)).with_code("INVALID_JSON"),
        )
    }
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Http(e) => e.status,
            DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
            DispatchError::Registration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Route(_) => StatusCode::NOT_FOUND,
            DispatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error` field of the response body.
    pub fn name(&self) -> &str {
        match self {
            DispatchError::Http(e) => &e.name,
            DispatchError::Validation(_) => "ValidationError",
            DispatchError::Registration(_) => "RegistrationError",
            DispatchError::Route(_) => "RouteError",
            DispatchError::Timeout(_) => "TimeoutError",
            DispatchError::Internal(_) => "Internal Server Error",
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            DispatchError::Http(e) => e.code.as_deref(),
            DispatchError::Validation(_) => Some("VALIDATION_ERROR"),
            DispatchError::Registration(e) => Some(e.code.as_str()),
            DispatchError::Route(_) => Some("ROUTE_ERROR"),
            DispatchError::Timeout(e) => Some(e.code()),
            DispatchError::Internal(_) => None,
        }
    }

    /// Unlabeled failures whose details are hidden in production.
    pub fn is_internal(&self) -> bool {
        matches!(self, DispatchError::Internal(_))
    }
}

/// Outcome of a handler, a middleware, or a whole dispatch.
pub type HandlerResult = Result<crate::http::PluginResponse, DispatchError>;

/// What an error handler knows about the failed dispatch.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    /// Plugin owning the matched route, if the failure happened after lookup.
    pub plugin: Option<&'a str>,
    pub environment: Environment,
}

/// Maps a dispatch failure to the response sent to the client.
pub type ErrorHandler = Arc<dyn Fn(&DispatchError, ErrorContext<'_>) -> PluginResponse + Send + Sync>;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub error: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// `{error, message}` JSON response.
pub fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> PluginResponse {
    PluginResponse::json(
        status,
        &ErrorBody {
            error,
            message: message.into(),
            code: None,
            plugin: None,
            details: None,
            stack: None,
        },
    )
}

/// Default mapping from dispatch failures to JSON error responses.
pub fn default_error_response(err: &DispatchError, ctx: ErrorContext<'_>) -> PluginResponse {
    if let DispatchError::Internal(inner) = err {
        return match ctx.environment {
            Environment::Production => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An unexpected error occurred",
            ),
            Environment::Development => PluginResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorBody {
                    error: "Internal Server Error",
                    message: inner.to_string(),
                    code: None,
                    plugin: ctx.plugin,
                    details: None,
                    stack: Some(format!("{:?}", inner)),
                },
            ),
        };
    }

    let plugin = match err {
        DispatchError::Http(e) => e.plugin.as_deref().or(ctx.plugin),
        DispatchError::Registration(e) => Some(e.plugin.as_str()),
        DispatchError::Validation(e) => Some(e.plugin.as_str()),
        DispatchError::Route(e) => Some(e.owner.as_str()),
        _ => ctx.plugin,
    };
    let details = match err {
        DispatchError::Validation(e) => Some(e.violations.as_slice()),
        _ => None,
    };

    PluginResponse::json(
        err.status(),
        &ErrorBody {
            error: err.name(),
            message: err.to_string(),
            code: err.code(),
            plugin,
            details,
            stack: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn ctx(environment: Environment) -> ErrorContext<'static> {
        ErrorContext {
            plugin: Some("users"),
            environment,
        }
    }

    #[test]
    fn test_internal_error_hidden_in_production() {
        let err = DispatchError::Internal(anyhow::anyhow!("database password rejected"));
        let response = default_error_response(&err, ctx(Environment::Production));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = response.json_body().unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Internal Server Error",
                "message": "An unexpected error occurred"
            })
        );
    }

    #[test]
    fn test_internal_error_detailed_in_development() {
        let err = DispatchError::Internal(anyhow::anyhow!("database password rejected"));
        let response = default_error_response(&err, ctx(Environment::Development));

        let body: Value = response.json_body().unwrap();
        assert_eq!(body["message"], "database password rejected");
        assert!(body["stack"].as_str().unwrap().contains("database password rejected"));
    }

    #[test]
    fn test_declared_status_error_shape() {
        let err = DispatchError::from(
            HttpFailure::new(StatusCode::PAYMENT_REQUIRED, "QuotaError", "Quota exhausted")
                .with_code("QUOTA"),
        );
        let response = default_error_response(&err, ctx(Environment::Production));
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let body: Value = response.json_body().unwrap();
        assert_eq!(body["error"], "QuotaError");
        assert_eq!(body["message"], "Quota exhausted");
        assert_eq!(body["code"], "QUOTA");
        assert_eq!(body["plugin"], "users");
    }

    #[test]
    fn test_validation_error_lists_violations() {
        let err = ValidationError {
            plugin: "a".into(),
            violations: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "Plugin 'a' failed validation: first; second");

        let response = default_error_response(&err.into(), ctx(Environment::Production));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json_body().unwrap();
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = DispatchError::from(TimeoutError {
            scope: TimeoutScope::Middleware,
            name: Some("auth".into()),
            after: Duration::from_millis(50),
        });
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code(), Some("MIDDLEWARE_TIMEOUT"));
        assert_eq!(err.to_string(), "Middleware 'auth' timed out after 50ms");
    }
}
