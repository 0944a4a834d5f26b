//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Check CORS methods against the recognized verbs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{AppConfig, PLACEHOLDER_API_KEY};
use crate::http::HttpMethod;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a valid socket address", config.server.bind_address),
        ));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be greater than 0"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if config.registry.max_plugins == 0 {
        errors.push(ValidationError::new("registry.max_plugins", "must be greater than 0"));
    }

    if config.router.chain_timeout_ms == Some(0) {
        errors.push(ValidationError::new("router.chain_timeout_ms", "must be greater than 0 when set"));
    }
    if config.router.middleware_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "router.middleware_timeout_ms",
            "must be greater than 0 when set",
        ));
    }

    let cors = &config.router.cors;
    for method in &cors.allow_methods {
        if method.parse::<HttpMethod>().is_err() {
            errors.push(ValidationError::new(
                "router.cors.allow_methods",
                format!("'{}' is not a recognized HTTP method", method),
            ));
        }
    }
    if cors.allow_credentials && cors.allow_origin == "*" {
        errors.push(ValidationError::new(
            "router.cors.allow_credentials",
            "credentials cannot be allowed with a wildcard origin",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a valid socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a non-default value when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a valid socket address", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
