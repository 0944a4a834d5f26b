//! CORS headers for preflight and regular responses.
//!
//! # Design Decisions
//! - Preflight requests are answered before the route table is consulted
//! - The configured origin is echoed verbatim; no per-origin allow list

use axum::http::{header, HeaderValue, StatusCode};

use crate::config::CorsConfig;
use crate::http::PluginResponse;

/// 204 answer to an `OPTIONS` preflight.
pub fn preflight_response(config: &CorsConfig) -> PluginResponse {
    let mut response = PluginResponse::empty(StatusCode::NO_CONTENT);
    let headers = response.headers_mut();

    insert(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, &config.allow_origin);
    insert(headers, header::ACCESS_CONTROL_ALLOW_METHODS, &config.allow_methods.join(", "));
    insert(headers, header::ACCESS_CONTROL_ALLOW_HEADERS, &config.allow_headers.join(", "));
    insert(
        headers,
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        if config.allow_credentials { "true" } else { "false" },
    );
    insert(headers, header::ACCESS_CONTROL_MAX_AGE, &config.max_age_secs.to_string());
    response
}

/// Add the headers every non-preflight response carries.
pub fn apply_cors_headers(response: &mut PluginResponse, config: &CorsConfig) {
    let headers = response.headers_mut();
    insert(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, &config.allow_origin);
    if config.allow_credentials {
        insert(headers, header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
    }
    if !config.expose_headers.is_empty() {
        insert(headers, header::ACCESS_CONTROL_EXPOSE_HEADERS, &config.expose_headers.join(", "));
    }
}

fn insert(headers: &mut axum::http::HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = %name, value, "Skipping invalid CORS header value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_headers() {
        let config = CorsConfig {
            enabled: true,
            ..Default::default()
        };
        let res = preflight_response(&config);

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(
            res.header("access-control-allow-methods"),
            Some("GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS")
        );
        assert_eq!(res.header("access-control-allow-headers"), Some("Content-Type, Authorization"));
        assert_eq!(res.header("access-control-allow-credentials"), Some("false"));
        assert_eq!(res.header("access-control-max-age"), Some("86400"));
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_response_headers() {
        let config = CorsConfig {
            enabled: true,
            allow_origin: "https://app.example.com".into(),
            allow_credentials: true,
            expose_headers: vec!["X-Request-Id".into()],
            ..Default::default()
        };
        let mut res = PluginResponse::empty(StatusCode::OK);
        apply_cors_headers(&mut res, &config);

        assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example.com"));
        assert_eq!(res.header("access-control-allow-credentials"), Some("true"));
        assert_eq!(res.header("access-control-expose-headers"), Some("X-Request-Id"));
    }
}
