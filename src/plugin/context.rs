//! Per-request context passed to every handler.

use std::collections::HashMap;
use std::str::FromStr;

use axum::http::{header, HeaderMap};

use crate::error::{DispatchError, HttpFailure};
use crate::http::PluginRequest;
use crate::routing::matcher::PathParams;

/// Everything a handler needs besides the raw request: path parameters,
/// query parameters, headers and parsed cookies.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Name of the plugin owning the matched route.
    pub plugin: String,
    /// Route template that matched, e.g. `/api/users/:id`.
    pub route: String,
    pub params: PathParams,
    /// Decoded query pairs in request order. Repeated keys are kept.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub cookies: HashMap<String, String>,
}

impl RequestContext {
    pub fn from_request(request: &PluginRequest, plugin: &str, route: &str, params: PathParams) -> Self {
        Self {
            plugin: plugin.to_string(),
            route: route.to_string(),
            params,
            query: request
                .url()
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            headers: request.headers().clone(),
            cookies: parse_cookies(request.headers()),
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parse a path parameter, answering 400 when it is missing or malformed.
    pub fn param_as<T: FromStr>(&self, name: &str) -> Result<T, DispatchError> {
        let raw = self
            .param(name)
            .ok_or_else(|| HttpFailure::bad_request(format!("Missing path parameter '{}'", name)))?;
        raw.parse().map_err(|_| {
            HttpFailure::bad_request(format!("Invalid value '{}' for path parameter '{}'", raw, name))
                .into()
        })
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Parse every `Cookie` header into a name → value map.
///
/// The first occurrence of a name wins; values are unquoted and
/// percent-decoded when possible.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((name, raw)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let raw = raw.trim();
            let raw = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(raw);
            let decoded = urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            cookies.entry(name.to_string()).or_insert(decoded);
        }
    }
    cookies
}
