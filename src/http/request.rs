//! The request value handed to plugin middleware and handlers.
//!
//! # Responsibilities
//! - Carry method, full URL, headers and the buffered body
//! - Expose case-insensitive header lookup and body decoding
//! - Convert an incoming axum request into a `PluginRequest`
//!
//! # Design Decisions
//! - The body is buffered once by the server, so reads are synchronous
//! - Cloning is cheap (`Bytes` and `HeaderMap` share their storage)
//! - The URL is absolute so plugins can read scheme, host and query

use axum::http::{request::Parts, uri::Authority, HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::http::method::{HttpMethod, UnsupportedMethod};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Errors raised while turning a wire request into a `PluginRequest`.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Method(#[from] UnsupportedMethod),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone)]
pub struct PluginRequest {
    method: HttpMethod,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl PluginRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Build a request from an absolute URL string.
    pub fn parse(method: HttpMethod, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(method, Url::parse(url)?))
    }

    /// Build a request from the parts of an incoming HTTP request.
    ///
    /// Path and query always come from the request target. The `Host`
    /// header only supplies the authority, and only when it parses as one;
    /// anything else falls back to `localhost`.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Result<Self, RequestError> {
        let method = HttpMethod::try_from(&parts.method)?;

        let url = match parts.uri.scheme_str() {
            Some(_) => Url::parse(&parts.uri.to_string())?,
            None => {
                let mut url = Url::parse("http://localhost")?;
                let authority = parts
                    .headers
                    .get(axum::http::header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|h| h.parse::<Authority>().ok());
                if let Some(authority) = authority {
                    if url.set_host(Some(authority.host())).is_ok() {
                        let _ = url.set_port(authority.port_u16());
                    } else {
                        tracing::debug!(host = %authority, "Ignoring unusable Host header");
                        url = Url::parse("http://localhost")?;
                    }
                }
                url.set_path(parts.uri.path());
                url.set_query(parts.uri.query());
                url
            }
        };

        Ok(Self {
            method,
            url,
            headers: parts.headers.clone(),
            body,
        })
    }

    /// Add a header, skipping names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid request header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_from_parts_uses_host_header() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/users?active=true")
            .header("Host", "example.com:8080")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();

        let plugin_req = PluginRequest::from_parts(&parts, Bytes::from_static(b"{}")).unwrap();
        assert_eq!(plugin_req.method(), HttpMethod::Post);
        assert_eq!(plugin_req.url().host_str(), Some("example.com"));
        assert_eq!(plugin_req.path(), "/api/users");
        assert_eq!(plugin_req.query(), Some("active=true"));
    }

    #[test]
    fn test_from_parts_path_comes_from_request_target() {
        for host in ["example.com/admin", "example.com?", "example.com#frag", "exa mple.com"] {
            let req = Request::builder()
                .uri("/public?page=2")
                .header("Host", host)
                .body(())
                .unwrap();
            let (parts, _) = req.into_parts();

            let plugin_req = PluginRequest::from_parts(&parts, Bytes::new()).unwrap();
            assert_eq!(plugin_req.path(), "/public", "host {:?}", host);
            assert_eq!(plugin_req.query(), Some("page=2"), "host {:?}", host);
            assert_eq!(plugin_req.url().host_str(), Some("localhost"), "host {:?}", host);
        }
    }

    #[test]
    fn test_from_parts_without_host_header() {
        let req = Request::builder().uri("/a/b").body(()).unwrap();
        let (parts, _) = req.into_parts();

        let plugin_req = PluginRequest::from_parts(&parts, Bytes::new()).unwrap();
        assert_eq!(plugin_req.url().as_str(), "http://localhost/a/b");
    }

    #[test]
    fn test_from_parts_rejects_unknown_method() {
        let req = Request::builder().method("TRACE").uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        assert!(matches!(
            PluginRequest::from_parts(&parts, Bytes::new()),
            Err(RequestError::Method(_))
        ));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = PluginRequest::parse(HttpMethod::Get, "http://localhost/")
            .unwrap()
            .with_header("Authorization", "Bearer abc");
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer abc"));
    }

    #[test]
    fn test_json_body() {
        #[derive(serde::Deserialize, Serialize)]
        struct User {
            name: String,
        }

        let req = PluginRequest::parse(HttpMethod::Post, "http://localhost/users")
            .unwrap()
            .with_json(&User { name: "ada".into() })
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.json::<User>().unwrap().name, "ada");
    }
}
