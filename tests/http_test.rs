//! End-to-end tests through the HTTP server.

use axum::http::StatusCode;
use serde_json::{json, Value};

use plugin_router::config::{AppConfig, Environment};
use plugin_router::plugin::builtin::system_plugin;

mod common;

#[tokio::test]
async fn test_dispatch_over_http() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let (addr, shutdown, _updates) = common::start_server(AppConfig::default(), registry).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/api/users/7?verbose=1", addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "id": "7" }));

    let res = client.get(format!("http://{}/nope", addr)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "No handler found for GET /nope");

    shutdown.trigger();
}

#[tokio::test]
async fn test_host_header_does_not_change_dispatched_path() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::text_plugin("public", "/public", "PUBLIC")).await.unwrap();
    registry.register(common::text_plugin("admin", "/admin/public", "ADMIN")).await.unwrap();
    let (addr, shutdown, _updates) = common::start_server(AppConfig::default(), registry).await;
    let client = common::client();

    for host in ["example.com/admin", "example.com?"] {
        let res = client
            .get(format!("http://{}/public", addr))
            .header("host", host)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "host {:?}", host);
        assert_eq!(res.text().await.unwrap(), "PUBLIC", "host {:?}", host);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_unsupported_method_is_not_found() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let (addr, shutdown, _updates) = common::start_server(AppConfig::default(), registry).await;

    let method = reqwest::Method::from_bytes(b"PURGE").unwrap();
    let res = common::client()
        .request(method, format!("http://{}/api/users", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    shutdown.trigger();
}

#[tokio::test]
async fn test_body_limit() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let mut config = AppConfig::default();
    config.server.max_body_bytes = 16;
    let (addr, shutdown, _updates) = common::start_server(config, registry).await;

    let res = common::client()
        .post(format!("http://{}/api/users", addr))
        .body(vec![b'x'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    shutdown.trigger();
}

#[tokio::test]
async fn test_chunked_body_over_limit() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let mut config = AppConfig::default();
    config.server.max_body_bytes = 16;
    let (addr, shutdown, _updates) = common::start_server(config, registry).await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let chunk = "x".repeat(64);
    let request = format!(
        "POST /api/users HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n{:x}\r\n{}\r\n0\r\n\r\n",
        chunk.len(),
        chunk
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 413"), "unexpected response: {}", response);

    shutdown.trigger();
}

#[tokio::test]
async fn test_config_reload_enables_cors() {
    let registry = common::new_registry(Environment::Production);
    registry.register(system_plugin(&registry)).await.unwrap();
    let (addr, shutdown, updates) = common::start_server(AppConfig::default(), registry).await;
    let client = common::client();

    let res = client.get(format!("http://{}/_system/health", addr)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.headers().contains_key("access-control-allow-origin"));

    let mut reloaded = AppConfig::default();
    reloaded.router.cors.enabled = true;
    updates.send(reloaded).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let res = client
        .request(reqwest::Method::OPTIONS, format!("http://{}/_system/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(format!("http://{}/_system/health", addr)).send().await.unwrap();
    assert_eq!(
        res.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("*")
    );

    shutdown.trigger();
}
