//! Registry and router behavior exercised through the public API.

use std::sync::Arc;

use axum::http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};

use plugin_router::config::Environment;
use plugin_router::error::RegistrationCode;
use plugin_router::http::{HttpMethod, PluginRequest, PluginResponse};
use plugin_router::plugin::{MiddlewareDescriptor, PluginDescriptor};
use plugin_router::routing::middleware_fn;
use plugin_router::RegistryError;

mod common;

fn get(path: &str) -> PluginRequest {
    PluginRequest::parse(HttpMethod::Get, &format!("http://localhost{}", path)).unwrap()
}

#[tokio::test]
async fn test_users_scenario() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let router = common::new_router(registry.clone(), Environment::Production);

    let res = router.handle(get("/api/users/123")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json_body().unwrap();
    assert_eq!(body, json!({ "id": "123" }));

    let res = router.handle(get("/api/users")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let stats = registry.get_stats();
    assert_eq!(stats.total_plugins, 1);
    assert_eq!(stats.total_routes, 2);
}

#[tokio::test]
async fn test_route_uniqueness_across_plugins() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let routes_before = registry.routes();

    let clash = common::text_plugin("accounts", "/api/users/:id", "clash");
    let err = registry.register(clash).await.unwrap_err();
    match err {
        RegistryError::Registration(e) => {
            assert_eq!(e.code, RegistrationCode::RouteConflict);
            assert_eq!(e.plugin, "accounts");
        }
        other => panic!("expected route conflict, got {:?}", other),
    }

    assert_eq!(registry.routes(), routes_before);
    assert!(registry.get_plugin("accounts").is_none());
}

#[tokio::test]
async fn test_middleware_priority_onion() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorder = |name: &'static str, log: Arc<Mutex<Vec<String>>>| {
        middleware_fn(move |req, next| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{}-before", name));
                let res = next(req).await;
                log.lock().push(format!("{}-after", name));
                res
            }
        })
    };

    let handler_log = log.clone();
    let plugin = PluginDescriptor::builder("onion", "1.0.0")
        .get("/layers", move |_req, _ctx| {
            let log = handler_log.clone();
            async move {
                log.lock().push("handler".into());
                Ok(PluginResponse::empty(StatusCode::OK))
            }
        })
        .middleware(MiddlewareDescriptor::new("a", recorder("A", log.clone())).priority(10))
        .middleware(MiddlewareDescriptor::new("b", recorder("B", log.clone())).priority(20))
        .build();

    let registry = common::new_registry(Environment::Production);
    registry.register(plugin).await.unwrap();
    let router = common::new_router(registry, Environment::Production);

    assert_eq!(router.handle(get("/layers")).await.status(), StatusCode::OK);
    assert_eq!(
        *log.lock(),
        vec!["B-before", "A-before", "handler", "A-after", "B-after"]
    );
}

#[tokio::test]
async fn test_middleware_from_other_plugin_applies_by_prefix() {
    let auth = PluginDescriptor::builder("auth", "1.0.0")
        .middleware(
            MiddlewareDescriptor::new(
                "require-token",
                middleware_fn(|req, next| async move {
                    if req.header("authorization").is_some() {
                        next(req).await
                    } else {
                        Ok(PluginResponse::empty(StatusCode::UNAUTHORIZED))
                    }
                }),
            )
            .routes(["/api"]),
        )
        .build();

    let registry = common::new_registry(Environment::Production);
    registry.register(auth).await.unwrap();
    registry.register(common::users_plugin()).await.unwrap();
    registry
        .register(common::text_plugin("public", "/public", "open"))
        .await
        .unwrap();
    let router = common::new_router(registry, Environment::Production);

    assert_eq!(router.handle(get("/api/users")).await.status(), StatusCode::UNAUTHORIZED);
    let authed = get("/api/users").with_header("Authorization", "Bearer t");
    assert_eq!(router.handle(authed).await.status(), StatusCode::OK);
    assert_eq!(router.handle(get("/public")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unregister_removes_routes_and_middleware() {
    let registry = common::new_registry(Environment::Production);
    let plugin = PluginDescriptor::builder("blocker", "1.0.0")
        .get("/blocker", |_req, _ctx| async { Ok(PluginResponse::empty(StatusCode::OK)) })
        .middleware_fn("block-all", 1, |_req, _next| async {
            Ok(PluginResponse::empty(StatusCode::FORBIDDEN))
        })
        .build();
    registry.register(plugin).await.unwrap();
    registry.register(common::users_plugin()).await.unwrap();
    let router = common::new_router(registry.clone(), Environment::Production);

    assert_eq!(router.handle(get("/api/users")).await.status(), StatusCode::FORBIDDEN);

    assert!(registry.unregister("blocker").await);
    assert_eq!(router.handle(get("/api/users")).await.status(), StatusCode::OK);
    assert_eq!(router.handle(get("/blocker")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(registry.get_stats().total_middleware, 0);
}

#[tokio::test]
async fn test_not_found_for_unknown_method_on_known_path() {
    let registry = common::new_registry(Environment::Production);
    registry.register(common::users_plugin()).await.unwrap();
    let router = common::new_router(registry, Environment::Production);

    let req = PluginRequest::parse(HttpMethod::Delete, "http://localhost/api/users").unwrap();
    let res = router.handle(req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json_body().unwrap();
    assert_eq!(
        body,
        json!({ "error": "Not Found", "message": "No handler found for DELETE /api/users" })
    );
}

#[tokio::test]
async fn test_lifecycle_hooks_fire_in_order() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let (init_log, route_log, destroy_log) = (log.clone(), log.clone(), log.clone());

    let plugin = PluginDescriptor::builder("hooked", "1.0.0")
        .get("/a", |_req, _ctx| async { Ok(PluginResponse::empty(StatusCode::OK)) })
        .post("/b", |_req, _ctx| async { Ok(PluginResponse::empty(StatusCode::OK)) })
        .on_init(move || {
            let log = init_log.clone();
            async move {
                log.lock().push("init".into());
                Ok(())
            }
        })
        .on_route_register(move |path, method| {
            let log = route_log.clone();
            async move {
                log.lock().push(format!("route {} {}", method, path));
                Ok(())
            }
        })
        .on_destroy(move || {
            let log = destroy_log.clone();
            async move {
                log.lock().push("destroy".into());
                Err(anyhow::anyhow!("cleanup failed"))
            }
        })
        .build();

    let registry = common::new_registry(Environment::Development);
    registry.register(plugin).await.unwrap();
    // A failing destroy hook must not affect the outcome
    assert!(registry.unregister("hooked").await);

    assert_eq!(
        *log.lock(),
        vec!["init", "route GET /a", "route POST /b", "destroy"]
    );
}
