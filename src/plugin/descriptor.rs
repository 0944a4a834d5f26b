//! Plugin descriptors and the builder used to assemble them.
//!
//! A descriptor is the unit of registration: a name, a version, a route map
//! of path → method → handler, an optional middleware list and optional
//! lifecycle hooks.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::HandlerResult;
use crate::http::{HttpMethod, PluginRequest};
use crate::plugin::context::RequestContext;
use crate::plugin::hooks::{HookResult, LifecycleHooks};
use crate::routing::middleware::{middleware_fn, MiddlewareFn, Next};

/// A route handler.
pub type Handler = Arc<dyn Fn(PluginRequest, RequestContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Route template → method → handler.
pub type RouteMap = BTreeMap<String, BTreeMap<HttpMethod, Handler>>;

/// Wrap an async closure as a `Handler`.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |req, ctx| f(req, ctx).boxed())
}

/// Informational fields; none of them affect dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Plugin name → version requirement. Recorded, not resolved.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

/// One middleware contributed by a plugin.
#[derive(Clone)]
pub struct MiddlewareDescriptor {
    pub name: String,
    pub handler: MiddlewareFn,
    /// Higher runs first. Defaults to 0.
    pub priority: i32,
    /// Path prefixes to apply to; `None` or empty applies to every path.
    pub routes: Option<Vec<String>>,
}

impl MiddlewareDescriptor {
    pub fn new(name: impl Into<String>, handler: MiddlewareFn) -> Self {
        Self {
            name: name.into(),
            handler,
            priority: 0,
            routes: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = Some(routes.into_iter().map(Into::into).collect());
        self
    }
}

impl std::fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("routes", &self.routes)
            .finish()
    }
}

/// Everything a plugin hands to `PluginRegistry::register`.
#[derive(Clone, Default)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub metadata: PluginMetadata,
    pub routes: RouteMap,
    pub middleware: Vec<MiddlewareDescriptor>,
    pub hooks: LifecycleHooks,
}

impl PluginDescriptor {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> PluginBuilder {
        PluginBuilder::new(name, version)
    }

    /// (path, method) pairs in path order.
    pub fn route_keys(&self) -> impl Iterator<Item = (&str, HttpMethod)> + '_ {
        self.routes
            .iter()
            .flat_map(|(path, methods)| methods.keys().map(move |m| (path.as_str(), *m)))
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self
            .route_keys()
            .map(|(path, method)| format!("{} {}", method, path))
            .collect();
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("metadata", &self.metadata)
            .field("routes", &routes)
            .field("middleware", &self.middleware)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Fluent construction of a `PluginDescriptor`.
///
/// ```ignore
/// let plugin = PluginDescriptor::builder("users", "1.0.0")
///     .get("/api/users/:id", |_req, ctx| async move {
///         Ok(PluginResponse::ok_json(&json!({ "id": ctx.param("id") })))
///     })
///     .build();
/// ```
#[must_use]
pub struct PluginBuilder {
    descriptor: PluginDescriptor,
}

impl PluginBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            descriptor: PluginDescriptor {
                name: name.into(),
                version: version.into(),
                ..Default::default()
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.metadata.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.descriptor.metadata.author = Some(author.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.descriptor.metadata.keywords.push(keyword.into());
        self
    }

    pub fn dependency(mut self, plugin: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.descriptor
            .metadata
            .dependencies
            .insert(plugin.into(), requirement.into());
        self
    }

    /// Add a route. A later call for the same path and method replaces the handler.
    pub fn route_with(mut self, path: impl Into<String>, method: HttpMethod, handler: Handler) -> Self {
        self.descriptor
            .routes
            .entry(path.into())
            .or_default()
            .insert(method, handler);
        self
    }

    pub fn route<F, Fut>(self, path: impl Into<String>, method: HttpMethod, f: F) -> Self
    where
        F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route_with(path, method, handler(f))
    }

    pub fn get<F, Fut>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(path, HttpMethod::Get, f)
    }

    pub fn post<F, Fut>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(path, HttpMethod::Post, f)
    }

    pub fn put<F, Fut>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(path, HttpMethod::Put, f)
    }

    pub fn delete<F, Fut>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(path, HttpMethod::Delete, f)
    }

    pub fn patch<F, Fut>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(PluginRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(path, HttpMethod::Patch, f)
    }

    pub fn middleware(mut self, middleware: MiddlewareDescriptor) -> Self {
        self.descriptor.middleware.push(middleware);
        self
    }

    /// Shorthand for a middleware with a priority and no route filter.
    pub fn middleware_fn<F, Fut>(self, name: impl Into<String>, priority: i32, f: F) -> Self
    where
        F: Fn(PluginRequest, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.middleware(MiddlewareDescriptor::new(name, middleware_fn(f)).priority(priority))
    }

    pub fn on_init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.descriptor.hooks.on_init = Some(Arc::new(move || f().boxed()));
        self
    }

    pub fn on_destroy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.descriptor.hooks.on_destroy = Some(Arc::new(move || f().boxed()));
        self
    }

    pub fn on_route_register<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, HttpMethod) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.descriptor.hooks.on_route_register = Some(Arc::new(move |path, method| f(path, method).boxed()));
        self
    }

    pub fn on_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.descriptor.hooks.on_request = Some(Arc::new(move |req| f(req).boxed()));
        self
    }

    pub fn on_response<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PluginRequest, StatusCode) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.descriptor.hooks.on_response = Some(Arc::new(move |req, status| f(req, status).boxed()));
        self
    }

    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PluginRequest, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.descriptor.hooks.on_error = Some(Arc::new(move |req, message| f(req, message).boxed()));
        self
    }

    pub fn build(self) -> PluginDescriptor {
        self.descriptor
    }
}
