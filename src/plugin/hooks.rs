//! Lifecycle hooks and their isolated execution.
//!
//! # Hooks
//! - `onInit`: after the plugin is stored in the registry
//! - `onRouteRegister(path, method)`: once per registered route
//! - `onDestroy`: after the plugin is unregistered
//! - `onRequest` / `onResponse` / `onError`: around each dispatch to the plugin
//!
//! # Design Decisions
//! - A hook returning `Err` or panicking is logged and counted, never propagated
//! - Hooks run outside the registry's writer lock
//! - Development mode logs every successful hook at debug level

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::config::Environment;
use crate::http::{HttpMethod, PluginRequest};
use crate::observability::metrics;

pub type HookResult = anyhow::Result<()>;

pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, HookResult> + Send + Sync>;
pub type RouteRegisterHook = Arc<dyn Fn(String, HttpMethod) -> BoxFuture<'static, HookResult> + Send + Sync>;
pub type RequestHook = Arc<dyn Fn(PluginRequest) -> BoxFuture<'static, HookResult> + Send + Sync>;
pub type ResponseHook =
    Arc<dyn Fn(PluginRequest, StatusCode) -> BoxFuture<'static, HookResult> + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(PluginRequest, String) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Optional callbacks a plugin supplies.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub on_init: Option<LifecycleHook>,
    pub on_destroy: Option<LifecycleHook>,
    pub on_route_register: Option<RouteRegisterHook>,
    pub on_request: Option<RequestHook>,
    pub on_response: Option<ResponseHook>,
    pub on_error: Option<ErrorHook>,
}

impl LifecycleHooks {
    /// Names of the hooks that are set.
    pub fn defined(&self) -> Vec<HookKind> {
        [
            (HookKind::Init, self.on_init.is_some()),
            (HookKind::Destroy, self.on_destroy.is_some()),
            (HookKind::RouteRegister, self.on_route_register.is_some()),
            (HookKind::Request, self.on_request.is_some()),
            (HookKind::Response, self.on_response.is_some()),
            (HookKind::Error, self.on_error.is_some()),
        ]
        .into_iter()
        .filter_map(|(kind, set)| set.then_some(kind))
        .collect()
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.defined().iter().map(HookKind::as_str))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Init,
    Destroy,
    RouteRegister,
    Request,
    Response,
    Error,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Init => "onInit",
            HookKind::Destroy => "onDestroy",
            HookKind::RouteRegister => "onRouteRegister",
            HookKind::Request => "onRequest",
            HookKind::Response => "onResponse",
            HookKind::Error => "onError",
        }
    }
}

pub fn lifecycle_hook<F, Fut>(f: F) -> LifecycleHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Invokes hooks with failure isolation.
#[derive(Debug, Clone, Copy)]
pub struct HookDispatcher {
    environment: Environment,
}

impl HookDispatcher {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub async fn init(&self, plugin: &str, hooks: &LifecycleHooks) {
        if let Some(hook) = &hooks.on_init {
            self.run(plugin, HookKind::Init, || hook()).await;
        }
    }

    pub async fn destroy(&self, plugin: &str, hooks: &LifecycleHooks) {
        if let Some(hook) = &hooks.on_destroy {
            self.run(plugin, HookKind::Destroy, || hook()).await;
        }
    }

    pub async fn route_registered(
        &self,
        plugin: &str,
        hooks: &LifecycleHooks,
        path: &str,
        method: HttpMethod,
    ) {
        if let Some(hook) = &hooks.on_route_register {
            self.run(plugin, HookKind::RouteRegister, || hook(path.to_string(), method))
                .await;
        }
    }

    pub async fn request(&self, plugin: &str, hooks: &LifecycleHooks, request: &PluginRequest) {
        if let Some(hook) = &hooks.on_request {
            self.run(plugin, HookKind::Request, || hook(request.clone())).await;
        }
    }

    pub async fn response(
        &self,
        plugin: &str,
        hooks: &LifecycleHooks,
        request: &PluginRequest,
        status: StatusCode,
    ) {
        if let Some(hook) = &hooks.on_response {
            self.run(plugin, HookKind::Response, || hook(request.clone(), status))
                .await;
        }
    }

    pub async fn error(
        &self,
        plugin: &str,
        hooks: &LifecycleHooks,
        request: &PluginRequest,
        message: &str,
    ) {
        if let Some(hook) = &hooks.on_error {
            self.run(plugin, HookKind::Error, || hook(request.clone(), message.to_string()))
                .await;
        }
    }

    /// Returns whether the hook completed successfully.
    async fn run<F>(&self, plugin: &str, kind: HookKind, invoke: F) -> bool
    where
        F: FnOnce() -> BoxFuture<'static, HookResult>,
    {
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(invoke)) {
            Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        match outcome {
            Ok(Ok(())) => {
                if self.environment.is_development() {
                    tracing::debug!(plugin = %plugin, hook = kind.as_str(), "Lifecycle hook completed");
                }
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(plugin = %plugin, hook = kind.as_str(), error = %e, "Lifecycle hook failed");
                metrics::record_hook_failure(plugin, kind.as_str());
                false
            }
            Err(panic) => {
                tracing::error!(
                    plugin = %plugin,
                    hook = kind.as_str(),
                    panic = %panic_message(panic.as_ref()),
                    "Lifecycle hook panicked"
                );
                metrics::record_hook_failure(plugin, kind.as_str());
                false
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_failing_hook_is_isolated() {
        let hooks = LifecycleHooks {
            on_init: Some(lifecycle_hook(|| async { Err(anyhow::anyhow!("boom")) })),
            ..Default::default()
        };
        let dispatcher = HookDispatcher::new(Environment::Production);
        assert!(!dispatcher.run("p", HookKind::Init, || hooks.on_init.as_ref().unwrap()()).await);
    }

    #[tokio::test]
    async fn test_panicking_hook_is_isolated() {
        let hooks = LifecycleHooks {
            on_destroy: Some(lifecycle_hook(|| async {
                if true {
                    panic!("hook exploded");
                }
                Ok(())
            })),
            ..Default::default()
        };
        // Must return normally
        HookDispatcher::new(Environment::Development)
            .destroy("p", &hooks)
            .await;
    }

    #[tokio::test]
    async fn test_route_register_hook_receives_arguments() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hooks = LifecycleHooks {
            on_route_register: Some(Arc::new(move |path, method| {
                sink.lock().push(format!("{} {}", method, path));
                async { Ok(()) }.boxed()
            })),
            ..Default::default()
        };

        let dispatcher = HookDispatcher::new(Environment::Production);
        dispatcher.route_registered("p", &hooks, "/a/:id", HttpMethod::Put).await;
        assert_eq!(*seen.lock(), vec!["PUT /a/:id".to_string()]);
    }

    #[tokio::test]
    async fn test_only_defined_hooks_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hooks = LifecycleHooks {
            on_init: Some(lifecycle_hook(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })),
            ..Default::default()
        };

        let dispatcher = HookDispatcher::new(Environment::Production);
        dispatcher.init("p", &hooks).await;
        dispatcher.destroy("p", &hooks).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.defined(), vec![HookKind::Init]);
    }
}
