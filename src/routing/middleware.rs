//! Middleware chain execution.
//!
//! # Execution Model
//! ```text
//! priority 20 ──before──▶ priority 10 ──before──▶ handler
//! priority 20 ◀──after─── priority 10 ◀──after───┘
//! ```
//!
//! Each middleware receives a `Next` continuation that runs the rest of the
//! chain. Code before `next` runs in priority order, code after it in reverse.
//! Not calling `next` short-circuits the chain; returning `Err` aborts it.
//!
//! # Design Decisions
//! - The list is sorted by the registry; the chain only executes it
//! - `Next` is `FnOnce`, so the rest of the chain runs at most once
//! - Timeouts race the middleware against a timer; the losing future is dropped

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::{HandlerResult, TimeoutError, TimeoutScope};
use crate::http::PluginRequest;

/// Continuation that runs the remainder of the chain.
pub type Next = Box<dyn FnOnce(PluginRequest) -> BoxFuture<'static, HandlerResult> + Send>;

/// A middleware function.
pub type MiddlewareFn = Arc<dyn Fn(PluginRequest, Next) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Innermost step of the chain, normally the route handler.
pub type Terminal = Box<dyn FnOnce(PluginRequest) -> BoxFuture<'static, HandlerResult> + Send>;

/// Wrap an async closure as a `MiddlewareFn`.
pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn
where
    F: Fn(PluginRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |req, next| f(req, next).boxed())
}

/// A middleware entry in the registry's global list.
#[derive(Clone)]
pub struct MiddlewareRecord {
    pub name: String,
    pub handler: MiddlewareFn,
    /// Higher runs first.
    pub priority: i32,
    /// Path prefixes this middleware applies to; `None` applies everywhere.
    pub routes: Option<Vec<String>>,
    /// Plugin that registered it.
    pub owner: String,
    /// Global insertion order, used to keep sorting stable across rebuilds.
    pub sequence: u64,
}

impl MiddlewareRecord {
    /// Whether this middleware runs for the (sanitized) request path.
    pub fn applies_to(&self, path: &str) -> bool {
        match &self.routes {
            None => true,
            Some(prefixes) if prefixes.is_empty() => true,
            Some(prefixes) => prefixes.iter().any(|p| path.starts_with(p.as_str())),
        }
    }
}

impl std::fmt::Debug for MiddlewareRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareRecord")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("routes", &self.routes)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Deadlines applied while running a chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainConfig {
    pub chain_timeout: Option<Duration>,
    pub middleware_timeout: Option<Duration>,
}

/// Executes an ordered middleware list around a terminal handler.
#[derive(Clone)]
pub struct MiddlewareChain {
    middleware: Arc<[MiddlewareRecord]>,
    config: ChainConfig,
}

impl MiddlewareChain {
    /// `middleware` must already be in execution order.
    pub fn new(middleware: Vec<MiddlewareRecord>, config: ChainConfig) -> Self {
        Self {
            middleware: middleware.into(),
            config,
        }
    }

    /// Run the chain, ending in `terminal`.
    pub async fn execute(&self, request: PluginRequest, terminal: Terminal) -> HandlerResult {
        tracing::trace!(
            middleware_count = self.middleware.len(),
            path = %request.path(),
            "Executing middleware chain"
        );

        let run = self.execute_from(0, request, terminal);
        match self.config.chain_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                TimeoutError {
                    scope: TimeoutScope::Chain,
                    name: None,
                    after: limit,
                }
            })?,
            None => run.await,
        }
    }

    fn execute_from(
        &self,
        index: usize,
        request: PluginRequest,
        terminal: Terminal,
    ) -> BoxFuture<'static, HandlerResult> {
        let Some(record) = self.middleware.get(index) else {
            tracing::trace!("Middleware chain complete, calling handler");
            return terminal(request);
        };

        let handler = record.handler.clone();
        let name = record.name.clone();
        let chain = self.clone();
        let limit = self.config.middleware_timeout;

        async move {
            tracing::trace!(middleware = %name, index, "Executing middleware");
            let next: Next = Box::new(move |req| chain.execute_from(index + 1, req, terminal));
            let step = handler(request, next);
            match limit {
                Some(limit) => tokio::time::timeout(limit, step).await.map_err(|_| {
                    TimeoutError {
                        scope: TimeoutScope::Middleware,
                        name: Some(name),
                        after: limit,
                    }
                })?,
                None => step.await,
            }
        }
        .boxed()
    }
}
