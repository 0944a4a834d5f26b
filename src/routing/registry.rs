//! The plugin registry: owner of the plugin, route and middleware tables.
//!
//! # Responsibilities
//! - Admit plugins (capacity, name uniqueness, validation, route conflicts)
//! - Remove plugins along with exactly the routes and middleware they own
//! - Resolve a (path, method) to a handler, its params and applicable middleware
//! - Report statistics and a read-only view of plugins and routes
//!
//! # Design Decisions
//! - All tables live in one immutable snapshot swapped atomically (ArcSwap)
//! - Readers never lock; writers serialize on a mutex and clone-modify-store
//! - A failed `register` leaves the published snapshot untouched
//! - Lifecycle hooks fire after the writer lock is released
//! - Static templates beat parameterized ones; otherwise first registered wins

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::config::{Environment, RegistryConfig};
use crate::error::{HandlerResult, RegistrationError, RegistryError, RouteError};
use crate::http::{HttpMethod, PluginRequest};
use crate::observability::metrics;
use crate::plugin::context::RequestContext;
use crate::plugin::descriptor::{Handler, PluginDescriptor, PluginMetadata};
use crate::plugin::hooks::{HookDispatcher, LifecycleHooks};
use crate::plugin::validation::validate_plugin;
use crate::routing::matcher::{is_template, match_path, sanitize_path, PathParams};
use crate::routing::middleware::MiddlewareRecord;

/// Public view of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub metadata: PluginMetadata,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    /// Owned routes as `"METHOD /path"`.
    pub routes: Vec<String>,
    /// Names of the middleware this plugin contributed.
    pub middleware: Vec<String>,
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub path: String,
    pub method: HttpMethod,
    pub plugin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    pub total_plugins: usize,
    pub enabled_plugins: usize,
    /// Distinct (path, method) pairs.
    pub total_routes: usize,
    pub total_paths: usize,
    pub total_middleware: usize,
    pub uptime_secs: u64,
    /// Resident memory of this process, when the platform reports it.
    pub memory_bytes: Option<u64>,
}

/// Result of a successful lookup, built fresh for every dispatch.
#[derive(Clone)]
pub struct RouteMatch {
    pub plugin: PluginInfo,
    /// The matched template, e.g. `/api/users/:id`.
    pub route: String,
    pub method: HttpMethod,
    pub handler: Handler,
    pub params: PathParams,
    /// Applicable middleware in execution order.
    pub middleware: Vec<MiddlewareRecord>,
    pub hooks: LifecycleHooks,
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("plugin", &self.plugin.name)
            .field("route", &self.route)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("middleware", &self.middleware)
            .finish()
    }
}

#[derive(Clone)]
struct RouteTarget {
    owner: String,
    handler: Handler,
}

#[derive(Clone)]
struct PathEntry {
    /// Order in which the path first appeared in the table.
    sequence: u64,
    is_static: bool,
    methods: BTreeMap<HttpMethod, RouteTarget>,
}

#[derive(Clone)]
struct PluginRecord {
    info: PluginInfo,
    hooks: LifecycleHooks,
    /// Sanitized (path, method) pairs this plugin owns.
    owned: Vec<(String, HttpMethod)>,
    sequence: u64,
}

#[derive(Clone, Default)]
struct RegistryState {
    plugins: HashMap<String, PluginRecord>,
    routes: HashMap<String, PathEntry>,
    /// Sorted by descending priority, then insertion order.
    middleware: Vec<MiddlewareRecord>,
    next_sequence: u64,
}

impl RegistryState {
    fn owner_of(&self, path: &str, method: HttpMethod) -> Option<&str> {
        self.routes
            .get(path)
            .and_then(|entry| entry.methods.get(&method))
            .map(|target| target.owner.as_str())
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    fn sorted_plugins(&self) -> Vec<&PluginRecord> {
        let mut records: Vec<&PluginRecord> = self.plugins.values().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }
}

pub struct PluginRegistry {
    state: ArcSwap<RegistryState>,
    writer: Mutex<()>,
    config: RegistryConfig,
    environment: Environment,
    hooks: HookDispatcher,
    started_at: Instant,
    /// Only this process is ever refreshed.
    system: Mutex<System>,
}

impl PluginRegistry {
    pub fn new(config: RegistryConfig, environment: Environment) -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::default()),
            writer: Mutex::new(()),
            config,
            environment,
            hooks: HookDispatcher::new(environment),
            started_at: Instant::now(),
            system: Mutex::new(System::new()),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Register a plugin. On error nothing observable has changed.
    pub async fn register(&self, plugin: PluginDescriptor) -> Result<(), RegistryError> {
        let result = self.admit(plugin);
        let (name, hooks, routes) = match result {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::warn!(error = %e, "Plugin registration rejected");
                metrics::record_registry_event("rejected");
                return Err(e);
            }
        };

        tracing::info!(plugin = %name, routes = routes.len(), "Plugin registered");
        metrics::record_registry_event("registered");

        self.hooks.init(&name, &hooks).await;
        for (path, method) in &routes {
            self.hooks.route_registered(&name, &hooks, path, *method).await;
        }
        Ok(())
    }

    /// Validate and publish under the writer lock. Returns what the hooks need.
    fn admit(
        &self,
        plugin: PluginDescriptor,
    ) -> Result<(String, LifecycleHooks, Vec<(String, HttpMethod)>), RegistryError> {
        let _guard = self.writer.lock();
        let current = self.state.load_full();

        if current.plugins.len() >= self.config.max_plugins {
            return Err(RegistrationError::max_plugins_exceeded(&plugin.name, self.config.max_plugins).into());
        }
        if current.plugins.contains_key(&plugin.name) {
            return Err(RegistrationError::already_exists(&plugin.name).into());
        }
        validate_plugin(&plugin)?;

        let mut claimed: Vec<(String, HttpMethod, Handler)> = Vec::new();
        let mut seen: HashSet<(String, HttpMethod)> = HashSet::new();
        for (path, methods) in &plugin.routes {
            let path = sanitize_path(path);
            for (method, handler) in methods {
                if let Some(owner) = current.owner_of(&path, *method) {
                    return Err(RegistrationError::route_conflict(&plugin.name, *method, &path, owner).into());
                }
                if !seen.insert((path.clone(), *method)) {
                    return Err(
                        RegistrationError::route_conflict(&plugin.name, *method, &path, &plugin.name).into(),
                    );
                }
                claimed.push((path.clone(), *method, handler.clone()));
            }
        }

        let mut next = (*current).clone();
        let PluginDescriptor {
            name,
            version,
            metadata,
            middleware,
            hooks,
            ..
        } = plugin;

        let mut owned = Vec::with_capacity(claimed.len());
        for (path, method, handler) in claimed {
            if !next.routes.contains_key(&path) {
                let sequence = next.bump();
                next.routes.insert(
                    path.clone(),
                    PathEntry {
                        sequence,
                        is_static: !is_template(&path),
                        methods: BTreeMap::new(),
                    },
                );
            }
            if let Some(entry) = next.routes.get_mut(&path) {
                entry.methods.insert(
                    method,
                    RouteTarget {
                        owner: name.clone(),
                        handler,
                    },
                );
            }
            owned.push((path, method));
        }

        let middleware_names = middleware.iter().map(|m| m.name.clone()).collect();
        for mw in middleware {
            let sequence = next.bump();
            next.middleware.push(MiddlewareRecord {
                name: mw.name,
                handler: mw.handler,
                priority: mw.priority,
                routes: mw.routes,
                owner: name.clone(),
                sequence,
            });
        }
        next.middleware
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));

        let sequence = next.bump();
        next.plugins.insert(
            name.clone(),
            PluginRecord {
                info: PluginInfo {
                    name: name.clone(),
                    version,
                    metadata,
                    enabled: true,
                    created_at: Utc::now(),
                    routes: owned.iter().map(|(p, m)| format!("{} {}", m, p)).collect(),
                    middleware: middleware_names,
                },
                hooks: hooks.clone(),
                owned: owned.clone(),
                sequence,
            },
        );

        metrics::set_plugin_count(next.plugins.len());
        self.state.store(Arc::new(next));
        Ok((name, hooks, owned))
    }

    /// Remove a plugin with its routes and middleware. False if unknown.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = {
            let _guard = self.writer.lock();
            let current = self.state.load_full();
            let Some(record) = current.plugins.get(name) else {
                return false;
            };

            let mut next = (*current).clone();
            for (path, method) in &record.owned {
                let now_empty = match next.routes.get_mut(path) {
                    Some(entry) => {
                        entry.methods.remove(method);
                        entry.methods.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    next.routes.remove(path);
                }
            }
            next.middleware.retain(|m| m.owner != name);
            let removed = next.plugins.remove(name);

            metrics::set_plugin_count(next.plugins.len());
            self.state.store(Arc::new(next));
            removed
        };

        let Some(record) = removed else {
            return false;
        };
        tracing::info!(plugin = %name, routes = record.owned.len(), "Plugin unregistered");
        metrics::record_registry_event("unregistered");
        self.hooks.destroy(name, &record.hooks).await;
        true
    }

    /// Resolve a request path and method.
    ///
    /// `Ok(None)` covers both an unknown path and a known path without the method.
    pub fn get_handler(&self, path: &str, method: HttpMethod) -> Result<Option<RouteMatch>, RouteError> {
        let state = self.state.load();
        let path = sanitize_path(path);

        let best = state
            .routes
            .iter()
            .filter_map(|(template, entry)| {
                let target = entry.methods.get(&method)?;
                let params = if entry.is_static {
                    (template == &path).then(PathParams::new)?
                } else {
                    match_path(template, &path)?
                };
                Some((template, entry, target, params))
            })
            .min_by_key(|(_, entry, _, _)| (!entry.is_static, entry.sequence));

        let Some((template, _, target, params)) = best else {
            return Ok(None);
        };

        let record = state.plugins.get(&target.owner).ok_or_else(|| RouteError {
            method,
            path: template.clone(),
            owner: target.owner.clone(),
        })?;

        let middleware = state
            .middleware
            .iter()
            .filter(|m| m.applies_to(&path))
            .cloned()
            .collect();

        Ok(Some(RouteMatch {
            plugin: record.info.clone(),
            route: template.clone(),
            method,
            handler: target.handler.clone(),
            params,
            middleware,
            hooks: record.hooks.clone(),
        }))
    }

    /// Invoke the matched handler with a freshly built context.
    pub fn execute_route(&self, route: &RouteMatch, request: PluginRequest) -> BoxFuture<'static, HandlerResult> {
        let ctx = RequestContext::from_request(&request, &route.plugin.name, &route.route, route.params.clone());
        (route.handler)(request, ctx)
    }

    pub fn get_stats(&self) -> RegistryStats {
        let state = self.state.load();
        RegistryStats {
            total_plugins: state.plugins.len(),
            enabled_plugins: state.plugins.values().filter(|r| r.info.enabled).count(),
            total_routes: state.routes.values().map(|e| e.methods.len()).sum(),
            total_paths: state.routes.len(),
            total_middleware: state.middleware.len(),
            uptime_secs: self.uptime_secs(),
            memory_bytes: self.process_memory(),
        }
    }

    /// Number of registered plugins, without building full stats.
    pub fn plugin_count(&self) -> usize {
        self.state.load().plugins.len()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Resident memory of this process. Refreshes a single PID, never the
    /// whole process table.
    fn process_memory(&self) -> Option<u64> {
        let pid = Pid::from_u32(std::process::id());
        let mut sys = self.system.lock();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        sys.process(pid).map(|p| p.memory())
    }

    pub fn enable_plugin(&self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    pub fn disable_plugin(&self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let _guard = self.writer.lock();
        let current = self.state.load_full();
        if !current.plugins.contains_key(name) {
            return false;
        }

        let mut next = (*current).clone();
        if let Some(record) = next.plugins.get_mut(name) {
            record.info.enabled = enabled;
        }
        self.state.store(Arc::new(next));

        if enabled {
            tracing::info!(plugin = %name, "Plugin enabled");
            metrics::record_registry_event("enabled");
        } else {
            tracing::info!(plugin = %name, "Plugin disabled");
            metrics::record_registry_event("disabled");
        }
        true
    }

    pub fn get_plugin(&self, name: &str) -> Option<PluginInfo> {
        self.state.load().plugins.get(name).map(|r| r.info.clone())
    }

    /// All plugins in registration order.
    pub fn get_all_plugins(&self) -> Vec<PluginInfo> {
        self.state
            .load()
            .sorted_plugins()
            .into_iter()
            .map(|r| r.info.clone())
            .collect()
    }

    pub fn get_enabled_plugins(&self) -> Vec<PluginInfo> {
        self.state
            .load()
            .sorted_plugins()
            .into_iter()
            .filter(|r| r.info.enabled)
            .map(|r| r.info.clone())
            .collect()
    }

    /// The route table, sorted by path then method.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let state = self.state.load();
        let mut routes: Vec<RouteInfo> = state
            .routes
            .iter()
            .flat_map(|(path, entry)| {
                entry.methods.iter().map(move |(method, target)| RouteInfo {
                    path: path.clone(),
                    method: *method,
                    plugin: target.owner.clone(),
                })
            })
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path).then(a.method.cmp(&b.method)));
        routes
    }

    /// Drop every table without firing hooks.
    pub fn clear(&self) {
        let _guard = self.writer.lock();
        self.state.store(Arc::new(RegistryState::default()));
        metrics::set_plugin_count(0);
        metrics::record_registry_event("cleared");
        tracing::info!("Registry cleared");
    }
}
