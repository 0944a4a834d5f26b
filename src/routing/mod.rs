//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     PluginDescriptor
//!     → registry.rs (capacity, validation, conflicts)
//!     → matcher.rs (sanitize templates)
//!     → publish new snapshot
//!
//! Dispatch:
//!     PluginRequest
//!     → router.rs (CORS, lookup, enabled check, hooks)
//!     → registry.rs + matcher.rs (template match, params)
//!     → middleware.rs (onion chain around the handler)
//!     → PluginResponse
//! ```
//!
//! # Design Decisions
//! - Registry snapshots are immutable; mutation swaps in a new one
//! - No regex in hot path (segment comparison only)
//! - Deterministic: static templates first, then registration order

pub mod cors;
pub mod matcher;
pub mod middleware;
pub mod registry;
pub mod router;

pub use middleware::{middleware_fn, MiddlewareChain, MiddlewareFn, Next};
pub use registry::{PluginInfo, PluginRegistry, RegistryStats, RouteInfo, RouteMatch};
pub use router::Router;
