//! Plugin authoring surface.
//!
//! # Data Flow
//! ```text
//! PluginBuilder (descriptor.rs)
//!     → PluginDescriptor
//!     → validation.rs (structural checks)
//!     → PluginRegistry::register
//!
//! Per request:
//!     context.rs (params, query, headers, cookies) → handler
//!     hooks.rs (isolated lifecycle callbacks)
//! ```

pub mod builtin;
pub mod context;
pub mod descriptor;
pub mod hooks;
pub mod validation;

pub use context::RequestContext;
pub use descriptor::{handler, Handler, MiddlewareDescriptor, PluginBuilder, PluginDescriptor, PluginMetadata};
pub use hooks::{HookKind, HookResult, LifecycleHooks};
