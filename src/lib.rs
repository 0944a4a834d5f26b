//! Plugin registry and request router.
//!
//! Plugins declare routes, middleware and lifecycle hooks; a single entry
//! point resolves each request to the owning plugin's handler and runs it
//! inside the priority-ordered middleware chain.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod plugin;
pub mod routing;

pub use config::schema::AppConfig;
pub use error::{DispatchError, HttpFailure, RegistryError};
pub use http::{HttpMethod, HttpServer, PluginRequest, PluginResponse};
pub use lifecycle::Shutdown;
pub use plugin::{PluginDescriptor, RequestContext};
pub use routing::{PluginRegistry, Router};
