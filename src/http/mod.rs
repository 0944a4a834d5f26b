//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum catch-all, request ID, timeout, trace layers)
//!     → request.rs (buffer body, build PluginRequest)
//!     → routing::Router::handle
//!     → response.rs (PluginResponse → axum response)
//!     → Send to client
//! ```

pub mod method;
pub mod request;
pub mod response;
pub mod server;

pub use method::HttpMethod;
pub use request::{PluginRequest, RequestError, X_REQUEST_ID};
pub use response::PluginResponse;
pub use server::HttpServer;
