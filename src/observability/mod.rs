//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry, router, hooks, server
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the server into every dispatch log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
