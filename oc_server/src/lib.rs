//! OpenClass HTTP server.
//!
//! A thin binary around the [`open_class`] library: configuration loading,
//! structured logging, Prometheus metrics and the axum API surface. The
//! modules are exposed as a library target so integration tests can build
//! the router without spawning a process.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
