//! orderline Telemetry - structured logging setup
//!
//! Request logging is handled by `tower_http::trace::TraceLayer` in the router.

pub mod tracer;

pub use tracer::{init_tracer, TelemetryConfig};
