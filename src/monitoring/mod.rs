//! Observability for the gateway
//!
//! Request counters, admission gate counters, and streaming latency
//! percentiles, all safe to touch from every in-flight request.

pub mod latency;
pub mod metrics;

pub use latency::{LatencyPercentiles, LatencyWindow, DEFAULT_WINDOW_SIZE};
pub use metrics::{GateKind, MetricsSnapshot, MetricsStore, RouteSnapshot};
