//! # rategate-rs
//!
//! High-performance async rate-limited API gateway. A single ingress point
//! that admits, shapes, and observes traffic for a small fleet of backend
//! services.
//!
//! ## Features
//!
//! - **Token-bucket rate limiting**: Per-client admission control with
//!   tiered refill policies (FREE/BASIC/PREMIUM/ENTERPRISE) and per-route
//!   cost weighting
//! - **Circuit breaking**: Per-upstream three-state failure detectors with
//!   timed recovery and single-probe admission
//! - **Observability**: Bounded concurrent counters and streaming latency
//!   percentiles per route, exported over an admin surface
//! - **Reverse proxy**: Transparent forwarding to configured upstreams with
//!   per-upstream timeouts
//!
//! ## Gateway Mode
//!
//! ```rust,no_run
//! use rategate_rs::server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     server::run_server().await.map_err(|e| e.into())
//! }
//! ```
//!
//! ## Library Use
//!
//! The admission subsystems are plain types constructed at boot; nothing is
//! a process-wide singleton, and the monotonic clock is injected so policy
//! behavior is deterministic under test.
//!
//! ```rust
//! use rategate_rs::core::clock::{Clock, SystemClock};
//! use rategate_rs::core::rate_limiter::{RateLimiterRegistry, Tier};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(SystemClock);
//! let limiter = RateLimiterRegistry::new(Tier::Free, Duration::from_secs(3600), clock.clone());
//! assert!(limiter.check("client-1", 1, clock.now()).is_allowed());
//! ```

pub mod config;
pub mod core;
pub mod monitoring;
pub mod server;
pub mod utils;

pub use config::Config;
pub use core::circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use core::clock::{Clock, ManualClock, SystemClock};
pub use core::pipeline::{AdmissionPipeline, ProxyRequest, ProxyResponse};
pub use core::rate_limiter::{RateLimiterRegistry, Tier, TokenBucket};
pub use monitoring::{LatencyWindow, MetricsStore};
pub use utils::error::{GatewayError, Result};
