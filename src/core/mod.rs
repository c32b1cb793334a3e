//! Core gateway functionality
//!
//! The hot-path subsystems: admission (rate limiter + circuit breaker),
//! routing and forwarding, and the clock abstraction that keeps them
//! testable.

pub mod circuit_breaker;
pub mod clock;
pub mod pipeline;
pub mod rate_limiter;
pub mod router;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pipeline::{AdmissionPipeline, ProxyRequest, ProxyResponse};
