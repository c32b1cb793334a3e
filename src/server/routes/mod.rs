//! HTTP route modules
//!
//! Admin endpoints are registered before the proxy catch-all so they stay
//! reachable regardless of client rate limits.

pub mod admin;
pub mod proxy;
