//! Error handling for the gateway
//!
//! This module defines all error types used throughout the gateway and their
//! mapping to HTTP responses.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Retry hint (seconds) surfaced for denials that can never succeed, such as
/// a request whose cost exceeds the bucket capacity.
pub const PERMANENT_RETRY_AFTER_SECS: u64 = 3600;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors, rejected at startup only
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup errors (bind failures)
    #[error("Server error: {0}")]
    Server(String),

    /// Rate limit denial carrying the retry hint in seconds
    #[error("Rate limit exceeded: retry after {retry_after:.3}s")]
    RateLimitExceeded {
        /// Seconds until enough tokens accumulate
        retry_after: f64,
        /// Set when the request cost exceeds bucket capacity and can never
        /// be admitted
        permanent: bool,
    },

    /// Circuit breaker denial for an upstream
    #[error("Circuit open for upstream '{upstream}': retry after {retry_after:.3}s")]
    CircuitOpen {
        /// Upstream service name
        upstream: String,
        /// Seconds remaining in the recovery window
        retry_after: f64,
    },

    /// Transport error reaching an upstream
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Forward exceeded the configured upstream timeout
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Admin call with a tier name outside the canonical set
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a server error
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Retry-After header value in integer seconds, rounded up.
    ///
    /// Permanent rate-limit denials are capped so clients get a large but
    /// finite hint instead of an unbounded wait.
    fn retry_after_header(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimitExceeded {
                retry_after,
                permanent,
            } => {
                if *permanent {
                    Some(PERMANENT_RETRY_AFTER_SECS)
                } else {
                    Some((retry_after.ceil() as u64).max(1))
                }
            }
            GatewayError::CircuitOpen { retry_after, .. } => {
                Some((retry_after.ceil() as u64).max(1))
            }
            _ => None,
        }
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let (status, body) = match self {
            GatewayError::RateLimitExceeded { retry_after, .. } => (
                actix_web::http::StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "rate_limited",
                    "retry_after": retry_after,
                }),
            ),
            GatewayError::CircuitOpen { upstream, .. } => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "upstream_unavailable",
                    "upstream": upstream,
                }),
            ),
            GatewayError::UpstreamUnavailable(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::HttpClient(_) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                json!({"error": "upstream_error"}),
            ),
            GatewayError::UnknownTier(name) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                json!({
                    "error": "unknown_tier",
                    "tier": name,
                }),
            ),
            GatewayError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "detail": msg,
                }),
            ),
            _ => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "internal_error"}),
            ),
        };

        let mut builder = HttpResponse::build(status);
        if let Some(secs) = self.retry_after_header() {
            builder.insert_header(("Retry-After", secs.to_string()));
        }
        builder.json(body)
    }
}
