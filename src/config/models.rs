//! Configuration models for the gateway

use crate::core::rate_limiter::Tier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_client_header() -> String {
    "X-Client-ID".to_string()
}

fn default_tier() -> Tier {
    Tier::Free
}

fn default_latency_window() -> usize {
    1000
}

fn default_idle_timeout_secs() -> u64 {
    3600
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    3
}

fn default_recovery_timeout_ms() -> u64 {
    30_000
}

fn default_cost() -> u32 {
    1
}

/// Server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Get the server bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for a single upstream service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to
    pub base_url: String,
    /// Forward timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Consecutive failures before the breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive probe successes before the breaker closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Dwell in open before a probe is admitted, milliseconds
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
    /// Count an upstream 429 as a breaker failure
    #[serde(default)]
    pub treat_429_as_failure: bool,
}

impl UpstreamConfig {
    /// Forward timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Recovery timeout as a duration.
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

/// Token cost override for a route pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCostRule {
    /// Regex matched against the request path
    pub pattern: String,
    /// Tokens consumed per request
    #[serde(default = "default_cost")]
    pub cost: u32,
}

/// Routing rule mapping a route pattern to an upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    /// Regex matched against the request path
    pub pattern: String,
    /// Name of the upstream that handles the route
    pub upstream: String,
}

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server bind settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Header carrying the client identifier
    #[serde(default = "default_client_header")]
    pub client_header: String,
    /// Tier assigned to clients on first observation
    #[serde(default = "default_tier")]
    pub default_tier: Tier,
    /// Latency observations retained per route
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
    /// Idle seconds before a client record is evicted
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Per-route token costs (first match wins, unlisted routes cost 1)
    #[serde(default)]
    pub route_costs: Vec<RouteCostRule>,
    /// Routing rules (first match wins, falls back to the `default`
    /// upstream)
    #[serde(default)]
    pub routes: Vec<RouteRule>,
    /// Upstream services by name
    #[serde(default)]
    pub upstreams: HashMap<String, UpstreamConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut upstreams = HashMap::new();
        upstreams.insert(
            "default".to_string(),
            UpstreamConfig {
                base_url: "http://localhost:9000".to_string(),
                timeout_ms: default_timeout_ms(),
                failure_threshold: default_failure_threshold(),
                success_threshold: default_success_threshold(),
                recovery_timeout_ms: default_recovery_timeout_ms(),
                treat_429_as_failure: false,
            },
        );

        Self {
            server: ServerConfig::default(),
            client_header: default_client_header(),
            default_tier: default_tier(),
            latency_window: default_latency_window(),
            idle_timeout_secs: default_idle_timeout_secs(),
            route_costs: vec![
                RouteCostRule {
                    pattern: r"^/api/v1/search".to_string(),
                    cost: 5,
                },
                RouteCostRule {
                    pattern: r"^/api/v1/export".to_string(),
                    cost: 10,
                },
                RouteCostRule {
                    pattern: r"^/api/v1/bulk".to_string(),
                    cost: 20,
                },
            ],
            routes: Vec::new(),
            upstreams,
        }
    }
}

impl GatewayConfig {
    /// Idle eviction threshold as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
