//! Configuration management for the gateway
//!
//! Settings come from environment variables, optionally supplemented by a
//! YAML file carrying the upstream table and routing rules. Invalid
//! configuration is rejected at startup, never at request time.

pub mod models;

pub use models::{GatewayConfig, RouteCostRule, RouteRule, ServerConfig, UpstreamConfig};

use crate::core::rate_limiter::Tier;
use crate::utils::error::{GatewayError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the YAML file with upstreams and routes.
pub const UPSTREAMS_FILE_ENV: &str = "GATEWAY_UPSTREAMS_FILE";

/// Main configuration struct for the gateway.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Gateway configuration
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from the environment, reading the upstream table
    /// file when `GATEWAY_UPSTREAMS_FILE` is set.
    pub async fn load() -> Result<Self> {
        let mut config = match std::env::var(UPSTREAMS_FILE_ENV) {
            Ok(path) => Self::from_file(&path).await?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the upstream table and routing rules from a YAML file.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::config(format!("failed to read {:?}: {}", path, e)))?;

        let gateway: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::config(format!("failed to parse {:?}: {}", path, e)))?;

        debug!("Configuration file loaded");
        Ok(Self { gateway })
    }

    /// Overlay environment variables onto the current configuration.
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            self.gateway.server.host = host;
        }
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            self.gateway.server.port = port
                .parse()
                .map_err(|_| GatewayError::config(format!("invalid GATEWAY_PORT: {}", port)))?;
        }
        if let Ok(header) = std::env::var("GATEWAY_CLIENT_HEADER") {
            self.gateway.client_header = header;
        }
        if let Ok(tier) = std::env::var("GATEWAY_DEFAULT_TIER") {
            self.gateway.default_tier = Tier::parse(&tier)
                .map_err(|_| GatewayError::config(format!("invalid GATEWAY_DEFAULT_TIER: {}", tier)))?;
        }
        if let Ok(window) = std::env::var("GATEWAY_LATENCY_WINDOW") {
            self.gateway.latency_window = window.parse().map_err(|_| {
                GatewayError::config(format!("invalid GATEWAY_LATENCY_WINDOW: {}", window))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration, failing fast on anything a request-time
    /// path would otherwise trip over.
    pub fn validate(&self) -> Result<()> {
        let gateway = &self.gateway;

        if gateway.client_header.is_empty() {
            return Err(GatewayError::config("client header must not be empty"));
        }
        if gateway.latency_window == 0 {
            return Err(GatewayError::config("latency window must be positive"));
        }

        for (name, upstream) in &gateway.upstreams {
            if upstream.base_url.is_empty() {
                return Err(GatewayError::config(format!(
                    "upstream '{}' has an empty base_url",
                    name
                )));
            }
            if upstream.failure_threshold == 0 {
                return Err(GatewayError::config(format!(
                    "upstream '{}': failure_threshold must be at least 1",
                    name
                )));
            }
            if upstream.success_threshold == 0 {
                return Err(GatewayError::config(format!(
                    "upstream '{}': success_threshold must be at least 1",
                    name
                )));
            }
            if upstream.recovery_timeout_ms == 0 {
                return Err(GatewayError::config(format!(
                    "upstream '{}': recovery_timeout_ms must be positive",
                    name
                )));
            }
            if upstream.timeout_ms == 0 {
                return Err(GatewayError::config(format!(
                    "upstream '{}': timeout_ms must be positive",
                    name
                )));
            }
        }

        for rule in &gateway.route_costs {
            if rule.cost == 0 {
                return Err(GatewayError::config(format!(
                    "route cost for '{}' must be at least 1",
                    rule.pattern
                )));
            }
        }

        for rule in &gateway.routes {
            if !gateway.upstreams.contains_key(&rule.upstream) {
                return Err(GatewayError::config(format!(
                    "route '{}' points at unknown upstream '{}'",
                    rule.pattern, rule.upstream
                )));
            }
        }

        Ok(())
    }

    /// Server configuration accessor.
    pub fn server(&self) -> &ServerConfig {
        &self.gateway.server
    }
}
