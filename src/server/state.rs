//! Application state shared across HTTP handlers

use crate::config::Config;
use crate::core::circuit_breaker::{BreakerConfig, BreakerRegistry};
use crate::core::clock::Clock;
use crate::core::pipeline::AdmissionPipeline;
use crate::core::rate_limiter::RateLimiterRegistry;
use crate::core::router::{Forwarder, RouteTable};
use crate::monitoring::MetricsStore;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared resources handed to every request handler.
///
/// All subsystems are constructed once at boot and passed by reference;
/// nothing here is a process-wide implicit singleton.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (read-only after boot)
    pub config: Arc<Config>,
    /// Admission pipeline for proxied requests
    pub pipeline: Arc<AdmissionPipeline>,
    /// Rate limiter registry, exposed for the admin surface
    pub limiter: Arc<RateLimiterRegistry>,
    /// Circuit breaker registry, exposed for the admin surface
    pub breakers: Arc<BreakerRegistry>,
    /// Metrics store
    pub metrics: Arc<MetricsStore>,
}

impl AppState {
    /// Build every subsystem from configuration with an injected clock.
    pub fn from_config(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let gateway = &config.gateway;

        let limiter = Arc::new(RateLimiterRegistry::new(
            gateway.default_tier,
            gateway.idle_timeout(),
            Arc::clone(&clock),
        ));

        let breaker_configs: HashMap<String, BreakerConfig> = gateway
            .upstreams
            .iter()
            .map(|(name, upstream)| {
                (
                    name.clone(),
                    BreakerConfig {
                        failure_threshold: upstream.failure_threshold,
                        recovery_timeout: upstream.recovery_timeout(),
                        success_threshold: upstream.success_threshold,
                    },
                )
            })
            .collect();
        let breakers = Arc::new(BreakerRegistry::new(
            breaker_configs,
            BreakerConfig::default(),
            Arc::clone(&clock),
        ));

        let metrics = Arc::new(MetricsStore::new(gateway.latency_window));
        let routes = Arc::new(RouteTable::from_config(gateway)?);
        let forwarder = Forwarder::new()?;

        let pipeline = Arc::new(AdmissionPipeline::new(
            Arc::clone(&limiter),
            Arc::clone(&breakers),
            Arc::clone(&metrics),
            routes,
            forwarder,
            clock,
            gateway.client_header.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            pipeline,
            limiter,
            breakers,
            metrics,
        })
    }

    /// Get gateway configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
