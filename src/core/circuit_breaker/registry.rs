//! Per-upstream breaker lifecycle

use super::breaker::CircuitBreaker;
use super::types::{BreakerConfig, BreakerSnapshot};
use crate::core::clock::Clock;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of circuit breakers keyed by upstream name.
///
/// Breakers are created lazily with the thresholds configured for that
/// upstream, falling back to defaults. The registry is bounded by the
/// configured upstream count.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    configs: HashMap<String, BreakerConfig>,
    default_config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    /// Create a registry with per-upstream configurations.
    pub fn new(
        configs: HashMap<String, BreakerConfig>,
        default_config: BreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breakers: DashMap::new(),
            configs,
            default_config,
            clock,
        }
    }

    /// Get or lazily create the breaker for an upstream.
    pub fn breaker(&self, upstream: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(upstream) {
            return Arc::clone(&breaker);
        }
        let config = self
            .configs
            .get(upstream)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone());
        self.breakers
            .entry(upstream.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(upstream, config, self.clock.now())))
            .clone()
    }

    /// Snapshot of every breaker for the admin endpoint.
    pub fn snapshot_all(&self) -> Vec<BreakerSnapshot> {
        let now = self.clock.now();
        let mut snapshots: Vec<BreakerSnapshot> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot(now))
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Reset every breaker back to closed.
    pub fn reset_all(&self) {
        let now = self.clock.now();
        for entry in self.breakers.iter() {
            entry.value().reset(now);
        }
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.breakers.len())
            .field("default_config", &self.default_config)
            .finish()
    }
}
