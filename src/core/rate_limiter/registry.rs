//! Per-client bucket lifecycle and tier lookup

use super::bucket::TokenBucket;
use super::types::{ClientStatus, RateLimitDecision, Tier};
use crate::core::clock::Clock;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One record per known client id.
#[derive(Debug)]
struct ClientRecord {
    tier: Tier,
    bucket: TokenBucket,
}

impl ClientRecord {
    fn new(tier: Tier, now: std::time::Instant) -> Self {
        Self {
            tier,
            bucket: TokenBucket::new(tier.capacity(), tier.refill_per_second(), now),
        }
    }
}

/// Registry of per-client token buckets.
///
/// Entries are created lazily at the default tier on first observation of a
/// client id. The sharded map makes mutations linearizable per client while
/// keeping distinct clients independent.
pub struct RateLimiterRegistry {
    clients: DashMap<String, ClientRecord>,
    default_tier: Tier,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiterRegistry {
    /// Create a registry with the given default tier and idle eviction
    /// threshold.
    pub fn new(default_tier: Tier, idle_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: DashMap::new(),
            default_tier,
            idle_timeout,
            clock,
        }
    }

    /// Check whether a request of `cost` tokens is admitted for `client_id`.
    ///
    /// Unknown clients get a full bucket at the default tier. The caller
    /// samples `now` once per request so admission observes a consistent
    /// timestamp.
    pub fn check(&self, client_id: &str, cost: u32, now: std::time::Instant) -> RateLimitDecision {
        // Avoid the String allocation when the record already exists.
        if let Some(mut record) = self.clients.get_mut(client_id) {
            return record.bucket.try_take(cost, now);
        }
        self.clients
            .entry(client_id.to_string())
            .or_insert_with(|| {
                debug!(client_id, tier = %self.default_tier, "creating client record");
                ClientRecord::new(self.default_tier, now)
            })
            .bucket
            .try_take(cost, now)
    }

    /// Set a client's tier, replacing its bucket with a fresh full bucket
    /// for the new tier.
    ///
    /// A tier change is a policy change: carrying drained state across the
    /// boundary would punish a promotion or reward a demotion.
    pub fn set_tier(&self, client_id: &str, tier: Tier) {
        let now = self.clock.now();
        self.clients
            .entry(client_id.to_string())
            .and_modify(|record| {
                info!(client_id, old = %record.tier, new = %tier, "tier changed");
                *record = ClientRecord::new(tier, now);
            })
            .or_insert_with(|| {
                info!(client_id, tier = %tier, "tier assigned to new client");
                ClientRecord::new(tier, now)
            });
    }

    /// Refill a client's bucket to capacity. Returns false if unknown.
    pub fn reset(&self, client_id: &str) -> bool {
        let now = self.clock.now();
        match self.clients.get_mut(client_id) {
            Some(mut record) => {
                record.bucket.reset(now);
                true
            }
            None => false,
        }
    }

    /// Bucket status for a single client, if known.
    pub fn status(&self, client_id: &str) -> Option<ClientStatus> {
        let now = self.clock.now();
        self.clients.get(client_id).map(|record| ClientStatus {
            client_id: client_id.to_string(),
            tier: record.tier,
            available_tokens: record.bucket.available(now),
            capacity: record.bucket.capacity(),
            refill_per_second: record.bucket.refill_rate(),
        })
    }

    /// Snapshot of all known client records for the admin endpoint.
    pub fn list(&self) -> Vec<ClientStatus> {
        let now = self.clock.now();
        let mut statuses: Vec<ClientStatus> = self
            .clients
            .iter()
            .map(|entry| ClientStatus {
                client_id: entry.key().clone(),
                tier: entry.value().tier,
                available_tokens: entry.value().bucket.available(now),
                capacity: entry.value().bucket.capacity(),
                refill_per_second: entry.value().bucket.refill_rate(),
            })
            .collect();
        statuses.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        statuses
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether any clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Evict records whose bucket has not been touched within the idle
    /// timeout. Returns the number of evicted clients.
    pub fn cleanup_idle(&self) -> usize {
        let now = self.clock.now();
        let idle_timeout = self.idle_timeout;
        let before = self.clients.len();
        self.clients.retain(|_, record| {
            now.saturating_duration_since(record.bucket.last_refill()) <= idle_timeout
        });
        let evicted = before - self.clients.len();
        if evicted > 0 {
            info!(evicted, "evicted idle client records");
        }
        evicted
    }

    /// Start the background eviction task, sweeping every 60 seconds.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                registry.cleanup_idle();
            }
        });
    }
}

impl std::fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("clients", &self.clients.len())
            .field("default_tier", &self.default_tier)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
