//! Bounded, concurrent request metrics
//!
//! Per-route counters plus latency windows, and the three global gate
//! counters. Counters are lock-free atomics; each route's latency window is
//! guarded by its own mutex so routes never contend with each other.

use super::latency::{LatencyPercentiles, LatencyWindow};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Admission gate outcomes tracked globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Passed both the limiter and the breaker
    Allowed,
    /// Denied by the rate limiter
    RateLimited,
    /// Rejected by a circuit breaker
    CircuitRejected,
}

/// Counters and latency window for a single route.
#[derive(Debug)]
struct RouteMetrics {
    requests_total: AtomicU64,
    status_2xx: AtomicU64,
    status_3xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    errors_total: AtomicU64,
    latency: Mutex<LatencyWindow>,
}

impl RouteMetrics {
    fn new(window_size: usize) -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            status_2xx: AtomicU64::new(0),
            status_3xx: AtomicU64::new(0),
            status_4xx: AtomicU64::new(0),
            status_5xx: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            latency: Mutex::new(LatencyWindow::new(window_size)),
        }
    }
}

/// Counts by status class for one route.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusClassCounts {
    #[serde(rename = "2xx")]
    pub success_2xx: u64,
    #[serde(rename = "3xx")]
    pub redirect_3xx: u64,
    #[serde(rename = "4xx")]
    pub client_error_4xx: u64,
    #[serde(rename = "5xx")]
    pub server_error_5xx: u64,
}

/// Immutable per-route view at snapshot time.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSnapshot {
    /// Requests recorded for the route
    pub requests_total: u64,
    /// Counts by status class
    pub by_status_class: StatusClassCounts,
    /// 5xx and transport failures
    pub errors_total: u64,
}

/// Global gate counters at snapshot time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GateCounters {
    pub allowed_total: u64,
    pub rate_limited_total: u64,
    pub circuit_rejected_total: u64,
}

/// Immutable view of all counters at the moment of call.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the store was created
    pub uptime_seconds: u64,
    /// Admission gate counters
    pub gates: GateCounters,
    /// Per-route counters
    pub routes: BTreeMap<String, RouteSnapshot>,
}

/// Concurrent metrics store shared by every in-flight request.
#[derive(Debug)]
pub struct MetricsStore {
    routes: DashMap<String, RouteMetrics>,
    allowed_total: AtomicU64,
    rate_limited_total: AtomicU64,
    circuit_rejected_total: AtomicU64,
    window_size: usize,
    started_at: Instant,
}

impl MetricsStore {
    /// Create a store whose latency windows retain `window_size`
    /// observations per route.
    pub fn new(window_size: usize) -> Self {
        Self {
            routes: DashMap::new(),
            allowed_total: AtomicU64::new(0),
            rate_limited_total: AtomicU64::new(0),
            circuit_rejected_total: AtomicU64::new(0),
            window_size,
            started_at: Instant::now(),
        }
    }

    /// Record one forwarded request: counters plus a latency observation.
    pub fn record(&self, route: &str, status_code: u16, latency_ms: f64) {
        // Avoid the String allocation when the route is already tracked.
        let entry = match self.routes.get(route) {
            Some(entry) => entry,
            None => self
                .routes
                .entry(route.to_string())
                .or_insert_with(|| RouteMetrics::new(self.window_size))
                .downgrade(),
        };

        entry.requests_total.fetch_add(1, Ordering::Relaxed);
        match status_code / 100 {
            2 => entry.status_2xx.fetch_add(1, Ordering::Relaxed),
            3 => entry.status_3xx.fetch_add(1, Ordering::Relaxed),
            4 => entry.status_4xx.fetch_add(1, Ordering::Relaxed),
            _ => entry.status_5xx.fetch_add(1, Ordering::Relaxed),
        };
        if status_code >= 500 {
            entry.errors_total.fetch_add(1, Ordering::Relaxed);
        }
        entry.latency.lock().observe(latency_ms);
    }

    /// Count an admission gate outcome.
    pub fn record_gate(&self, kind: GateKind) {
        let counter = match kind {
            GateKind::Allowed => &self.allowed_total,
            GateKind::RateLimited => &self.rate_limited_total,
            GateKind::CircuitRejected => &self.circuit_rejected_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Immutable view of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let routes = self
            .routes
            .iter()
            .map(|entry| {
                let m = entry.value();
                (
                    entry.key().clone(),
                    RouteSnapshot {
                        requests_total: m.requests_total.load(Ordering::Relaxed),
                        by_status_class: StatusClassCounts {
                            success_2xx: m.status_2xx.load(Ordering::Relaxed),
                            redirect_3xx: m.status_3xx.load(Ordering::Relaxed),
                            client_error_4xx: m.status_4xx.load(Ordering::Relaxed),
                            server_error_5xx: m.status_5xx.load(Ordering::Relaxed),
                        },
                        errors_total: m.errors_total.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            gates: GateCounters {
                allowed_total: self.allowed_total.load(Ordering::Relaxed),
                rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
                circuit_rejected_total: self.circuit_rejected_total.load(Ordering::Relaxed),
            },
            routes,
        }
    }

    /// Latency percentiles per route at the moment of call.
    pub fn latency_snapshot(&self) -> BTreeMap<String, LatencyPercentiles> {
        self.routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().latency.lock().percentiles()))
            .collect()
    }
}
