//! Streaming latency percentile estimation
//!
//! Bounded ring of the most recent observations with an on-demand
//! sorted-copy percentile. Exact over the window and cheap to reason about;
//! a sketch would save memory the gateway's traffic volumes do not need.

use serde::Serialize;
use std::collections::VecDeque;

/// Default number of observations retained per route.
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// The four quantiles exported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyPercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Bounded window of latency observations in milliseconds.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl LatencyWindow {
    /// Create a window retaining at most `max_samples` observations.
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples.min(DEFAULT_WINDOW_SIZE)),
            max_samples: max_samples.max(1),
        }
    }

    /// Record one latency observation, evicting the oldest at capacity
    /// (O(1) amortized).
    pub fn observe(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Nearest-rank percentile over the current window: the sorted value at
    /// index `ceil(q * m) - 1` for a window of size `m`. Returns 0.0 on an
    /// empty window.
    pub fn percentile(&self, q: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let m = sorted.len();
        let rank = ((q * m as f64).ceil() as usize).clamp(1, m);
        sorted[rank - 1]
    }

    /// All exported quantiles in one pass over the sorted window.
    pub fn percentiles(&self) -> LatencyPercentiles {
        if self.samples.is_empty() {
            return LatencyPercentiles {
                p50: 0.0,
                p90: 0.0,
                p95: 0.0,
                p99: 0.0,
            };
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let m = sorted.len();
        let rank = |q: f64| sorted[((q * m as f64).ceil() as usize).clamp(1, m) - 1];
        LatencyPercentiles {
            p50: rank(0.5),
            p90: rank(0.9),
            p95: rank(0.95),
            p99: rank(0.99),
        }
    }

    /// Number of observations currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no observations.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
