//! Circuit breaker types and data structures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Upstream is failing, requests are rejected
    Open,
    /// Testing recovery with a single probe at a time
    HalfOpen,
}

/// Outcome of a forwarded request, as judged by the admission pipeline.
///
/// 4xx responses are the client's problem, not the upstream's; only 5xx,
/// transport errors, timeouts and cancellations count as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Thresholds and timings for one breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker from closed
    pub failure_threshold: u32,
    /// Dwell in open before admitting a probe
    pub recovery_timeout: Duration,
    /// Consecutive probe successes required to close again
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// Forward the request; the breaker expects exactly one report for it
    Admit,
    /// Reject with the remaining recovery window as a retry hint
    Reject {
        /// Time until a probe may be admitted; zero while a probe is in
        /// flight
        retry_after: Duration,
    },
}

impl AdmitDecision {
    /// Whether the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmitDecision::Admit)
    }
}

/// Cumulative request counts for one breaker.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BreakerStats {
    /// Requests reported to this breaker
    pub total_requests: u64,
    /// Reported successes
    pub successful_requests: u64,
    /// Reported failures
    pub failed_requests: u64,
}

/// Point-in-time view of a breaker for the admin endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Upstream name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures observed
    pub consecutive_failures: u32,
    /// Seconds since the breaker last opened, if it ever did
    pub seconds_since_opened: Option<f64>,
    /// Seconds spent in the current state
    pub seconds_in_state: f64,
    /// Cumulative counts
    pub stats: BreakerStats,
}
