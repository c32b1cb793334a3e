//! Three-state failure detector for a single upstream

use super::types::{
    AdmitDecision, BreakerConfig, BreakerSnapshot, BreakerStats, CircuitState, Outcome,
};
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything the breaker mutates, consolidated under a single lock so the
/// probe accounting and state transitions stay linearizable.
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    state_changed_at: Instant,
    probe_in_flight: bool,
    stats: BreakerStats,
}

/// Circuit breaker for a single upstream service.
///
/// Transitions: Closed→Open after `failure_threshold` consecutive failures;
/// Open→HalfOpen once `recovery_timeout` elapses, admitting the checking
/// caller as the probe; HalfOpen→Closed after `success_threshold`
/// consecutive successes, HalfOpen→Open on any failure. At most one probe is
/// in flight while half-open.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    pub fn new(name: impl Into<String>, config: BreakerConfig, now: Instant) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                state_changed_at: now,
                probe_in_flight: false,
                stats: BreakerStats::default(),
            }),
        }
    }

    /// Upstream name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether a request may be forwarded.
    ///
    /// Admitting from open transitions to half-open and marks the caller as
    /// the probe; [`CircuitBreaker::report`] must then be called exactly
    /// once.
    pub fn allow(&self, now: Instant) -> AdmitDecision {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => AdmitDecision::Admit,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(inner.state_changed_at);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.config.recovery_timeout {
                    debug!(upstream = %self.name, "recovery window elapsed, probing");
                    inner.state = CircuitState::HalfOpen;
                    inner.state_changed_at = now;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.probe_in_flight = true;
                    AdmitDecision::Admit
                } else {
                    AdmitDecision::Reject {
                        retry_after: self.config.recovery_timeout - elapsed,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    AdmitDecision::Reject {
                        retry_after: std::time::Duration::ZERO,
                    }
                } else {
                    inner.probe_in_flight = true;
                    AdmitDecision::Admit
                }
            }
        }
    }

    /// Report the outcome of an admitted request.
    pub fn report(&self, outcome: Outcome, now: Instant) {
        let mut inner = self.inner.lock();

        inner.stats.total_requests += 1;
        match outcome {
            Outcome::Success => inner.stats.successful_requests += 1,
            Outcome::Failure => inner.stats.failed_requests += 1,
        }

        match (inner.state, outcome) {
            (CircuitState::Closed, Outcome::Failure) => {
                inner.consecutive_failures += 1;
                inner.consecutive_successes = 0;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        upstream = %self.name,
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening circuit"
                    );
                    Self::transition_to_open(&mut inner, now);
                }
            }
            (CircuitState::Closed, Outcome::Success) => {
                inner.consecutive_failures = 0;
                inner.consecutive_successes += 1;
            }
            (CircuitState::HalfOpen, Outcome::Success) => {
                inner.probe_in_flight = false;
                inner.consecutive_successes += 1;
                inner.consecutive_failures = 0;
                if inner.consecutive_successes >= self.config.success_threshold {
                    debug!(upstream = %self.name, "probe succeeded, closing circuit");
                    inner.state = CircuitState::Closed;
                    inner.state_changed_at = now;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                }
            }
            (CircuitState::HalfOpen, Outcome::Failure) => {
                warn!(upstream = %self.name, "probe failed, reopening circuit");
                inner.probe_in_flight = false;
                Self::transition_to_open(&mut inner, now);
            }
            // A late report after an external reset only counts in stats.
            (CircuitState::Open, _) => {}
        }
    }

    fn transition_to_open(inner: &mut BreakerInner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.state_changed_at = now;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.probe_in_flight = false;
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Force the breaker back to closed with all counters zeroed.
    pub fn reset(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = None;
        inner.state_changed_at = now;
        inner.probe_in_flight = false;
        inner.stats = BreakerStats::default();
        debug!(upstream = %self.name, "circuit breaker reset");
    }

    /// Point-in-time view for the admin endpoint.
    pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            seconds_since_opened: inner
                .opened_at
                .map(|at| now.saturating_duration_since(at).as_secs_f64()),
            seconds_in_state: now
                .saturating_duration_since(inner.state_changed_at)
                .as_secs_f64(),
            stats: inner.stats,
        }
    }
}
