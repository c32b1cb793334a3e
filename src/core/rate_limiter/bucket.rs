//! Token bucket capacity and refill math

use super::types::RateLimitDecision;
use std::time::{Duration, Instant};

/// Comparison slack for double-precision token arithmetic.
const TOKEN_EPSILON: f64 = 1e-9;

/// Token bucket for a single client.
///
/// Tokens are a continuous lazy function of monotonic time: the balance is
/// recomputed on access and clamped to capacity. All mutation happens under
/// the owning registry's per-entry lock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Credit tokens for elapsed time and clamp to capacity.
    ///
    /// A clock regression (`now` before `last_refill`) credits nothing and
    /// leaves the refill mark in place.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if !elapsed.is_zero() {
            self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate)
                .min(self.capacity as f64);
        }
        self.last_refill = self.last_refill.max(now);
    }

    /// Try to take `cost` tokens from the bucket.
    ///
    /// On denial the retry hint is the time until `cost` tokens accumulate,
    /// rounded up to the next millisecond so a retry at `now + retry_after`
    /// succeeds. A cost above capacity is a permanent denial.
    pub fn try_take(&mut self, cost: u32, now: Instant) -> RateLimitDecision {
        if cost == 0 {
            return RateLimitDecision::Allowed {
                remaining: self.tokens,
            };
        }

        self.refill(now);

        if cost > self.capacity {
            return RateLimitDecision::Denied {
                retry_after: Duration::MAX,
                permanent: true,
            };
        }

        let cost = cost as f64;
        if self.tokens >= cost - TOKEN_EPSILON {
            self.tokens = (self.tokens - cost).max(0.0);
            return RateLimitDecision::Allowed {
                remaining: self.tokens,
            };
        }

        let wait_secs = (cost - self.tokens) / self.refill_rate;
        let retry_after = Duration::from_millis((wait_secs * 1000.0).ceil() as u64).max(
            Duration::from_millis(1),
        );
        RateLimitDecision::Denied {
            retry_after,
            permanent: false,
        }
    }

    /// Current token balance after lazy refill, without mutating the bucket.
    pub fn available(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity as f64)
    }

    /// Refill the bucket to capacity.
    pub fn reset(&mut self, now: Instant) {
        self.tokens = self.capacity as f64;
        self.last_refill = now;
    }

    /// Bucket capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Instant of the last refill, used by idle eviction.
    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}
