//! Rate limiter types and data structures

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Client tier governing bucket capacity and refill rate.
///
/// The canonical values are fixed; a tier is a named `(refill_per_second,
/// capacity)` pair, not an open-ended policy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl Tier {
    /// Tokens credited per second.
    pub fn refill_per_second(&self) -> f64 {
        match self {
            Tier::Free => 1.0,
            Tier::Basic => 5.0,
            Tier::Premium => 20.0,
            Tier::Enterprise => 100.0,
        }
    }

    /// Maximum bucket capacity.
    pub fn capacity(&self) -> u32 {
        match self {
            Tier::Free => 10,
            Tier::Basic => 50,
            Tier::Premium => 200,
            Tier::Enterprise => 1000,
        }
    }

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Basic => "BASIC",
            Tier::Premium => "PREMIUM",
            Tier::Enterprise => "ENTERPRISE",
        }
    }

    /// Parse a tier name case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "FREE" => Ok(Tier::Free),
            "BASIC" => Ok(Tier::Basic),
            "PREMIUM" => Ok(Tier::Premium),
            "ENTERPRISE" => Ok(Tier::Enterprise),
            _ => Err(GatewayError::UnknownTier(name.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitDecision {
    /// Request admitted; `remaining` is the token balance after the take.
    Allowed {
        /// Tokens left in the bucket
        remaining: f64,
    },
    /// Request denied.
    Denied {
        /// Time until enough tokens accumulate
        retry_after: Duration,
        /// Set when the requested cost exceeds capacity and can never be
        /// satisfied
        permanent: bool,
    },
}

impl RateLimitDecision {
    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Snapshot of a client's bucket for the admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    /// Client identifier
    pub client_id: String,
    /// Current tier
    pub tier: Tier,
    /// Tokens currently available
    pub available_tokens: f64,
    /// Bucket capacity
    pub capacity: u32,
    /// Refill rate in tokens per second
    pub refill_per_second: f64,
}
