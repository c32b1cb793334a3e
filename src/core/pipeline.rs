//! Admission pipeline
//!
//! Composes the rate limiter and circuit breaker into the request path:
//! admit, forward, then report the outcome to the breaker and the metrics
//! store. Limiter and breaker denials are recovered locally into 429/503
//! responses; only forward errors surface to the caller.

use crate::core::circuit_breaker::{AdmitDecision, BreakerRegistry, CircuitBreaker, Outcome};
use crate::core::clock::Clock;
use crate::core::rate_limiter::{RateLimitDecision, RateLimiterRegistry};
use crate::core::router::{Forwarder, RouteTable};
use crate::monitoring::{GateKind, MetricsStore};
use crate::utils::error::{GatewayError, Result, PERMANENT_RETRY_AFTER_SECS};
use bytes::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Inbound request, decoupled from the HTTP framing.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Raw query string, if any
    pub query: Option<String>,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Bytes,
    /// Peer address, used as the client id fallback
    pub peer_addr: Option<String>,
}

/// Response produced by the pipeline for an admitted request.
#[derive(Debug)]
pub struct ProxyResponse {
    /// Upstream status code (or synthesized 500 on a caught panic)
    pub status: u16,
    /// End-to-end response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// Time spent in the forward step, milliseconds
    pub latency_ms: f64,
    /// Token balance after admission
    pub remaining_tokens: f64,
}

/// Reports a failure to the breaker if the request is abandoned before the
/// outcome lands. Tokens are never refunded on cancellation; a client must
/// not gain capacity by aborting expensive requests.
struct ReportGuard {
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    armed: bool,
}

impl ReportGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(upstream = self.breaker.name(), "request cancelled mid-forward");
            self.breaker.report(Outcome::Failure, self.clock.now());
        }
    }
}

/// The per-request admission path.
///
/// Every operation before the forward step is synchronous and bounded-time;
/// the outbound HTTP call is the only suspension point.
pub struct AdmissionPipeline {
    limiter: Arc<RateLimiterRegistry>,
    breakers: Arc<BreakerRegistry>,
    metrics: Arc<MetricsStore>,
    routes: Arc<RouteTable>,
    forwarder: Forwarder,
    clock: Arc<dyn Clock>,
    client_header: String,
}

impl AdmissionPipeline {
    /// Assemble the pipeline from its collaborators.
    pub fn new(
        limiter: Arc<RateLimiterRegistry>,
        breakers: Arc<BreakerRegistry>,
        metrics: Arc<MetricsStore>,
        routes: Arc<RouteTable>,
        forwarder: Forwarder,
        clock: Arc<dyn Clock>,
        client_header: String,
    ) -> Self {
        Self {
            limiter,
            breakers,
            metrics,
            routes,
            forwarder,
            clock,
            client_header: client_header.to_ascii_lowercase(),
        }
    }

    /// Derive the client id: configured header first, then peer address.
    fn client_id(&self, request: &ProxyRequest) -> String {
        request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.client_header))
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
            .or_else(|| request.peer_addr.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    /// Run a request through admission, forward it, and account for the
    /// outcome.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let client_id = self.client_id(&request);
        let request_id = Uuid::new_v4().to_string();
        let cost = self.routes.cost(&request.path);
        // One timestamp per request so both gates observe a consistent now.
        let now = self.clock.now();

        let remaining = match self.limiter.check(&client_id, cost, now) {
            RateLimitDecision::Denied {
                retry_after,
                permanent,
            } => {
                self.metrics.record_gate(GateKind::RateLimited);
                let retry_after = if permanent {
                    PERMANENT_RETRY_AFTER_SECS as f64
                } else {
                    retry_after.as_secs_f64()
                };
                warn!(
                    client_id = %client_id,
                    method = %request.method,
                    path = %request.path,
                    cost,
                    retry_after,
                    permanent,
                    "request rate limited"
                );
                return Err(GatewayError::RateLimitExceeded {
                    retry_after,
                    permanent,
                });
            }
            RateLimitDecision::Allowed { remaining } => remaining,
        };

        let Some((upstream_name, upstream)) = self.routes.resolve(&request.path) else {
            return Err(GatewayError::NotFound(format!(
                "no upstream for {}",
                request.path
            )));
        };

        let breaker = self.breakers.breaker(upstream_name);
        if let AdmitDecision::Reject { retry_after } = breaker.allow(now) {
            self.metrics.record_gate(GateKind::CircuitRejected);
            warn!(
                client_id = %client_id,
                upstream = upstream_name,
                path = %request.path,
                "request rejected by open circuit"
            );
            return Err(GatewayError::CircuitOpen {
                upstream: upstream_name.to_string(),
                retry_after: retry_after.as_secs_f64(),
            });
        }

        let mut guard = ReportGuard {
            breaker: Arc::clone(&breaker),
            clock: Arc::clone(&self.clock),
            armed: true,
        };

        let started = self.clock.now();
        let forward = self.forwarder.forward(
            upstream_name,
            upstream,
            &request.method,
            &request.path,
            request.query.as_deref(),
            &request.headers,
            request.body.clone(),
        );
        let outcome = AssertUnwindSafe(forward).catch_unwind().await;
        let elapsed_ms = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_secs_f64()
            * 1000.0;
        guard.disarm();

        self.metrics.record_gate(GateKind::Allowed);

        match outcome {
            Ok(Ok(response)) => {
                let failed = response.status >= 500
                    || (upstream.treat_429_as_failure && response.status == 429);
                breaker.report(
                    if failed {
                        Outcome::Failure
                    } else {
                        Outcome::Success
                    },
                    self.clock.now(),
                );
                self.metrics.record(&request.path, response.status, elapsed_ms);
                info!(
                    request_id = %request_id,
                    client_id = %client_id,
                    method = %request.method,
                    path = %request.path,
                    upstream = upstream_name,
                    status = response.status,
                    latency_ms = elapsed_ms,
                    "request forwarded"
                );
                let mut headers = response.headers;
                headers.push(("x-request-id".to_string(), request_id));
                Ok(ProxyResponse {
                    status: response.status,
                    headers,
                    body: response.body,
                    latency_ms: elapsed_ms,
                    remaining_tokens: remaining,
                })
            }
            Ok(Err(err)) => {
                breaker.report(Outcome::Failure, self.clock.now());
                // Transport failures count as 5xx towards route metrics.
                self.metrics.record(&request.path, 502, elapsed_ms);
                error!(
                    request_id = %request_id,
                    client_id = %client_id,
                    method = %request.method,
                    path = %request.path,
                    upstream = upstream_name,
                    error = %err,
                    "forward failed"
                );
                Err(err)
            }
            Err(_) => {
                breaker.report(Outcome::Failure, self.clock.now());
                self.metrics.record(&request.path, 500, elapsed_ms);
                error!(
                    request_id = %request_id,
                    client_id = %client_id,
                    path = %request.path,
                    upstream = upstream_name,
                    "panic caught during forward"
                );
                Err(GatewayError::Internal(
                    "request handling panicked".to_string(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for AdmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPipeline")
            .field("client_header", &self.client_header)
            .finish()
    }
}
