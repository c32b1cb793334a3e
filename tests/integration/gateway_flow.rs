//! End-to-end admission pipeline scenarios
//!
//! These drive the pipeline directly with a manual clock, against either a
//! live in-process upstream stub or an address that refuses connections.

use crate::common::{
    gateway_config, spawn_stub_upstream, spawn_switchable_upstream, state_with_manual_clock,
    unreachable_upstream,
};
use bytes::Bytes;
use rategate_rs::core::pipeline::ProxyRequest;
use rategate_rs::{GatewayError, Tier};
use std::time::Duration;

fn request(path: &str, client: &str) -> ProxyRequest {
    ProxyRequest {
        method: "GET".to_string(),
        path: path.to_string(),
        query: None,
        headers: vec![("X-Client-ID".to_string(), client.to_string())],
        body: Bytes::new(),
        peer_addr: Some("10.0.0.1".to_string()),
    }
}

#[tokio::test]
async fn free_tier_burst_is_capped_at_capacity() {
    let upstream = spawn_stub_upstream(200).await;
    let (state, clock) = state_with_manual_clock(gateway_config(&upstream));

    let mut allowed = 0;
    let mut retry_hints = Vec::new();
    for _ in 0..11 {
        match state.pipeline.handle(request("/api/v1/orders", "burst")).await {
            Ok(response) => {
                assert_eq!(response.status, 200);
                allowed += 1;
            }
            Err(GatewayError::RateLimitExceeded { retry_after, .. }) => {
                retry_hints.push(retry_after);
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(allowed, 10);
    assert_eq!(retry_hints.len(), 1);
    assert!(
        (0.9..=1.1).contains(&retry_hints[0]),
        "retry_after was {}",
        retry_hints[0]
    );

    // One refill interval later the client is admitted again.
    clock.advance(Duration::from_secs(1));
    let response = state
        .pipeline
        .handle(request("/api/v1/orders", "burst"))
        .await
        .expect("request after refill should pass");
    assert_eq!(response.status, 200);

    let gates = state.metrics.snapshot().gates;
    assert_eq!(gates.allowed_total, 11);
    assert_eq!(gates.rate_limited_total, 1);
}

#[tokio::test]
async fn tier_change_takes_instant_effect() {
    let upstream = spawn_stub_upstream(200).await;
    let (state, _clock) = state_with_manual_clock(gateway_config(&upstream));

    for _ in 0..10 {
        state
            .pipeline
            .handle(request("/api/v1/orders", "acme"))
            .await
            .expect("within free capacity");
    }
    assert!(matches!(
        state.pipeline.handle(request("/api/v1/orders", "acme")).await,
        Err(GatewayError::RateLimitExceeded { .. })
    ));

    state.limiter.set_tier("acme", Tier::Premium);
    let response = state
        .pipeline
        .handle(request("/api/v1/orders", "acme"))
        .await
        .expect("promoted client should pass");
    assert!((response.remaining_tokens - 199.0).abs() < 1e-6);
}

#[tokio::test]
async fn expensive_routes_drain_faster() {
    let upstream = spawn_stub_upstream(200).await;
    let (state, _clock) = state_with_manual_clock(gateway_config(&upstream));
    state.limiter.set_tier("search-heavy", Tier::Basic);

    // BASIC holds 50 tokens; the search route costs 5 per request.
    for i in 0..10 {
        state
            .pipeline
            .handle(request("/api/v1/search", "search-heavy"))
            .await
            .unwrap_or_else(|e| panic!("request {} should pass: {}", i, e));
    }
    match state
        .pipeline
        .handle(request("/api/v1/search", "search-heavy"))
        .await
    {
        Err(GatewayError::RateLimitExceeded { retry_after, .. }) => {
            assert!(
                (0.9..=1.1).contains(&retry_after),
                "retry_after was {}",
                retry_after
            );
        }
        other => panic!("expected rate limit denial, got {:?}", other.map(|r| r.status)),
    }
}

#[tokio::test]
async fn breaker_trips_on_transport_failures() {
    let mut config = gateway_config(&unreachable_upstream());
    config
        .gateway
        .upstreams
        .get_mut("default")
        .unwrap()
        .timeout_ms = 500;
    let (state, clock) = state_with_manual_clock(config);

    for i in 0..3 {
        let err = state
            .pipeline
            .handle(request("/api/v1/orders", "probe-client"))
            .await
            .expect_err("unreachable upstream must fail");
        assert!(
            matches!(err, GatewayError::UpstreamUnavailable(_)),
            "request {} returned {}",
            i,
            err
        );
    }

    // Threshold reached: the next request is rejected without forwarding.
    match state
        .pipeline
        .handle(request("/api/v1/orders", "probe-client"))
        .await
    {
        Err(GatewayError::CircuitOpen {
            upstream,
            retry_after,
        }) => {
            assert_eq!(upstream, "default");
            assert!(retry_after > 0.0 && retry_after <= 5.0);
        }
        other => panic!("expected circuit rejection, got {:?}", other.map(|r| r.status)),
    }
    assert_eq!(state.metrics.snapshot().gates.circuit_rejected_total, 1);

    // After the recovery window a probe is admitted and fails again.
    clock.advance(Duration::from_secs(5));
    assert!(matches!(
        state
            .pipeline
            .handle(request("/api/v1/orders", "probe-client"))
            .await,
        Err(GatewayError::UpstreamUnavailable(_))
    ));
    assert!(matches!(
        state
            .pipeline
            .handle(request("/api/v1/orders", "probe-client"))
            .await,
        Err(GatewayError::CircuitOpen { .. })
    ));
}

#[tokio::test]
async fn breaker_recovers_after_probe_successes() {
    let (upstream, status) = spawn_switchable_upstream().await;
    let (state, clock) = state_with_manual_clock(gateway_config(&upstream));

    // Three 500s trip the breaker.
    status.store(500, std::sync::atomic::Ordering::SeqCst);
    for _ in 0..3 {
        let response = state
            .pipeline
            .handle(request("/api/v1/orders", "recovering"))
            .await
            .expect("5xx responses are still relayed");
        assert_eq!(response.status, 500);
    }
    assert!(matches!(
        state
            .pipeline
            .handle(request("/api/v1/orders", "recovering"))
            .await,
        Err(GatewayError::CircuitOpen { .. })
    ));

    // Upstream heals; two probe successes close the circuit.
    status.store(200, std::sync::atomic::Ordering::SeqCst);
    clock.advance(Duration::from_secs(5));
    for _ in 0..2 {
        let response = state
            .pipeline
            .handle(request("/api/v1/orders", "recovering"))
            .await
            .expect("probe should be admitted");
        assert_eq!(response.status, 200);
    }

    // Closed again: requests flow freely.
    let response = state
        .pipeline
        .handle(request("/api/v1/orders", "recovering"))
        .await
        .expect("circuit should be closed");
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn forward_relays_status_headers_and_body() {
    let upstream = spawn_stub_upstream(200).await;
    let (state, _clock) = state_with_manual_clock(gateway_config(&upstream));

    let response = state
        .pipeline
        .handle(request("/api/v1/orders", "relay"))
        .await
        .expect("forward should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], br#"{"ok":true}"#);
    assert!(response
        .headers
        .iter()
        .any(|(name, value)| name == "x-stub-header" && value == "present"));
    assert!(response
        .headers
        .iter()
        .any(|(name, _)| name == "x-request-id"));

    let snapshot = state.metrics.snapshot();
    let route = &snapshot.routes["/api/v1/orders"];
    assert_eq!(route.requests_total, 1);
    assert_eq!(route.by_status_class.success_2xx, 1);
    assert_eq!(route.errors_total, 0);
    assert!(state
        .metrics
        .latency_snapshot()
        .contains_key("/api/v1/orders"));
}

#[tokio::test]
async fn missing_client_header_falls_back_to_peer_address() {
    let upstream = spawn_stub_upstream(200).await;
    let (state, _clock) = state_with_manual_clock(gateway_config(&upstream));

    let mut req = request("/api/v1/orders", "unused");
    req.headers.clear();
    state
        .pipeline
        .handle(req)
        .await
        .expect("request should pass");

    let clients = state.limiter.list();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].client_id, "10.0.0.1");
}

#[tokio::test]
async fn transport_failures_count_as_server_errors() {
    let mut config = gateway_config(&unreachable_upstream());
    config
        .gateway
        .upstreams
        .get_mut("default")
        .unwrap()
        .timeout_ms = 500;
    let (state, _clock) = state_with_manual_clock(config);

    let _ = state
        .pipeline
        .handle(request("/api/v1/orders", "errs"))
        .await;

    let snapshot = state.metrics.snapshot();
    let route = &snapshot.routes["/api/v1/orders"];
    assert_eq!(route.by_status_class.server_error_5xx, 1);
    assert_eq!(route.errors_total, 1);
}
