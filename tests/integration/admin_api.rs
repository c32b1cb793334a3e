//! HTTP surface tests for the admin and proxy routes

use crate::common::{gateway_config, spawn_stub_upstream, state_with_manual_clock};
use actix_web::{test, web, App};
use rategate_rs::server::routes;
use serde_json::Value;

macro_rules! spawn_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::admin::configure_routes)
                .configure(routes::proxy::configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn health_reports_ok() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_seconds"].is_u64());
}

#[actix_web::test]
async fn ready_reports_ready() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/ready").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ready");
}

#[actix_web::test]
async fn tier_assignment_roundtrip() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::post()
        .uri("/clients/acme/tier")
        .set_json(serde_json::json!({"tier": "premium"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["client_id"], "acme");
    assert_eq!(body["tier"], "PREMIUM");

    let req = test::TestRequest::get().uri("/clients").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let clients = body.as_array().expect("clients should be a list");
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["tier"], "PREMIUM");
    assert_eq!(clients[0]["capacity"], 200);
}

#[actix_web::test]
async fn unknown_tier_is_rejected() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::post()
        .uri("/clients/acme/tier")
        .set_json(serde_json::json!({"tier": "GOLD"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "unknown_tier");
}

#[actix_web::test]
async fn rate_limit_status_and_reset() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::get()
        .uri("/rate-limits/status/ghost")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let req = test::TestRequest::post()
        .uri("/clients/acme/tier")
        .set_json(serde_json::json!({"tier": "BASIC"}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/rate-limits/status/acme")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["client_id"], "acme");
    assert_eq!(body["capacity"], 50);

    let req = test::TestRequest::post()
        .uri("/rate-limits/reset/acme")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "reset");
}

#[actix_web::test]
async fn metrics_snapshot_shape() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["gates"]["allowed_total"].is_u64());
    assert!(body["gates"]["rate_limited_total"].is_u64());
    assert!(body["gates"]["circuit_rejected_total"].is_u64());
    assert!(body["routes"].is_object());
    assert!(body["circuit_breakers"].is_object());

    let req = test::TestRequest::get().uri("/metrics/latency").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.is_object());
}

#[actix_web::test]
async fn circuit_breaker_listing_and_reset() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/circuit-breakers").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));

    let req = test::TestRequest::post()
        .uri("/circuit-breakers/reset")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "reset");
}

#[actix_web::test]
async fn proxy_passthrough_and_rate_limit_headers() {
    let upstream = spawn_stub_upstream(200).await;
    let (state, _clock) = state_with_manual_clock(gateway_config(&upstream));
    let app = spawn_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/v1/orders")
        .insert_header(("X-Client-ID", "web-client"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.headers().contains_key("X-Gateway-Latency-Ms"));
    assert_eq!(
        resp.headers()
            .get("X-RateLimit-Remaining")
            .unwrap()
            .to_str()
            .unwrap(),
        "9"
    );

    // Drain the remaining free-tier tokens; the next request is a 429.
    for _ in 0..9 {
        let req = test::TestRequest::get()
            .uri("/api/v1/orders")
            .insert_header(("X-Client-ID", "web-client"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/orders")
        .insert_header(("X-Client-ID", "web-client"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 429);
    assert!(resp.headers().contains_key("Retry-After"));

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "rate_limited");
    assert!(body["retry_after"].is_number());
}

#[actix_web::test]
async fn proxy_reports_upstream_error_as_bad_gateway() {
    let (state, _clock) = state_with_manual_clock(gateway_config("http://127.0.0.1:1"));
    let app = spawn_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/v1/orders")
        .insert_header(("X-Client-ID", "web-client"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 502);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "upstream_error");
}
