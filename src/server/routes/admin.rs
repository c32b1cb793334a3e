//! Health, metrics, and policy administration endpoints
//!
//! These routes never pass through the admission pipeline, so operators keep
//! visibility even while clients are being throttled.

use crate::core::circuit_breaker::CircuitState;
use crate::core::rate_limiter::Tier;
use crate::monitoring::MetricsSnapshot;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Configure the admin routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/ready", web::get().to(ready))
        .route("/metrics", web::get().to(metrics))
        .route("/metrics/latency", web::get().to(latency_percentiles))
        .route("/circuit-breakers", web::get().to(circuit_breakers))
        .route("/circuit-breakers/reset", web::post().to(reset_breakers))
        .route("/clients", web::get().to(list_clients))
        .route("/clients/{client_id}/tier", web::post().to(set_client_tier))
        .route(
            "/rate-limits/status/{client_id}",
            web::get().to(rate_limit_status),
        )
        .route(
            "/rate-limits/reset/{client_id}",
            web::post().to(reset_rate_limit),
        );
}

/// Counters plus the current breaker states, the whole picture in one call.
#[derive(Debug, Serialize)]
struct MetricsResponse {
    #[serde(flatten)]
    snapshot: MetricsSnapshot,
    circuit_breakers: BTreeMap<String, CircuitState>,
}

/// Tier assignment request body.
#[derive(Debug, Deserialize)]
struct TierRequest {
    tier: String,
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "uptime_seconds": state.metrics.snapshot().uptime_seconds,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ready() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ready"}))
}

async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    debug!("metrics snapshot requested");
    let circuit_breakers = state
        .breakers
        .snapshot_all()
        .into_iter()
        .map(|snapshot| (snapshot.name.clone(), snapshot.state))
        .collect();
    HttpResponse::Ok().json(MetricsResponse {
        snapshot: state.metrics.snapshot(),
        circuit_breakers,
    })
}

async fn latency_percentiles(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.metrics.latency_snapshot())
}

async fn circuit_breakers(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.breakers.snapshot_all())
}

async fn reset_breakers(state: web::Data<AppState>) -> HttpResponse {
    state.breakers.reset_all();
    HttpResponse::Ok().json(json!({"status": "reset"}))
}

async fn list_clients(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.limiter.list())
}

async fn set_client_tier(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<TierRequest>,
) -> Result<HttpResponse, GatewayError> {
    let client_id = path.into_inner();
    let tier = Tier::parse(&body.tier)?;
    state.limiter.set_tier(&client_id, tier);
    Ok(HttpResponse::Ok().json(json!({
        "client_id": client_id,
        "tier": tier,
    })))
}

async fn rate_limit_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let client_id = path.into_inner();
    let status = state
        .limiter
        .status(&client_id)
        .ok_or_else(|| GatewayError::NotFound(format!("unknown client: {}", client_id)))?;
    Ok(HttpResponse::Ok().json(status))
}

async fn reset_rate_limit(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let client_id = path.into_inner();
    if !state.limiter.reset(&client_id) {
        return Err(GatewayError::NotFound(format!(
            "unknown client: {}",
            client_id
        )));
    }
    Ok(HttpResponse::Ok().json(json!({
        "status": "reset",
        "client_id": client_id,
    })))
}
