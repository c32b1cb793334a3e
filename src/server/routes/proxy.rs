//! Passthrough proxy route
//!
//! Everything under `/api/` flows through the admission pipeline and, when
//! admitted, on to the resolved upstream.

use crate::core::pipeline::ProxyRequest;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};

/// Configure the catch-all proxy route for every HTTP method.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/{tail:.*}", web::route().to(proxy));
}

async fn proxy(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let request = ProxyRequest {
        method: req.method().as_str().to_string(),
        path: req.path().to_string(),
        query: if req.query_string().is_empty() {
            None
        } else {
            Some(req.query_string().to_string())
        },
        headers,
        body,
        peer_addr: req.peer_addr().map(|addr| addr.ip().to_string()),
    };

    let response = state.pipeline.handle(request).await?;

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for (name, value) in &response.headers {
        builder.append_header((name.as_str(), value.as_str()));
    }
    builder.insert_header((
        "X-Gateway-Latency-Ms",
        format!("{}", response.latency_ms.round() as u64),
    ));
    builder.insert_header((
        "X-RateLimit-Remaining",
        format!("{}", response.remaining_tokens as u64),
    ));
    Ok(builder.body(response.body))
}
