//! Route resolution and upstream forwarding
//!
//! The route table maps request paths to token costs and upstream services;
//! the forwarder pushes bytes to the resolved upstream over a shared
//! connection pool.

use crate::config::{GatewayConfig, UpstreamConfig};
use crate::utils::error::{GatewayError, Result};
use bytes::Bytes;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Hop-by-hop headers that must not be forwarded in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header is hop-by-hop or otherwise managed by the gateway.
pub fn is_hop_by_hop(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    HOP_BY_HOP_HEADERS.contains(&lower.as_str()) || lower == "host" || lower == "content-length"
}

/// Compiled route-cost and routing tables.
///
/// Both tables are immutable after boot; first match wins. Paths matching no
/// routing rule fall back to the `default` upstream when one is configured.
pub struct RouteTable {
    costs: Vec<(Regex, u32)>,
    routes: Vec<(Regex, String)>,
    upstreams: HashMap<String, UpstreamConfig>,
}

impl RouteTable {
    /// Compile the tables from configuration. Invalid patterns are a boot
    /// failure.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let mut costs = Vec::with_capacity(config.route_costs.len());
        for rule in &config.route_costs {
            let regex = Regex::new(&rule.pattern).map_err(|e| {
                GatewayError::config(format!("invalid route cost pattern '{}': {}", rule.pattern, e))
            })?;
            costs.push((regex, rule.cost));
        }

        let mut routes = Vec::with_capacity(config.routes.len());
        for rule in &config.routes {
            let regex = Regex::new(&rule.pattern).map_err(|e| {
                GatewayError::config(format!("invalid route pattern '{}': {}", rule.pattern, e))
            })?;
            routes.push((regex, rule.upstream.clone()));
        }

        Ok(Self {
            costs,
            routes,
            upstreams: config.upstreams.clone(),
        })
    }

    /// Token cost for a request path; unlisted routes cost 1.
    pub fn cost(&self, path: &str) -> u32 {
        self.costs
            .iter()
            .find(|(regex, _)| regex.is_match(path))
            .map(|(_, cost)| *cost)
            .unwrap_or(1)
    }

    /// Resolve the upstream handling a path, if any.
    pub fn resolve(&self, path: &str) -> Option<(&str, &UpstreamConfig)> {
        for (regex, upstream) in &self.routes {
            if regex.is_match(path) {
                return self
                    .upstreams
                    .get(upstream)
                    .map(|config| (upstream.as_str(), config));
            }
        }
        self.upstreams
            .get_key_value("default")
            .map(|(name, config)| (name.as_str(), config))
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("costs", &self.costs.len())
            .field("routes", &self.routes.len())
            .field("upstreams", &self.upstreams.len())
            .finish()
    }
}

/// Response received from an upstream, ready to relay.
#[derive(Debug)]
pub struct UpstreamResponse {
    /// Status code returned by the upstream
    pub status: u16,
    /// End-to-end headers (hop-by-hop already stripped)
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

/// Forwards requests to upstreams over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// Build the shared client. Per-request timeouts come from the upstream
    /// configuration, so the client itself only bounds connection setup.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| GatewayError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Forward a request to `upstream` and collect the full response.
    ///
    /// Timeouts map to [`GatewayError::UpstreamTimeout`], everything else
    /// transport-shaped to [`GatewayError::UpstreamUnavailable`].
    pub async fn forward(
        &self,
        upstream_name: &str,
        upstream: &UpstreamConfig,
        method: &str,
        path: &str,
        query: Option<&str>,
        headers: &[(String, String)],
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| GatewayError::Internal(format!("invalid method: {}", method)))?;

        let mut url = format!("{}{}", upstream.base_url.trim_end_matches('/'), path);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        debug!(upstream = upstream_name, %method, %url, "forwarding request");

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            if is_hop_by_hop(name) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                header_map.append(name, value);
            }
        }

        let response = self
            .client
            .request(method, &url)
            .headers(header_map)
            .body(body)
            .timeout(upstream.timeout())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::UpstreamTimeout(upstream_name.to_string())
                } else {
                    GatewayError::UpstreamUnavailable(format!("{}: {}", upstream_name, e))
                }
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::UpstreamTimeout(upstream_name.to_string())
            } else {
                GatewayError::UpstreamUnavailable(format!("{}: {}", upstream_name, e))
            }
        })?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
