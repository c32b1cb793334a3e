//! HTTP server implementation
//!
//! Boots the gateway: builds the shared state from configuration, wires the
//! admin and proxy routes, and runs the actix-web server.

pub mod routes;
pub mod state;

pub use state::AppState;

use crate::config::Config;
use crate::core::clock::SystemClock;
use crate::utils::error::{GatewayError, Result};
use actix_web::{middleware::DefaultHeaders, web, App, HttpServer as ActixHttpServer};
use std::sync::Arc;
use tracing::info;

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Build all subsystems from configuration.
    pub fn new(config: Config) -> Result<Self> {
        info!("Initializing gateway components");
        let state = AppState::from_config(config, Arc::new(SystemClock))?;
        Ok(Self { state })
    }

    /// Application state accessor.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Create the actix-web application.
    fn create_app(
        state: web::Data<AppState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .wrap(DefaultHeaders::new().add(("Server", "rategate")))
            .configure(routes::admin::configure_routes)
            .configure(routes::proxy::configure_routes)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.state.config.server().address();

        // Idle clients are swept in the background for the life of the
        // process.
        self.state.limiter.clone().start_cleanup_task();

        let state = web::Data::new(self.state);
        let server = ActixHttpServer::new(move || Self::create_app(state.clone()))
            .bind(&bind_addr)
            .map_err(|e| GatewayError::server(format!("failed to bind {}: {}", bind_addr, e)))?
            .run();

        info!("Gateway listening on {}", bind_addr);
        server
            .await
            .map_err(|e| GatewayError::server(format!("server error: {}", e)))?;

        info!("Gateway stopped");
        Ok(())
    }
}

/// Load configuration and run the gateway to completion.
pub async fn run_server() -> Result<()> {
    let config = Config::load().await?;

    info!(
        "Starting rategate on {}:{}",
        config.server().host,
        config.server().port
    );
    info!("Admin endpoints:");
    info!("   GET  /health - Health check");
    info!("   GET  /metrics - Counter snapshot");
    info!("   GET  /metrics/latency - Latency percentiles");
    info!("   GET  /circuit-breakers - Breaker states");
    info!("   POST /clients/{{id}}/tier - Tier assignment");
    info!("   ANY  /api/** - Proxy to upstreams");

    HttpServer::new(config)?.start().await
}
