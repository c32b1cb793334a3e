//! rategate - rate-limited API gateway
//!
//! Single ingress point enforcing per-client rate policies and per-upstream
//! circuit breaking in front of a fleet of backend services.

use rategate_rs::{server, GatewayError};
use tracing::{error, Level};

/// Exit code for configuration errors.
const EXIT_CONFIG: i32 = 1;
/// Exit code for bind failures.
const EXIT_BIND: i32 = 2;

#[tokio::main]
async fn main() {
    // Initialize logging system
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    if let Err(e) = server::run_server().await {
        error!("{}", e);
        let code = match e {
            GatewayError::Server(_) => EXIT_BIND,
            GatewayError::Config(_) | GatewayError::Yaml(_) | GatewayError::Io(_) => EXIT_CONFIG,
            _ => EXIT_CONFIG,
        };
        std::process::exit(code);
    }
}
