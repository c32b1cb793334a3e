//! Shared test infrastructure

use rategate_rs::config::{Config, UpstreamConfig};
use rategate_rs::core::clock::ManualClock;
use rategate_rs::server::AppState;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Build a config whose `default` upstream points at `base_url` with tight
/// breaker thresholds suitable for tests.
pub fn gateway_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.gateway.upstreams.insert(
        "default".to_string(),
        UpstreamConfig {
            base_url: base_url.to_string(),
            timeout_ms: 2_000,
            failure_threshold: 3,
            success_threshold: 2,
            recovery_timeout_ms: 5_000,
            treat_429_as_failure: false,
        },
    );
    config
}

/// Gateway state driven by a manual clock.
pub fn state_with_manual_clock(config: Config) -> (AppState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let state = AppState::from_config(config, clock.clone()).expect("state should build");
    (state, clock)
}

/// Spawn a minimal upstream whose response status can be flipped at
/// runtime. Returns its base URL and the status handle.
pub async fn spawn_switchable_upstream() -> (String, Arc<AtomicU16>) {
    let status = Arc::new(AtomicU16::new(200));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub should bind");
    let addr = listener.local_addr().unwrap();

    let handle = status.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let status = handle.clone();
            tokio::spawn(async move {
                let mut data = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            data.extend_from_slice(&buf[..n]);
                            if data.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }

                let body = r#"{"ok":true}"#;
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status.load(Ordering::SeqCst),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), status)
}

/// Spawn a minimal upstream that answers every request with the given
/// status and a fixed JSON body. Returns its base URL.
pub async fn spawn_stub_upstream(status: u16) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub should bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut data = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            data.extend_from_slice(&buf[..n]);
                            if data.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }

                let body = r#"{"ok":true}"#;
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nX-Stub-Header: present\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

/// A base URL that refuses connections immediately.
pub fn unreachable_upstream() -> String {
    // Port 1 is practically never listening on loopback.
    "http://127.0.0.1:1".to_string()
}
