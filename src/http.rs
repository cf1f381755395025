//! Health check and status endpoints

use crate::config::Network;
use crate::jobs::{LastPass, PassSummary};
use crate::keys::KeyPool;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub network: Network,
    pub key_pool: KeyPool,
    pub location: LastPass,
    pub status: LastPass,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub version: &'static str,
    pub network: String,
    pub key_pool: KeyPoolReport,
    pub location_job: Option<PassSummary>,
    pub status_job: Option<PassSummary>,
}

#[derive(Debug, Serialize)]
pub struct KeyPoolReport {
    pub capacity: usize,
    pub in_use: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "hotspot-keeper is running"
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        network: state.network.to_string(),
        key_pool: KeyPoolReport {
            capacity: state.key_pool.capacity(),
            in_use: state.key_pool.in_use(),
        },
        location_job: state.location.read().await.clone(),
        status_job: state.status.read().await.clone(),
    })
}

/// Serve until `shutdown` fires
pub async fn serve(
    bind: &str,
    state: Arc<AppState>,
    shutdown: triggered::Listener,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("HTTP server listening on {}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Stopping HTTP server");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_and_status() {
        let pool = KeyPool::new(4);
        let _lease = pool.try_acquire().unwrap();
        let state = Arc::new(AppState {
            network: Network::Testnet,
            key_pool: pool,
            location: LastPass::default(),
            status: LastPass::default(),
        });
        *state.location.write().await = Some(PassSummary::started(3, 2).finish());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (trigger, shutdown) = triggered::trigger();
        let server = tokio::spawn(async move {
            axum::serve(listener, router(state))
                .with_graceful_shutdown(shutdown)
                .await
        });

        let health = get(addr, "/").await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.contains("hotspot-keeper is running"));

        let status = get(addr, "/status").await;
        assert!(status.starts_with("HTTP/1.1 200"));
        assert!(status.contains(r#""network":"testnet""#));
        assert!(status.contains(r#""capacity":4,"in_use":1"#));
        assert!(status.contains(r#""scanned":3"#));
        assert!(status.contains(r#""status_job":null"#));

        trigger.trigger();
        server.await.unwrap().unwrap();
    }
}
