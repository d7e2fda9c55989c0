//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  — Prometheus text format
//!   GET /healthz  — Liveness probe (always 200 if process is running)

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{
    encoding::text::encode, metrics::counter::Counter, registry::Registry,
};
use std::sync::{Arc, Mutex};

/// Counters for the vault surface.  Cheap to clone; shared with handlers.
#[derive(Clone)]
pub struct VaultMetrics {
    pub unlocks: Counter,
    pub unlock_failures: Counter,
    pub uploads: Counter,
    pub decrypt_failures: Counter,
    pub tokens_swept: Counter,
}

impl VaultMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let unlocks = Counter::default();
        let unlock_failures = Counter::default();
        let uploads = Counter::default();
        let decrypt_failures = Counter::default();
        let tokens_swept = Counter::default();

        registry.register(
            "pixvault_vault_unlocks",
            "Successful vault unlocks",
            unlocks.clone(),
        );
        registry.register(
            "pixvault_vault_unlock_failures",
            "Rejected vault unlock attempts",
            unlock_failures.clone(),
        );
        registry.register(
            "pixvault_media_uploads",
            "Media objects accepted for storage",
            uploads.clone(),
        );
        registry.register(
            "pixvault_media_decrypt_failures",
            "Failed decryption attempts on the read path",
            decrypt_failures.clone(),
        );
        registry.register(
            "pixvault_tokens_swept",
            "Expired vault tokens evicted by the background sweep",
            tokens_swept.clone(),
        );

        VaultMetrics {
            unlocks,
            unlock_failures,
            uploads,
            decrypt_failures,
            tokens_swept,
        }
    }
}

/// Serve Prometheus metrics and the liveness probe on `addr`
/// (e.g. "127.0.0.1:9105")
pub async fn serve(addr: String, registry: Arc<Mutex<Registry>>) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(registry);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(registry): State<Arc<Mutex<Registry>>>) -> impl IntoResponse {
    let mut body = String::new();
    let guard = registry.lock().expect("registry lock poisoned");
    match encode(&mut body, &guard) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
