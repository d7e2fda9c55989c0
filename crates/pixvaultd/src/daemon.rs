//! Daemon lifecycle: store wiring, background sweep, HTTP server

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use pixvault_core::config::PixvaultConfig;
use pixvault_crypto::KdfParams;
use pixvault_media::{MediaGate, MediaStore};
use pixvault_session::{CredentialStore, SessionManager};

use crate::metrics::VaultMetrics;
use crate::routes::{router, AppState};

pub async fn run(config: PixvaultConfig) -> Result<()> {
    info!("daemon starting");

    // ── Stores ───────────────────────────────────────────────────────────
    let creds = CredentialStore::open(&config.vault.credentials_file).with_context(|| {
        format!(
            "opening credential store: {}",
            config.vault.credentials_file.display()
        )
    })?;
    let store = Arc::new(
        MediaStore::open(&config.media.data_dir).with_context(|| {
            format!("opening media store: {}", config.media.data_dir.display())
        })?,
    );

    let sessions = Arc::new(SessionManager::new(
        creds,
        Duration::from_secs(config.vault.token_ttl_secs),
        config.vault.verifier_kdf_iterations,
    ));
    let gate = Arc::new(MediaGate::new(
        store.clone(),
        sessions.clone(),
        KdfParams {
            iterations: config.vault.wrap_kdf_iterations,
        },
        config.media.max_object_mb * 1024 * 1024,
    ));

    info!(
        objects = store.len(),
        token_ttl_secs = config.vault.token_ttl_secs,
        "vault stores ready"
    );

    // ── Metrics ──────────────────────────────────────────────────────────
    let mut registry = prometheus_client::registry::Registry::default();
    let metrics = VaultMetrics::new(&mut registry);
    if let Some(addr) = config.daemon.metrics_addr.clone() {
        let registry = Arc::new(Mutex::new(registry));
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, registry).await {
                tracing::error!("metrics server failed: {e}");
            }
        });
    }

    // ── Background token sweep ───────────────────────────────────────────
    let sweep_sessions = sessions.clone();
    let sweep_metrics = metrics.clone();
    let sweep_every = Duration::from_secs(config.vault.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        // The immediate first tick is a no-op on an empty table.
        loop {
            ticker.tick().await;
            let swept = sweep_sessions.sweep();
            if swept > 0 {
                sweep_metrics.tokens_swept.inc_by(swept as u64);
            }
        }
    });

    // ── HTTP server ──────────────────────────────────────────────────────
    let state = AppState {
        sessions,
        gate,
        metrics,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.daemon.listen)
        .await
        .with_context(|| format!("binding {}", config.daemon.listen))?;
    info!(addr = %config.daemon.listen, "vault API: listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("vault API server: {e}"))?;

    info!("daemon exiting cleanly");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("registering SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("registering SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}
