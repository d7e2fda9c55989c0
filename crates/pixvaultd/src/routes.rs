//! HTTP boundary for the vault surface
//!
//! The authenticated caller identity arrives as the `x-auth-user` header set
//! by the upstream auth layer (an external collaborator).  The unlock token
//! travels as `Authorization: vault:<token>` — never as a URL query
//! parameter, since URLs end up in logs and caches.
//!
//! KDF-heavy handlers (setup, unlock, encrypted upload, decrypted read) run
//! on the blocking pool so tens of thousands of hash rounds never stall the
//! async workers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

use pixvault_core::{VaultError, VaultResult};
use pixvault_media::{MediaGate, UploadRequest};
use pixvault_session::SessionManager;

use crate::metrics::VaultMetrics;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub gate: Arc<MediaGate>,
    pub metrics: VaultMetrics,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/vault", get(vault_status).post(vault_setup))
        .route("/vault/unlock", post(vault_unlock))
        .route("/vault/session", delete(vault_lock))
        .route("/media", post(media_upload))
        .route("/media/{id}", get(media_read))
        .route("/media/{id}/thumbnail", get(media_thumbnail))
        .with_state(state)
}

/// Error wrapper dispatching on the error kind, not on message content.
struct ApiError(VaultError);

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_security_violation() {
            tracing::warn!(error = %self.0, "authorization violation on vault surface");
        } else if status.is_server_error() {
            tracing::error!(error = %self.0, "vault request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Caller identity injected by the trusted upstream auth layer.
fn caller(headers: &HeaderMap) -> VaultResult<String> {
    headers
        .get("x-auth-user")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(VaultError::InvalidCredentials)
}

/// Extract the unlock token from `Authorization: vault:<token>`.
fn vault_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("vault:"))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

async fn run_blocking<T, F>(task: F) -> VaultResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> VaultResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| VaultError::Other(anyhow::anyhow!("blocking task failed: {e}")))?
}

// ── Vault lifecycle ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PassphraseBody {
    passphrase: String,
}

async fn vault_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&headers)?;
    if !state.sessions.has_vault(&user) {
        return Err(VaultError::NoVault.into());
    }
    Ok(Json(serde_json::json!({ "configured": true })).into_response())
}

async fn vault_setup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PassphraseBody>,
) -> Result<Response, ApiError> {
    let user = caller(&headers)?;
    let sessions = state.sessions.clone();
    run_blocking(move || {
        let passphrase = SecretString::from(body.passphrase);
        sessions.setup(&user, &passphrase)
    })
    .await?;
    Ok(StatusCode::CREATED.into_response())
}

async fn vault_unlock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PassphraseBody>,
) -> Result<Response, ApiError> {
    let user = caller(&headers)?;
    let sessions = state.sessions.clone();
    let issued = run_blocking(move || {
        sessions.authenticate(&user, SecretString::from(body.passphrase))
    })
    .await;

    match issued {
        Ok(issue) => {
            state.metrics.unlocks.inc();
            Ok(Json(serde_json::json!({
                "token": issue.token,
                "expires_in_secs": issue.expires_in.as_secs(),
            }))
            .into_response())
        }
        Err(err) => {
            state.metrics.unlock_failures.inc();
            Err(err.into())
        }
    }
}

async fn vault_lock(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    caller(&headers)?;
    let Some(token) = vault_token(&headers) else {
        return Err(VaultError::TokenNotFound.into());
    };
    state.sessions.lock(&token);
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ── Media ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UploadQuery {
    #[serde(default)]
    encrypt: bool,
}

#[derive(Deserialize)]
struct ReadQuery {
    #[serde(default)]
    decrypt: bool,
}

async fn media_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let user = caller(&headers)?;
    let token = vault_token(&headers);
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let gate = state.gate.clone();
    let stored = run_blocking(move || {
        gate.store_object(
            UploadRequest {
                buffer: body.to_vec(),
                mime_type,
                owner_id: user,
                want_encrypt: query.encrypt,
                thumbnail: None,
            },
            token.as_deref(),
        )
    })
    .await?;

    state.metrics.uploads.inc();
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": stored.record.id,
            "is_encrypted": stored.record.is_encrypted,
            "is_duplicate": stored.is_duplicate,
        })),
    )
        .into_response())
}

async fn media_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let user = caller(&headers)?;
    let token = vault_token(&headers);

    let gate = state.gate.clone();
    let result =
        run_blocking(move || gate.read_object(&id, &user, query.decrypt, token.as_deref())).await;

    match result {
        Ok((record, bytes)) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, record.mime_type)],
            bytes,
        )
            .into_response()),
        Err(err) => {
            if matches!(err, VaultError::Decryption) {
                state.metrics.decrypt_failures.inc();
            }
            Err(err.into())
        }
    }
}

async fn media_thumbnail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let user = caller(&headers)?;
    let token = vault_token(&headers);

    let gate = state.gate.clone();
    let result =
        run_blocking(move || gate.read_thumbnail(&id, &user, query.decrypt, token.as_deref()))
            .await;

    match result {
        Ok(bytes) => {
            Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], bytes).into_response())
        }
        Err(err) => {
            if matches!(err, VaultError::Decryption) {
                state.metrics.decrypt_failures.inc();
            }
            Err(err.into())
        }
    }
}
