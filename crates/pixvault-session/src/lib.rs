//! pixvault-session: vault unlock sessions and the token table
//!
//! State machine per user: no vault → vault configured (verifier persisted)
//! → unlocked (token issued) → expired/locked → unlocked again.
//!
//! A successful unlock mints an opaque random token and parks the verified
//! raw passphrase in a process-local table for the token's lifetime.  That
//! table is the only place the raw passphrase exists outside a request body;
//! it is never persisted, never logged, and a process restart invalidates
//! every outstanding token (re-unlock required).
//!
//! Deployment assumption: the token table is process-local.  Running more
//! than one daemon process behind a load balancer requires replacing it with
//! a shared store; there is no hidden clustering behavior here.
//!
//! Expiry is enforced twice: lazily on every [`SessionManager::resolve`],
//! and by a periodic [`SessionManager::sweep`] the daemon drives to bound
//! memory growth from abandoned sessions.

mod credentials;

pub use credentials::CredentialStore;

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::RngCore;

use pixvault_core::{VaultError, VaultResult};
use pixvault_crypto::{hash_passphrase, verify_passphrase};

/// Minimum accepted vault passphrase length, in characters.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Random bytes per token (hex-encoded to 64 characters).
const TOKEN_BYTES: usize = 32;

struct TokenRecord {
    user_id: String,
    passphrase: SecretString,
    expires_at: Instant,
}

/// A freshly minted unlock token, returned to the caller.
#[derive(Debug)]
pub struct TokenIssue {
    pub token: String,
    pub expires_in: Duration,
}

/// Process-wide session state: persisted verifiers plus the in-memory
/// token table.  Constructed once and shared; all entry points take `&self`
/// and are safe under concurrent callers (coarse per-table mutexes — the
/// workload is unlock + sweep, far below contention range).
pub struct SessionManager {
    creds: Mutex<CredentialStore>,
    tokens: Mutex<HashMap<String, TokenRecord>>,
    token_ttl: Duration,
    verifier_iterations: u32,
}

impl SessionManager {
    pub fn new(creds: CredentialStore, token_ttl: Duration, verifier_iterations: u32) -> Self {
        Self {
            creds: Mutex::new(creds),
            tokens: Mutex::new(HashMap::new()),
            token_ttl,
            verifier_iterations,
        }
    }

    /// Whether `user_id` has a vault configured.
    pub fn has_vault(&self, user_id: &str) -> bool {
        self.creds
            .lock()
            .expect("credential store lock poisoned")
            .verifier(user_id)
            .is_some()
    }

    /// Configure a vault for `user_id`.  Valid once; the passphrase must be
    /// at least [`MIN_PASSPHRASE_LEN`] characters.
    pub fn setup(&self, user_id: &str, passphrase: &SecretString) -> VaultResult<()> {
        if passphrase.expose_secret().chars().count() < MIN_PASSPHRASE_LEN {
            return Err(VaultError::Validation(format!(
                "vault passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
            )));
        }

        let mut creds = self.creds.lock().expect("credential store lock poisoned");
        if creds.verifier(user_id).is_some() {
            return Err(VaultError::AlreadyConfigured);
        }

        let verifier = hash_passphrase(passphrase, self.verifier_iterations);
        creds.set_verifier(user_id, verifier);
        creds.flush()?;
        tracing::info!(user = user_id, "vault configured");
        Ok(())
    }

    /// Verify the passphrase and mint an unlock token bound to `user_id`.
    ///
    /// Failure is the generic invalid-credential error whether the user has
    /// no vault or presented the wrong passphrase.
    pub fn authenticate(&self, user_id: &str, passphrase: SecretString) -> VaultResult<TokenIssue> {
        let stored = self
            .creds
            .lock()
            .expect("credential store lock poisoned")
            .verifier(user_id)
            .map(str::to_owned);
        let Some(stored) = stored else {
            return Err(VaultError::InvalidCredentials);
        };

        let ok = verify_passphrase(&passphrase, &stored, self.verifier_iterations)
            .map_err(|e| {
                tracing::error!(user = user_id, error = %e, "stored verifier unreadable");
                VaultError::InvalidCredentials
            })?;
        if !ok {
            tracing::debug!(user = user_id, "vault unlock rejected");
            return Err(VaultError::InvalidCredentials);
        }

        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);

        self.tokens
            .lock()
            .expect("token table lock poisoned")
            .insert(
                token.clone(),
                TokenRecord {
                    user_id: user_id.to_owned(),
                    passphrase,
                    expires_at: Instant::now() + self.token_ttl,
                },
            );

        tracing::info!(user = user_id, ttl_secs = self.token_ttl.as_secs(), "vault unlocked");
        Ok(TokenIssue {
            token,
            expires_in: self.token_ttl,
        })
    }

    /// Resolve a token back to the raw passphrase it was issued for.
    ///
    /// Expired entries are evicted on detection.  A token presented by a
    /// caller other than its owner is a hard authorization failure, logged
    /// distinctly from routine expiry.
    pub fn resolve(&self, token: &str, caller_user_id: &str) -> VaultResult<SecretString> {
        let mut tokens = self.tokens.lock().expect("token table lock poisoned");

        let Some(record) = tokens.get(token) else {
            return Err(VaultError::TokenNotFound);
        };
        if Instant::now() >= record.expires_at {
            tokens.remove(token);
            return Err(VaultError::TokenExpired);
        }
        if record.user_id != caller_user_id {
            tracing::warn!(
                caller = caller_user_id,
                owner = %record.user_id,
                violation = "token_ownership",
                "vault token presented by non-owner"
            );
            return Err(VaultError::TokenOwnership);
        }

        Ok(SecretString::from(
            record.passphrase.expose_secret().to_owned(),
        ))
    }

    /// Explicitly evict a token (lock/logout).  Returns whether it existed.
    pub fn lock(&self, token: &str) -> bool {
        self.tokens
            .lock()
            .expect("token table lock poisoned")
            .remove(token)
            .is_some()
    }

    /// Evict all expired tokens; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().expect("token table lock poisoned");
        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at > now);
        let swept = before - tokens.len();
        if swept > 0 {
            tracing::debug!(swept, "expired vault tokens evicted");
        }
        swept
    }

    /// Number of live entries in the token table.
    pub fn active_tokens(&self) -> usize {
        self.tokens.lock().expect("token table lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ITERATIONS: u32 = 10;

    fn manager(ttl: Duration) -> (SessionManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let creds = CredentialStore::open(&dir.path().join("credentials.json")).unwrap();
        (SessionManager::new(creds, ttl, TEST_ITERATIONS), dir)
    }

    fn passphrase(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn test_setup_rejects_short_passphrase() {
        let (mgr, _dir) = manager(Duration::from_secs(60));

        let result = mgr.setup("alice", &passphrase("short"));
        assert!(matches!(result, Err(VaultError::Validation(_))));
        assert!(!mgr.has_vault("alice"));
    }

    #[test]
    fn test_setup_once() {
        let (mgr, _dir) = manager(Duration::from_secs(60));

        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();
        assert!(mgr.has_vault("alice"));

        let again = mgr.setup("alice", &passphrase("another-pass"));
        assert!(matches!(again, Err(VaultError::AlreadyConfigured)));
    }

    #[test]
    fn test_unlock_and_resolve() {
        let (mgr, _dir) = manager(Duration::from_secs(60));
        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();

        let issue = mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();
        assert_eq!(issue.token.len(), TOKEN_BYTES * 2);
        assert_eq!(issue.expires_in, Duration::from_secs(60));

        let resolved = mgr.resolve(&issue.token, "alice").unwrap();
        assert_eq!(resolved.expose_secret(), "Tr0ub4dor&3");
    }

    #[test]
    fn test_unlock_failure_is_generic() {
        let (mgr, _dir) = manager(Duration::from_secs(60));
        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();

        // Wrong passphrase and no-vault-at-all produce the same error kind.
        let wrong = mgr.authenticate("alice", passphrase("wrong")).unwrap_err();
        let novault = mgr.authenticate("mallory", passphrase("whatever")).unwrap_err();
        assert!(matches!(wrong, VaultError::InvalidCredentials));
        assert!(matches!(novault, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_token_ownership_violation() {
        let (mgr, _dir) = manager(Duration::from_secs(60));
        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();

        let issue = mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();
        let result = mgr.resolve(&issue.token, "bob");

        assert!(matches!(result, Err(VaultError::TokenOwnership)));
        // The violation must not evict the owner's token.
        assert!(mgr.resolve(&issue.token, "alice").is_ok());
    }

    #[test]
    fn test_unknown_token_distinct_from_ownership() {
        let (mgr, _dir) = manager(Duration::from_secs(60));

        let result = mgr.resolve("deadbeef", "alice");
        assert!(matches!(result, Err(VaultError::TokenNotFound)));
    }

    #[test]
    fn test_lazy_expiry_without_sweep() {
        let (mgr, _dir) = manager(Duration::ZERO);
        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();

        let issue = mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();

        // No sweep has run; the lazy check alone must reject and evict.
        let result = mgr.resolve(&issue.token, "alice");
        assert!(matches!(result, Err(VaultError::TokenExpired)));
        assert_eq!(mgr.active_tokens(), 0);

        // A second attempt sees plain not-found.
        let again = mgr.resolve(&issue.token, "alice");
        assert!(matches!(again, Err(VaultError::TokenNotFound)));
    }

    #[test]
    fn test_sweep_evicts_expired_only() {
        let (expired, _d1) = manager(Duration::ZERO);
        expired.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();
        expired.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();
        expired.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();

        assert_eq!(expired.active_tokens(), 2);
        assert_eq!(expired.sweep(), 2);
        assert_eq!(expired.active_tokens(), 0);

        let (live, _d2) = manager(Duration::from_secs(60));
        live.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();
        live.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();

        assert_eq!(live.sweep(), 0);
        assert_eq!(live.active_tokens(), 1);
    }

    #[test]
    fn test_explicit_lock() {
        let (mgr, _dir) = manager(Duration::from_secs(60));
        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();
        let issue = mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();

        assert!(mgr.lock(&issue.token));
        assert!(!mgr.lock(&issue.token));
        assert!(matches!(
            mgr.resolve(&issue.token, "alice"),
            Err(VaultError::TokenNotFound)
        ));
    }

    #[test]
    fn test_tokens_are_unique_and_opaque() {
        let (mgr, _dir) = manager(Duration::from_secs(60));
        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();

        let a = mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();
        let b = mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();

        assert_ne!(a.token, b.token);
        assert!(!a.token.contains("alice"));
        // Multiple live sessions per user (several devices/tabs) coexist.
        assert!(mgr.resolve(&a.token, "alice").is_ok());
        assert!(mgr.resolve(&b.token, "alice").is_ok());
    }

    #[test]
    fn test_raw_passphrase_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let creds = CredentialStore::open(&path).unwrap();
        let mgr = SessionManager::new(creds, Duration::from_secs(60), TEST_ITERATIONS);

        mgr.setup("alice", &passphrase("Tr0ub4dor&3")).unwrap();
        mgr.authenticate("alice", passphrase("Tr0ub4dor&3")).unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("Tr0ub4dor&3"));
    }
}
