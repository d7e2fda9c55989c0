//! Unified error taxonomy for the vault subsystem.
//!
//! Every fallible vault operation returns [`VaultError`], and the HTTP
//! boundary dispatches on the variant — never on message content.  The
//! decrypt path deliberately collapses into the single [`VaultError::Decryption`]
//! kind: callers cannot distinguish a wrong key from corrupted data.

use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input the caller can fix (passphrase too short, oversized
    /// upload, unparseable stored verifier).
    #[error("{0}")]
    Validation(String),

    /// Wrong passphrase at unlock, or no vault to unlock.  The message is
    /// deliberately generic; the two cases are not distinguished externally.
    #[error("access denied")]
    InvalidCredentials,

    /// Token not present in the table.
    #[error("vault token not found")]
    TokenNotFound,

    /// Token present but past its expiry (evicted on detection).
    #[error("vault token expired")]
    TokenExpired,

    /// Token presented by a caller other than the user it was issued to.
    /// A security violation, not a miss — logged and surfaced distinctly.
    #[error("vault token does not belong to caller")]
    TokenOwnership,

    /// Requested object is owned by a different user.
    #[error("object does not belong to caller")]
    NotOwner,

    /// AEAD authentication failure, wrong key material, or malformed
    /// ciphertext framing.  One opaque class for all of them.
    #[error("decryption failed")]
    Decryption,

    /// Object is encrypted and the caller did not opt into decryption.
    #[error("content is encrypted; decryption was not requested")]
    ContentRequiresDecryption,

    /// The user has no vault configured.
    #[error("no vault configured")]
    NoVault,

    /// Vault setup attempted when a vault already exists.
    #[error("vault already configured")]
    AlreadyConfigured,

    #[error("object not found")]
    ObjectNotFound,

    /// Stored bytes no longer match their recorded hash.  Reported to the
    /// audit log, never auto-corrected.
    #[error("stored content failed integrity check")]
    Integrity,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// HTTP status the boundary maps this error kind to.
    ///
    /// Decryption failures are 403, not 500: a wrong key or garbled
    /// ciphertext is an expected adversarial/user-error case, not a bug.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::InvalidCredentials | Self::TokenNotFound | Self::TokenExpired => 401,
            Self::TokenOwnership | Self::NotOwner | Self::Decryption => 403,
            Self::NoVault | Self::ObjectNotFound => 404,
            Self::ContentRequiresDecryption | Self::AlreadyConfigured => 409,
            Self::Integrity | Self::Io(_) | Self::Other(_) => 500,
        }
    }

    /// True for the kinds that indicate a possible tampering attempt
    /// rather than routine credential expiry or user error.
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::TokenOwnership | Self::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(VaultError::InvalidCredentials.status_code(), 401);
        assert_eq!(VaultError::TokenExpired.status_code(), 401);
        assert_eq!(VaultError::TokenOwnership.status_code(), 403);
        assert_eq!(VaultError::Decryption.status_code(), 403);
        assert_eq!(VaultError::NoVault.status_code(), 404);
        assert_eq!(VaultError::Validation("too short".into()).status_code(), 400);
    }

    #[test]
    fn test_ownership_distinct_from_expiry() {
        // Token ownership violations must be distinguishable from expiry
        // both in status and in audit classification.
        assert!(VaultError::TokenOwnership.is_security_violation());
        assert!(!VaultError::TokenExpired.is_security_violation());
        assert!(!VaultError::TokenNotFound.is_security_violation());
        assert_ne!(
            VaultError::TokenOwnership.status_code(),
            VaultError::TokenNotFound.status_code()
        );
    }

    #[test]
    fn test_generic_messages_leak_nothing() {
        // The unlock failure message must not reveal whether a vault exists.
        assert_eq!(VaultError::InvalidCredentials.to_string(), "access denied");
        // The decrypt failure message must not reveal bad-key vs corrupt-data.
        assert_eq!(VaultError::Decryption.to_string(), "decryption failed");
    }
}
