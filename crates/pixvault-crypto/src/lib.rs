//! pixvault-crypto: at-rest encryption for vault media
//!
//! Pipeline: upload → random content key → AES-256-GCM seal → wrap content
//! key under the vault passphrase → persist frame + wrapped key
//!
//! Key hierarchy:
//! ```text
//! Vault passphrase (user secret, never persisted)
//!   ├── Login verifier (PBKDF2-SHA256, 100k iterations, salt:verifier encoding)
//!   └── Wrap key (PBKDF2-SHA256, 15k iterations, fresh salt per wrap)
//!         └── Content key (per-object, 256-bit random)
//!               ├── Media frame:     AES-256-GCM
//!               └── Thumbnail frame: AES-256-GCM (same content key)
//! ```
//!
//! The verifier and wrap derivations start from the same user secret but are
//! kept independent: different salts, different iteration counts, and the
//! verifier is never usable as key material.

pub mod aead;
pub mod cek;
pub mod passphrase;

pub use aead::{decrypt, encrypt, KdfParams};
pub use cek::{
    generate_content_key, protect, reveal, unwrap_content_key, wrap_content_key, ContentKey,
};
pub use passphrase::{hash_passphrase, verify_passphrase};

/// Size of a derived AES key or content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the per-frame KDF salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM initialization vector (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
