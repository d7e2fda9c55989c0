//! pixvault-media: stored media objects and the vault-aware access gate
//!
//! [`store::MediaStore`] owns the blobs on disk and the object index:
//! content-hash dedup, ownership metadata, and integrity hashes over the
//! bytes as stored.  [`gate::MediaGate`] sits in front of it and carries the
//! vault semantics: encryption on upload, the token → passphrase → content
//! key → plaintext chain on read, and the ownership checks that run before
//! any cryptography.

pub mod gate;
pub mod store;

pub use gate::{MediaGate, UploadRequest, PLACEHOLDER_THUMBNAIL};
pub use store::{MediaRecord, MediaStore, StoredObject};
