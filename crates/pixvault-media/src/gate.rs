//! Vault-aware media access gate
//!
//! Upload: generate a content key, seal content (and thumbnail) under it,
//! wrap the key under the session's raw passphrase, persist only the sealed
//! forms.  Read: ownership check first, then token → passphrase → content
//! key → plaintext.  Every failure on the decrypt chain surfaces as an
//! authorization/decryption error, never as not-found and never as raw
//! stored bytes.

use std::sync::Arc;

use pixvault_core::{VaultError, VaultResult};
use pixvault_crypto::{
    generate_content_key, protect, reveal, unwrap_content_key, wrap_content_key, KdfParams,
};
use pixvault_session::SessionManager;

use crate::store::{MediaRecord, MediaStore, StoredObject};

/// 1x1 transparent PNG served in place of encrypted thumbnails when the
/// caller has not opted into decryption, so previews leak neither the
/// existence nor the shape of vault content.
pub const PLACEHOLDER_THUMBNAIL: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// One object handed over by the upload collaborator.
pub struct UploadRequest {
    pub buffer: Vec<u8>,
    pub mime_type: String,
    pub owner_id: String,
    pub want_encrypt: bool,
    pub thumbnail: Option<Vec<u8>>,
}

pub struct MediaGate {
    store: Arc<MediaStore>,
    sessions: Arc<SessionManager>,
    wrap_params: KdfParams,
    max_object_bytes: u64,
}

impl MediaGate {
    pub fn new(
        store: Arc<MediaStore>,
        sessions: Arc<SessionManager>,
        wrap_params: KdfParams,
        max_object_bytes: u64,
    ) -> Self {
        Self {
            store,
            sessions,
            wrap_params,
            max_object_bytes,
        }
    }

    /// Store one uploaded object, sealing it when encryption was requested.
    pub fn store_object(
        &self,
        upload: UploadRequest,
        token: Option<&str>,
    ) -> VaultResult<StoredObject> {
        if upload.buffer.len() as u64 > self.max_object_bytes {
            return Err(VaultError::Validation(format!(
                "object exceeds the {} byte ceiling",
                self.max_object_bytes
            )));
        }

        let content_hash = blake3::hash(&upload.buffer).to_hex().to_string();
        let id = uuid::Uuid::new_v4().to_string();
        let size = upload.buffer.len() as u64;

        let stored = if upload.want_encrypt {
            let token = token.ok_or(VaultError::TokenNotFound)?;
            let passphrase = self.sessions.resolve(token, &upload.owner_id)?;

            let cek = generate_content_key();
            let sealed = protect(&upload.buffer, &cek, &self.wrap_params)?;
            let sealed_thumb = upload
                .thumbnail
                .as_deref()
                .map(|thumb| protect(thumb, &cek, &self.wrap_params))
                .transpose()?;
            let wrapped_key = wrap_content_key(&cek, &passphrase, &self.wrap_params)?;
            // The content key drops (and zeroizes) here; only the wrapped
            // form reaches storage.
            drop(cek);

            let record = MediaRecord {
                id,
                owner_id: upload.owner_id,
                mime_type: upload.mime_type,
                size,
                content_hash,
                stored_hash: blake3::hash(&sealed).to_hex().to_string(),
                thumb_stored_hash: sealed_thumb
                    .as_deref()
                    .map(|t| blake3::hash(t).to_hex().to_string()),
                is_encrypted: true,
                wrapped_key: Some(wrapped_key),
            };
            self.store.insert(record, &sealed, sealed_thumb.as_deref())?
        } else {
            let record = MediaRecord {
                id,
                owner_id: upload.owner_id,
                mime_type: upload.mime_type,
                size,
                stored_hash: content_hash.clone(),
                content_hash,
                thumb_stored_hash: upload
                    .thumbnail
                    .as_deref()
                    .map(|t| blake3::hash(t).to_hex().to_string()),
                is_encrypted: false,
                wrapped_key: None,
            };
            self.store
                .insert(record, &upload.buffer, upload.thumbnail.as_deref())?
        };

        tracing::info!(
            object = %stored.record.id,
            encrypted = stored.record.is_encrypted,
            duplicate = stored.is_duplicate,
            "media object stored"
        );
        Ok(stored)
    }

    /// Store a batch of uploads, reporting each outcome independently; one
    /// failed object never aborts the rest.
    pub fn store_batch(
        &self,
        uploads: Vec<UploadRequest>,
        token: Option<&str>,
    ) -> Vec<VaultResult<StoredObject>> {
        uploads
            .into_iter()
            .map(|upload| self.store_object(upload, token))
            .collect()
    }

    /// Read an object's content.
    ///
    /// The ownership gate runs before anything else, encryption status
    /// included.  Encrypted content requires an explicit decrypt opt-in and
    /// a live token owned by the caller.
    pub fn read_object(
        &self,
        object_id: &str,
        caller_user_id: &str,
        want_decrypt: bool,
        token: Option<&str>,
    ) -> VaultResult<(MediaRecord, Vec<u8>)> {
        let record = self.owned_record(object_id, caller_user_id)?;

        if !record.is_encrypted {
            let bytes = self.store.read_content(&record)?;
            return Ok((record, bytes));
        }
        if !want_decrypt {
            return Err(VaultError::ContentRequiresDecryption);
        }

        let sealed = self.store.read_content(&record)?;
        let plaintext = self.open_sealed(&record, caller_user_id, token, &sealed)?;
        Ok((record, plaintext))
    }

    /// Read an object's thumbnail.
    ///
    /// For encrypted objects without a decrypt opt-in this returns a generic
    /// placeholder image rather than an error, so UI previews reveal nothing.
    pub fn read_thumbnail(
        &self,
        object_id: &str,
        caller_user_id: &str,
        want_decrypt: bool,
        token: Option<&str>,
    ) -> VaultResult<Vec<u8>> {
        let record = self.owned_record(object_id, caller_user_id)?;

        if record.is_encrypted && !want_decrypt {
            return Ok(PLACEHOLDER_THUMBNAIL.to_vec());
        }

        let Some(bytes) = self.store.read_thumbnail(&record)? else {
            return Err(VaultError::ObjectNotFound);
        };
        if !record.is_encrypted {
            return Ok(bytes);
        }
        self.open_sealed(&record, caller_user_id, token, &bytes)
    }

    fn owned_record(&self, object_id: &str, caller_user_id: &str) -> VaultResult<MediaRecord> {
        let record = self
            .store
            .get(object_id)
            .ok_or(VaultError::ObjectNotFound)?;
        if record.owner_id != caller_user_id {
            tracing::warn!(
                object = object_id,
                caller = caller_user_id,
                violation = "object_ownership",
                "media object requested by non-owner"
            );
            return Err(VaultError::NotOwner);
        }
        Ok(record)
    }

    /// Token → passphrase → content key → plaintext.  The thumbnail shares
    /// the parent's wrapped key, so one unwrap serves both.
    fn open_sealed(
        &self,
        record: &MediaRecord,
        caller_user_id: &str,
        token: Option<&str>,
        sealed: &[u8],
    ) -> VaultResult<Vec<u8>> {
        let token = token.ok_or(VaultError::TokenNotFound)?;
        let passphrase = self.sessions.resolve(token, caller_user_id)?;

        let Some(wrapped) = record.wrapped_key.as_deref() else {
            // Encrypted object without a wrapped key is a broken invariant
            // in the store, not a caller error.
            tracing::error!(
                object = %record.id,
                violation = "integrity",
                "encrypted object has no wrapped key"
            );
            return Err(VaultError::Integrity);
        };

        let cek = unwrap_content_key(wrapped, &passphrase, &self.wrap_params)?;
        reveal(sealed, &cek, &self.wrap_params)
    }
}
