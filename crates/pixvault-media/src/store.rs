//! Media object store: disk blobs + JSON index
//!
//! Layout under the data dir:
//! ```text
//! objects/<id>   full content bytes (as stored: sealed frame or plaintext)
//! thumbs/<id>    thumbnail bytes (same storage form as the parent)
//! index.json     object records + dedup map
//! ```
//!
//! Dedup is keyed by `(owner, content hash, encrypted flag)` and resolved
//! under the index lock: the first insert wins, a concurrent duplicate gets
//! the existing record back.  Every blob carries a hash of the bytes as
//! stored; reads recompute it and refuse to serve on mismatch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pixvault_core::{VaultError, VaultResult};

/// One stored media object (or its encrypted form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub owner_id: String,
    pub mime_type: String,
    /// Plaintext size in bytes (the stored frame is larger when encrypted)
    pub size: u64,
    /// BLAKE3 of the uploaded plaintext; dedup key component
    pub content_hash: String,
    /// BLAKE3 of the content bytes as stored; integrity check on read
    pub stored_hash: String,
    /// BLAKE3 of the thumbnail bytes as stored, if a thumbnail exists
    pub thumb_stored_hash: Option<String>,
    pub is_encrypted: bool,
    /// Content key sealed under the vault passphrase; present iff encrypted
    pub wrapped_key: Option<String>,
}

/// Insert outcome: the authoritative record, and whether it already existed.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub record: MediaRecord,
    pub is_duplicate: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    records: HashMap<String, MediaRecord>,
    /// dedup key → object id
    by_content: HashMap<String, String>,
}

pub struct MediaStore {
    root: PathBuf,
    index: Mutex<Index>,
}

impl MediaStore {
    /// Open the store rooted at `root`, creating the layout on first use.
    pub fn open(root: &Path) -> VaultResult<Self> {
        std::fs::create_dir_all(root.join("objects"))?;
        std::fs::create_dir_all(root.join("thumbs"))?;

        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("parsing media index {}: {e}", index_path.display()))?
        } else {
            Index::default()
        };

        Ok(Self {
            root: root.to_path_buf(),
            index: Mutex::new(index),
        })
    }

    fn dedup_key(owner_id: &str, content_hash: &str, encrypted: bool) -> String {
        format!("{owner_id}\u{0}{content_hash}\u{0}{encrypted}")
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.root.join("objects").join(id)
    }

    fn thumb_path(&self, id: &str) -> PathBuf {
        self.root.join("thumbs").join(id)
    }

    /// Insert a new object, or return the existing one for duplicate content.
    ///
    /// The whole operation runs under the index lock, so of two concurrent
    /// inserts of the same `(owner, content, encrypted)` exactly one persists;
    /// the loser observes the winner's record with `is_duplicate: true`.
    pub fn insert(
        &self,
        record: MediaRecord,
        content: &[u8],
        thumbnail: Option<&[u8]>,
    ) -> VaultResult<StoredObject> {
        let key = Self::dedup_key(&record.owner_id, &record.content_hash, record.is_encrypted);
        let mut index = self.index.lock().expect("media index lock poisoned");

        if let Some(existing_id) = index.by_content.get(&key) {
            if let Some(existing) = index.records.get(existing_id) {
                tracing::debug!(object = %existing.id, "duplicate upload resolved to existing object");
                return Ok(StoredObject {
                    record: existing.clone(),
                    is_duplicate: true,
                });
            }
        }

        std::fs::write(self.object_path(&record.id), content)?;
        if let Some(thumb) = thumbnail {
            std::fs::write(self.thumb_path(&record.id), thumb)?;
        }

        index.by_content.insert(key, record.id.clone());
        index.records.insert(record.id.clone(), record.clone());
        self.flush_locked(&index)?;

        Ok(StoredObject {
            record,
            is_duplicate: false,
        })
    }

    pub fn get(&self, object_id: &str) -> Option<MediaRecord> {
        self.index
            .lock()
            .expect("media index lock poisoned")
            .records
            .get(object_id)
            .cloned()
    }

    /// Read the content blob as stored, verifying its integrity hash.
    pub fn read_content(&self, record: &MediaRecord) -> VaultResult<Vec<u8>> {
        let bytes = std::fs::read(self.object_path(&record.id))?;
        self.check_integrity(&record.id, &bytes, &record.stored_hash)?;
        Ok(bytes)
    }

    /// Read the thumbnail blob as stored, if one exists.
    pub fn read_thumbnail(&self, record: &MediaRecord) -> VaultResult<Option<Vec<u8>>> {
        let Some(expected) = record.thumb_stored_hash.as_deref() else {
            return Ok(None);
        };
        let bytes = std::fs::read(self.thumb_path(&record.id))?;
        self.check_integrity(&record.id, &bytes, expected)?;
        Ok(Some(bytes))
    }

    fn check_integrity(&self, id: &str, bytes: &[u8], expected: &str) -> VaultResult<()> {
        let actual = blake3::hash(bytes).to_hex().to_string();
        if actual != expected {
            // Reported, never auto-corrected; the record stays for audit.
            tracing::error!(
                object = id,
                violation = "integrity",
                "stored bytes no longer match recorded hash"
            );
            return Err(VaultError::Integrity);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index
            .lock()
            .expect("media index lock poisoned")
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flush_locked(&self, index: &Index) -> VaultResult<()> {
        let content = serde_json::to_string_pretty(index)
            .map_err(|e| anyhow::anyhow!("encoding media index: {e}"))?;
        std::fs::write(self.root.join("index.json"), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, owner: &str, content: &[u8]) -> MediaRecord {
        MediaRecord {
            id: id.into(),
            owner_id: owner.into(),
            mime_type: "image/jpeg".into(),
            size: content.len() as u64,
            content_hash: blake3::hash(content).to_hex().to_string(),
            stored_hash: blake3::hash(content).to_hex().to_string(),
            thumb_stored_hash: None,
            is_encrypted: false,
            wrapped_key: None,
        }
    }

    #[test]
    fn test_insert_get_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(dir.path()).unwrap();

        let stored = store.insert(record("a", "alice", b"bytes"), b"bytes", None).unwrap();
        assert!(!stored.is_duplicate);

        let fetched = store.get("a").unwrap();
        assert_eq!(fetched.owner_id, "alice");
        assert_eq!(store.read_content(&fetched).unwrap(), b"bytes");
    }

    #[test]
    fn test_duplicate_same_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(dir.path()).unwrap();

        store.insert(record("a", "alice", b"same"), b"same", None).unwrap();
        let second = store.insert(record("b", "alice", b"same"), b"same", None).unwrap();

        assert!(second.is_duplicate);
        assert_eq!(second.record.id, "a");
        assert_eq!(store.len(), 1);
        assert!(store.get("b").is_none());
    }

    #[test]
    fn test_same_content_different_owner_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(dir.path()).unwrap();

        store.insert(record("a", "alice", b"same"), b"same", None).unwrap();
        let second = store.insert(record("b", "bob", b"same"), b"same", None).unwrap();

        assert!(!second.is_duplicate);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = MediaStore::open(dir.path()).unwrap();
            store.insert(record("a", "alice", b"bytes"), b"bytes", None).unwrap();
        }

        let reopened = MediaStore::open(dir.path()).unwrap();
        let fetched = reopened.get("a").unwrap();
        assert_eq!(reopened.read_content(&fetched).unwrap(), b"bytes");
        // Dedup map survives too
        let dup = reopened.insert(record("c", "alice", b"bytes"), b"bytes", None).unwrap();
        assert!(dup.is_duplicate);
    }

    #[test]
    fn test_integrity_violation_on_tampered_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(dir.path()).unwrap();
        store.insert(record("a", "alice", b"bytes"), b"bytes", None).unwrap();

        std::fs::write(dir.path().join("objects/a"), b"tampered").unwrap();

        let fetched = store.get("a").unwrap();
        let result = store.read_content(&fetched);
        assert!(matches!(result, Err(VaultError::Integrity)));
    }

    #[test]
    fn test_thumbnail_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(dir.path()).unwrap();

        let mut rec = record("a", "alice", b"content");
        rec.thumb_stored_hash = Some(blake3::hash(b"thumb").to_hex().to_string());
        let stored = store.insert(rec, b"content", Some(b"thumb")).unwrap();

        let thumb = store.read_thumbnail(&stored.record).unwrap();
        assert_eq!(thumb.as_deref(), Some(b"thumb".as_slice()));

        let plain = record("b", "alice", b"other");
        let stored = store.insert(plain, b"other", None).unwrap();
        assert!(store.read_thumbnail(&stored.record).unwrap().is_none());
    }
}
