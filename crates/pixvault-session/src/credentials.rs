//! Persisted per-user passphrase verifiers
//!
//! A small JSON file mapping user id → `salt_hex:verifier_hex`.  Only the
//! verifier is ever written; the raw passphrase has no persisted form.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pixvault_core::VaultResult;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialData {
    verifiers: HashMap<String, String>,
}

#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    data: CredentialData,
}

impl CredentialStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> VaultResult<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("parsing credential store {}: {e}", path.display()))?
        } else {
            CredentialData::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn verifier(&self, user_id: &str) -> Option<&str> {
        self.data.verifiers.get(user_id).map(String::as_str)
    }

    pub fn set_verifier(&mut self, user_id: &str, verifier: String) {
        self.data.verifiers.insert(user_id.to_owned(), verifier);
    }

    /// Write the store back to disk.
    pub fn flush(&self) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)
            .map_err(|e| anyhow::anyhow!("encoding credential store: {e}"))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(&dir.path().join("credentials.json")).unwrap();

        assert!(store.verifier("alice").is_none());
    }

    #[test]
    fn test_flush_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/credentials.json");

        let mut store = CredentialStore::open(&path).unwrap();
        store.set_verifier("alice", "00ff:aa11".into());
        store.flush().unwrap();

        let reloaded = CredentialStore::open(&path).unwrap();
        assert_eq!(reloaded.verifier("alice"), Some("00ff:aa11"));
        assert!(reloaded.verifier("bob").is_none());
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(CredentialStore::open(&path).is_err());
    }
}
