use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level daemon configuration (loaded from pixvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PixvaultConfig {
    pub daemon: DaemonConfig,
    pub vault: VaultConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// TCP listen address for the vault HTTP API (default: 127.0.0.1:8350)
    pub listen: String,
    /// Prometheus metrics endpoint (default: 127.0.0.1:9105)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

/// Vault session and key-derivation configuration.
///
/// The two iteration counts are compatibility-breaking parameters: verifiers
/// and wrapped keys produced under one count cannot be checked or unwrapped
/// under another.  They belong to independent derivation sites (login
/// verification vs. content-key wrapping) and must never be cross-applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Unlock token lifetime in seconds (default: 1800 = 30 minutes)
    pub token_ttl_secs: u64,
    /// Interval between expired-token sweeps in seconds (default: 300)
    pub sweep_interval_secs: u64,
    /// PBKDF2 iterations for the content/key-wrap derivation site
    /// (default: 15000)
    pub wrap_kdf_iterations: u32,
    /// PBKDF2 iterations for the passphrase-verifier derivation site
    /// (default: 100000)
    pub verifier_kdf_iterations: u32,
    /// Path to the persisted per-user verifier file
    pub credentials_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root directory for stored media blobs and the object index
    pub data_dir: PathBuf,
    /// Maximum accepted object size in MB (default: 512)
    pub max_object_mb: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8350".into(),
            metrics_addr: Some("127.0.0.1:9105".into()),
            log_level: "info".into(),
            log_format: "json".into(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 1800,
            sweep_interval_secs: 300,
            wrap_kdf_iterations: 15_000,
            verifier_kdf_iterations: 100_000,
            credentials_file: PathBuf::from("~/.local/share/pixvault/credentials.json"),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.local/share/pixvault/media"),
            max_object_mb: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[daemon]
listen = "0.0.0.0:9000"
log_level = "debug"
log_format = "text"

[vault]
token_ttl_secs = 600
sweep_interval_secs = 60
wrap_kdf_iterations = 15000
verifier_kdf_iterations = 100000
credentials_file = "/var/lib/pixvault/credentials.json"

[media]
data_dir = "/var/lib/pixvault/media"
max_object_mb = 1024
"#;
        let config: PixvaultConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.daemon.listen, "0.0.0.0:9000");
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.vault.token_ttl_secs, 600);
        assert_eq!(config.vault.sweep_interval_secs, 60);
        assert_eq!(config.vault.wrap_kdf_iterations, 15_000);
        assert_eq!(
            config.vault.credentials_file,
            PathBuf::from("/var/lib/pixvault/credentials.json")
        );
        assert_eq!(config.media.data_dir, PathBuf::from("/var/lib/pixvault/media"));
        assert_eq!(config.media.max_object_mb, 1024);
    }

    #[test]
    fn test_parse_defaults() {
        let config: PixvaultConfig = toml::from_str("").unwrap();

        assert_eq!(config.daemon.listen, "127.0.0.1:8350");
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.vault.token_ttl_secs, 1800);
        assert_eq!(config.vault.sweep_interval_secs, 300);
        assert_eq!(config.vault.wrap_kdf_iterations, 15_000);
        assert_eq!(config.vault.verifier_kdf_iterations, 100_000);
        assert_eq!(config.media.max_object_mb, 512);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[vault]
token_ttl_secs = 120
"#;
        let config: PixvaultConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.vault.token_ttl_secs, 120);
        // Defaults
        assert_eq!(config.vault.sweep_interval_secs, 300);
        assert_eq!(config.daemon.listen, "127.0.0.1:8350");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = PixvaultConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: PixvaultConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.daemon.listen, parsed.daemon.listen);
        assert_eq!(config.vault.token_ttl_secs, parsed.vault.token_ttl_secs);
        assert_eq!(config.media.data_dir, parsed.media.data_dir);
    }
}
