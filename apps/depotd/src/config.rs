//! Daemon configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/filedepot/depotd.toml`
//! - Windows: `%APPDATA%/filedepot/depotd.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use filedepot_protocol::constants::DEFAULT_CHUNK_SIZE;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TCP port to listen on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Root directory for the local-disk tier.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Size of emitted download chunks in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-upload memory bound before spilling to disk, in bytes.
    #[serde(default = "default_spool_threshold")]
    pub spool_threshold: usize,

    /// When `true`, a failed mirror write fails the whole upload.
    #[serde(default)]
    pub strict_mirror: bool,

    /// Deadline for one tier operation, in seconds.
    #[serde(default = "default_tier_op_timeout_secs")]
    pub tier_op_timeout_secs: u64,

    /// Primary tier endpoint and credentials.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

/// Primary tier connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL of the object store.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bucket objects are stored in.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Optional Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_listen_port() -> u16 {
    5000
}

fn default_data_dir() -> String {
    "~/.local/share/filedepot".into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_spool_threshold() -> usize {
    filedepot_service::DEFAULT_SPOOL_THRESHOLD
}

fn default_tier_op_timeout_secs() -> u64 {
    30
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9000".into()
}

fn default_bucket() -> String {
    "filedepot".into()
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bucket: default_bucket(),
            token: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            spool_threshold: default_spool_threshold(),
            strict_mirror: false,
            tier_op_timeout_secs: default_tier_op_timeout_secs(),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // The token is a credential; restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("filedepot")
            .join("depotd.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("filedepot").join("depotd.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/filedepot/depotd.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.listen_port, 5000);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(!config.strict_mirror);
        assert_eq!(config.tier_op_timeout_secs, 30);
        assert_eq!(config.object_store.bucket, "filedepot");
        assert!(config.object_store.token.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            listen_port: 8888,
            data_dir: "/var/lib/filedepot".into(),
            chunk_size: 128 * 1024,
            spool_threshold: 1024,
            strict_mirror: true,
            tier_op_timeout_secs: 5,
            object_store: ObjectStoreConfig {
                endpoint: "https://objects.example.com".into(),
                bucket: "prod".into(),
                token: Some("secret".into()),
            },
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.listen_port, 8888);
        assert_eq!(parsed.data_dir, "/var/lib/filedepot");
        assert!(parsed.strict_mirror);
        assert_eq!(parsed.object_store.token.as_deref(), Some("secret"));
    }

    #[test]
    fn config_partial_toml() {
        // Only specify the port, rest should use defaults.
        let toml_str = "listen_port = 7000";
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.listen_port, 7000);
        assert_eq!(config.data_dir, "~/.local/share/filedepot");
        assert_eq!(config.object_store.endpoint, "http://127.0.0.1:9000");
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("filedepot"));
    }
}
