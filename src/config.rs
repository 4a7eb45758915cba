//! Configuration loading for Revelation Fill
//!
//! Configuration is loaded from a TOML file, with defaults that work out of
//! the box. The chosen vault source is not part of this file: it is a user
//! selection and lives in the durable store (see [`crate::source`]).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::VaultError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Durable store configuration
    pub store: StoreConfig,
    /// Timeouts for the suspension points of the pipeline
    pub timeouts: TimeoutConfig,
    /// Compatibility switches
    pub compat: CompatConfig,
    /// Decryption engine configuration
    pub engine: EngineConfig,
    /// Entry catalog configuration
    pub catalog: CatalogConfig,
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database holding persisted keys
    pub path: PathBuf,
}

/// Timeouts, in seconds. Absent means wait forever.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Network fetch of the vault or of the host page
    pub fetch_secs: Option<u64>,
    /// Round-trip through the page scanner channel
    pub channel_secs: Option<u64>,
    /// Round-trip through the decryption engine
    pub engine_secs: Option<u64>,
}

/// Compatibility switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Failed fetches never resolve instead of reporting a failure
    pub legacy_hang: bool,
}

/// Decryption engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which engine to run
    pub kind: EngineKind,
}

/// Available engines
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Built-in Revelation (AES-256 + zlib) engine
    #[default]
    Revelation,
}

/// Entry catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Entry type shown without a "(type)" suffix in listings
    pub default_type: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .map(|d| d.join("revelation-fill").join("store.db"))
                .unwrap_or_else(|| PathBuf::from("revelation-fill.db")),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Revelation,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_type: crate::catalog::DEFAULT_TYPE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self, VaultError> {
        let config_path = path.cloned().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("revelation-fill").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("revelation-fill.toml"))
        });

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .map_err(|e| VaultError::Config(format!("failed to read config: {e}")))?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| VaultError::Config(format!("failed to parse config: {e}")))?;
            Ok(config)
        } else {
            tracing::info!("no config file found at {}, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    /// Fetch timeout, if any
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.timeouts.fetch_secs.map(Duration::from_secs)
    }

    /// Page scanner round-trip timeout, if any
    pub fn channel_timeout(&self) -> Option<Duration> {
        self.timeouts.channel_secs.map(Duration::from_secs)
    }

    /// Decryption engine round-trip timeout, if any
    pub fn engine_timeout(&self) -> Option<Duration> {
        self.timeouts.engine_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.fetch_timeout().is_none());
        assert!(config.channel_timeout().is_none());
        assert!(config.engine_timeout().is_none());
        assert!(!config.compat.legacy_hang);
        assert_eq!(config.engine.kind, EngineKind::Revelation);
        assert_eq!(config.catalog.default_type, "website");
        assert!(config.store.path.to_string_lossy().ends_with(".db"));
    }

    #[test]
    fn test_config_parsing() {
        let toml = r#"
[store]
path = "/tmp/test.db"

[timeouts]
fetch_secs = 15
engine_secs = 5

[compat]
legacy_hang = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.channel_timeout(), None);
        assert_eq!(config.engine_timeout(), Some(Duration::from_secs(5)));
        assert!(config.compat.legacy_hang);
        assert_eq!(config.catalog.default_type, "website");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.compat.legacy_hang);
    }
}
