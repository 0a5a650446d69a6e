//! System configuration loaded from TOML.
//!
//! Loading order:
//!
//! 1. `SYNCHROMETER_CONFIG` environment variable (path to a TOML file)
//! 2. `synchrometer.toml` in the current working directory
//! 3. Built-in defaults (the original deployment port layout)
//!
//! A missing file falls back silently; a file that exists but does not
//! parse is a hard [`ConfigError`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SYNCHROMETER_CONFIG";

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "synchrometer.toml";

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Endpoint URLs for the nine downstream processing stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageEndpoints {
    pub cochlear_primary: String,
    pub cochlear_secondary: String,
    pub resonator: String,
    pub harmonizer: String,
    pub phonatory: String,
    pub anterior_helix: String,
    pub posterior_helix: String,
    pub echostack: String,
    pub echo_ripple: String,
}

impl Default for StageEndpoints {
    fn default() -> Self {
        Self {
            cochlear_primary: "http://localhost:8001".to_string(),
            cochlear_secondary: "http://localhost:8006".to_string(),
            resonator: "http://localhost:8010".to_string(),
            harmonizer: "http://localhost:8020".to_string(),
            phonatory: "http://localhost:8030".to_string(),
            anterior_helix: "http://localhost:8041".to_string(),
            posterior_helix: "http://localhost:8042".to_string(),
            echostack: "http://localhost:8043".to_string(),
            echo_ripple: "http://localhost:8044".to_string(),
        }
    }
}

/// Top-level system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Tag recorded into vault metadata as `iss_system`.
    pub system_name: String,
    /// Root for the vault files and the cycle ledger.
    pub data_dir: PathBuf,
    /// Bounded per-request timeout for downstream stage calls.
    pub request_timeout_secs: u64,
    pub stages: StageEndpoints,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system_name: "SYNCHROMETER".to_string(),
            data_dir: PathBuf::from("./data"),
            request_timeout_secs: 30,
            stages: StageEndpoints::default(),
        }
    }
}

impl SystemConfig {
    /// Load following the documented order.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            info!(path = %path, "loading config from {}", CONFIG_ENV_VAR);
            return Self::from_file(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            info!(path = %default_path.display(), "loading config from working directory");
            return Self::from_file(default_path);
        }

        Ok(Self::default())
    }

    /// Parse a specific TOML file. Unspecified fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding the per-kind verdict vault files.
    pub fn vault_dir(&self) -> PathBuf {
        self.data_dir.join("vaults")
    }

    /// Path of the cycle event ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("logs").join("cycle_events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::default();
        assert_eq!(config.system_name, "SYNCHROMETER");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.stages.cochlear_primary, "http://localhost:8001");
        assert_eq!(config.stages.echo_ripple, "http://localhost:8044");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synchrometer.toml");
        std::fs::write(
            &path,
            r#"
system_name = "BENCH"
request_timeout_secs = 5

[stages]
harmonizer = "http://harmonizer.internal:9000"
"#,
        )
        .unwrap();

        let config = SystemConfig::from_file(&path).unwrap();
        assert_eq!(config.system_name, "BENCH");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.stages.harmonizer, "http://harmonizer.internal:9000");
        // Unspecified endpoints keep their defaults.
        assert_eq!(config.stages.resonator, "http://localhost:8010");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "system_name = [not toml").unwrap();
        assert!(matches!(
            SystemConfig::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let missing = Path::new("/definitely/not/here.toml");
        assert!(matches!(
            SystemConfig::from_file(missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_derived_paths() {
        let config = SystemConfig {
            data_dir: PathBuf::from("/var/lib/synchrometer"),
            ..SystemConfig::default()
        };
        assert_eq!(
            config.vault_dir(),
            PathBuf::from("/var/lib/synchrometer/vaults")
        );
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/var/lib/synchrometer/logs/cycle_events.jsonl")
        );
    }
}
