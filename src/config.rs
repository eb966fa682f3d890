//! Application configuration: a TOML file plus environment overrides.
//!
//! Everything has a workable default so the binary runs with no config file
//! at all; `METAFLOW_*` environment variables (usually via `.env`) override
//! whatever the file provides.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};
use tracing::debug;

/// Quiet period before an outbound sync cycle, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

const fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// Directory the local mirror lives in.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Authenticated user id; absent means a guest (local-only) session.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            user_id: None,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub const fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

/// Parses a TOML config file.
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    let config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse TOML from config file {path_ref:?}: {e}"),
    })?;
    Ok(config)
}

/// Loads the effective configuration: the file at `METAFLOW_CONFIG_PATH`
/// (default `config.toml`) when present, then environment overrides.
///
/// # Errors
/// Returns [`Error::Config`] on an unreadable/unparsable config file or a
/// malformed `METAFLOW_DEBOUNCE_MS` value. A missing file is not an error.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = env::var("METAFLOW_CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        debug!("No config file at {path}; using defaults");
        AppConfig::default()
    };

    if let Ok(dir) = env::var("METAFLOW_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(ms) = env::var("METAFLOW_DEBOUNCE_MS") {
        config.debounce_ms = ms.parse().map_err(|e| Error::Config {
            message: format!("Invalid METAFLOW_DEBOUNCE_MS value {ms:?}: {e}"),
        })?;
    }
    if let Ok(user_id) = env::var("METAFLOW_USER_ID") {
        config.user_id = (!user_id.is_empty()).then_some(user_id);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_fields_absent() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(config.user_id.is_none());
    }

    #[test]
    fn file_values_are_honored() {
        let config: AppConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/metaflow"
            debounce_ms = 500
            user_id = "u-42"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/metaflow"));
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.user_id.as_deref(), Some("u-42"));
    }

    #[test]
    fn load_config_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "debounce_ms = \"not a number\"").unwrap();
        assert!(load_config(&path).is_err());
    }
}
