//! Store configuration for client apps.
//!
//! Provides a `StoreConfig` shared by the CLI and app shells to locate the
//! local log file and the remote collection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

pub const DEFAULT_LOCAL_FILE_NAME: &str = "logs.json";
pub const DEFAULT_REMOTE_COLLECTION: &str = "logs";

const ENV_DATA_DIR: &str = "REEL_DATA_DIR";
const ENV_LOCAL_FILE: &str = "REEL_LOGS_FILE";
const ENV_COLLECTION: &str = "REEL_COLLECTION";

/// Where logs live on the device and in the remote document store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Private storage directory; the caller's platform default when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Well-known file name of the local collection inside `data_dir`
    #[serde(default = "default_local_file_name")]
    pub local_file_name: String,
    /// Remote collection holding log documents
    #[serde(default = "default_remote_collection")]
    pub remote_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            local_file_name: default_local_file_name(),
            remote_collection: default_remote_collection(),
        }
    }
}

fn default_local_file_name() -> String {
    DEFAULT_LOCAL_FILE_NAME.to_string()
}

fn default_remote_collection() -> String {
    DEFAULT_REMOTE_COLLECTION.to_string()
}

impl StoreConfig {
    /// Load from a JSON file, falling back to defaults.
    ///
    /// A missing file is normal. An unreadable or malformed file is logged and
    /// ignored so a bad config can never block startup.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(config) => config.normalized(),
                Err(error) => {
                    tracing::warn!(
                        "Failed to parse store config at {}: {}",
                        path.display(),
                        error
                    );
                    Self::default()
                }
            },
            Err(error) => {
                tracing::warn!(
                    "Failed to read store config at {}: {}",
                    path.display(),
                    error
                );
                Self::default()
            }
        }
    }

    /// Apply `REEL_DATA_DIR`, `REEL_LOGS_FILE` and `REEL_COLLECTION`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_DATA_DIR).ok(),
            std::env::var(ENV_LOCAL_FILE).ok(),
            std::env::var(ENV_COLLECTION).ok(),
        )
    }

    fn with_overrides(
        mut self,
        data_dir: Option<String>,
        local_file_name: Option<String>,
        remote_collection: Option<String>,
    ) -> Self {
        if let Some(dir) = normalize_text_option(data_dir) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = normalize_text_option(local_file_name) {
            self.local_file_name = name;
        }
        if let Some(collection) = normalize_text_option(remote_collection) {
            self.remote_collection = collection;
        }
        self
    }

    /// Configured data directory, or `fallback` when none is set
    #[must_use]
    pub fn resolve_data_dir(&self, fallback: impl Into<PathBuf>) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| fallback.into())
    }

    fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: self.data_dir,
            local_file_name: normalize_text_option(Some(self.local_file_name))
                .unwrap_or(defaults.local_file_name),
            remote_collection: normalize_text_option(Some(self.remote_collection))
                .unwrap_or(defaults.remote_collection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::load_from_path(&dir.path().join("reel.json"));
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.local_file_name, "logs.json");
        assert_eq!(config.remote_collection, "logs");
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reel.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(StoreConfig::load_from_path(&path), StoreConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reel.json");
        std::fs::write(&path, r#"{ "remote_collection": "x", "surprise": 1 }"#).unwrap();
        assert_eq!(StoreConfig::load_from_path(&path), StoreConfig::default());
    }

    #[test]
    fn file_values_are_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reel.json");
        std::fs::write(
            &path,
            r#"{ "data_dir": "/tmp/reel", "local_file_name": "  ", "remote_collection": " watchlists " }"#,
        )
        .unwrap();

        let config = StoreConfig::load_from_path(&path);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/reel")));
        assert_eq!(config.local_file_name, "logs.json");
        assert_eq!(config.remote_collection, "watchlists");
    }

    #[test]
    fn overrides_ignore_blank_values() {
        let config = StoreConfig::default().with_overrides(
            Some(" /data/reel ".to_string()),
            Some("   ".to_string()),
            None,
        );
        assert_eq!(config.data_dir, Some(PathBuf::from("/data/reel")));
        assert_eq!(config.local_file_name, "logs.json");
        assert_eq!(config.remote_collection, "logs");
    }

    #[test]
    fn resolve_data_dir_prefers_configured_value() {
        let configured = StoreConfig {
            data_dir: Some(PathBuf::from("/configured")),
            ..StoreConfig::default()
        };
        assert_eq!(
            configured.resolve_data_dir("/fallback"),
            PathBuf::from("/configured")
        );
        assert_eq!(
            StoreConfig::default().resolve_data_dir("/fallback"),
            PathBuf::from("/fallback")
        );
    }
}
