//! Launcher configuration loading and saving.
//!
//! Lives at `<root>/config.json`. Every field has a default, so a partial file
//! only overrides what it names. A missing or malformed file yields defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builds::BuildLayout;
use crate::error::StoreError;
use crate::launch::{HostConfig, SupervisorConfig, DEFAULT_NOTICE_WINDOW, DEFAULT_POLL_INTERVAL};
use crate::storage::StorageConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherConfig {
    pub poll_interval_ms: u64,
    pub notice_window_ms: u64,
    pub layout: BuildLayout,
    pub host: HostConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            notice_window_ms: DEFAULT_NOTICE_WINDOW.as_millis() as u64,
            layout: BuildLayout::default(),
            host: HostConfig::default(),
        }
    }
}

impl LauncherConfig {
    /// Loads the config file, returning defaults if it doesn't exist or can't
    /// be parsed.
    pub fn load(storage: &StorageConfig) -> Self {
        let path = storage.config_file();
        let content = match fs_err::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read launcher config; using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Launcher config is malformed; using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &StorageConfig) -> Result<(), StoreError> {
        let path = storage.config_file();
        let content = serde_json::to_string_pretty(self).map_err(|source| StoreError::Json {
            context: "serializing launcher config".to_string(),
            source,
        })?;
        storage.ensure_dirs().map_err(|source| StoreError::Io {
            context: format!("creating {}", storage.root().display()),
            source,
        })?;
        fs_err::write(&path, content).map_err(|source| StoreError::Io {
            context: format!("writing {}", path.display()),
            source,
        })
    }

    /// Zero intervals are clamped to one millisecond; `tokio::time::interval`
    /// rejects a zero period.
    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            notice_window: Duration::from_millis(self.notice_window_ms),
        }
    }
}
