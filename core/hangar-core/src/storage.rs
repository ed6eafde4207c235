//! Storage configuration and path management for Hangar.
//!
//! `StorageConfig` is the single place that decides where Hangar keeps its
//! files. Production code uses `StorageConfig::default()` (`~/.hangar/`);
//! tests inject a temp directory with `StorageConfig::with_root()`.

use std::path::{Path, PathBuf};

/// Environment variable that relocates the Hangar root directory. Read by
/// the CLI as the fallback for `--home`.
pub const HOME_ENV: &str = "HANGAR_HOME";

/// Central configuration for all Hangar storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all Hangar data (default: ~/.hangar)
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(".hangar"))
            .unwrap_or_else(|| std::env::temp_dir().join(".hangar"));
        Self { root }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory for Hangar data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to store.json (builds, selection, session, toggle).
    pub fn store_file(&self) -> PathBuf {
        self.root.join("store.json")
    }

    /// Path to config.json (launcher preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Path to logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.root)?;
        fs_err::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
