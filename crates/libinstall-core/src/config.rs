//! Centralized configuration for libinstall.
//!
//! Constants for directory names, clone and download behavior, plus the
//! `LibrariesConfig` that tells a manager where the managed directories live.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{LibraryError, Result};

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const APP_DIR_NAME: &'static str = "libinstall";
    pub const LIBRARIES_DIR_NAME: &'static str = "libraries";
    pub const STAGING_DIR_NAME: &'static str = "staging";
    pub const CONFIG_FILE_NAME: &'static str = "libinstall.json";
    /// Prefix of the scratch directory an archive is extracted into.
    pub const ARCHIVE_TEMP_PREFIX: &'static str = "libinstall-lib-";
    /// Prefix of the staging directory an index resource is unpacked into.
    pub const RESOURCE_TEMP_PREFIX: &'static str = "package-";
    pub const GIT_METADATA_DIR_NAME: &'static str = ".git";
}

/// Configuration for installation process.
pub struct InstallationConfig;

impl InstallationConfig {
    pub const CLONE_DEPTH: u32 = 1;
    pub const CLONE_POLL_INTERVAL: Duration = Duration::from_millis(50);
    pub const GIT_PROGRAM: &'static str = "git";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DOWNLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
    pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
}

/// Locations of the directories a `LibrariesManager` works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrariesConfig {
    /// Root of the managed user libraries. Installs fail without it.
    #[serde(default)]
    pub user_libraries_dir: Option<PathBuf>,
    /// Shared cache for downloaded index resources.
    pub downloads_dir: PathBuf,
    /// Root for scratch extraction directories (system temp dir if unset).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl LibrariesConfig {
    /// Conventional layout under a data directory:
    /// `<root>/libraries` for user libraries and `<root>/staging/libraries`
    /// for downloaded resources.
    pub fn with_data_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            user_libraries_dir: Some(root.join(PathsConfig::LIBRARIES_DIR_NAME)),
            downloads_dir: root
                .join(PathsConfig::STAGING_DIR_NAME)
                .join(PathsConfig::LIBRARIES_DIR_NAME),
            temp_dir: None,
        }
    }

    /// Layout under the platform data directory (e.g. `~/.local/share/libinstall`).
    pub fn platform_default() -> Result<Self> {
        let data_dir = dirs::data_dir().ok_or_else(|| LibraryError::Config {
            message: "Could not determine platform data directory".to_string(),
        })?;
        Ok(Self::with_data_dir(data_dir.join(PathsConfig::APP_DIR_NAME)))
    }

    /// Root under which scratch directories are allocated.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| LibraryError::fs(e, "Failed to read config file", path))?;

        serde_json::from_str(&contents).map_err(|e| LibraryError::Config {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    /// Write the configuration as JSON, replacing the target atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LibraryError::fs(e, "Failed to create config directory", parent))?;
        }

        let serialized = serde_json::to_string_pretty(self).map_err(|e| LibraryError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&temp_path, serialized)
            .map_err(|e| LibraryError::fs(e, "Failed to write temp config file", &temp_path))?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            LibraryError::fs(e, "Failed to replace config file", path)
        })?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }
}
