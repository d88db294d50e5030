//! Filesystem configuration.
//!
//! Loaded from `~/.config/hypernotes/fs.toml`:
//!
//! ```toml
//! root = "/home/me/Notes"
//! metadata_path = "/home/me/.local/share/hypernotes/meta.db"
//! default_directory = "DOCUMENTS"
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vfs::{FsError, FsResult};

/// Named logical root used when a caller does not name one.
pub const DEFAULT_DIRECTORY: &str = "DOCUMENTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Directory the local access provider grants. `None` grants an
    /// in-memory tree.
    pub root: Option<PathBuf>,
    /// SQLite file for the metadata cache. `None` keeps it in memory.
    pub metadata_path: Option<PathBuf>,
    pub default_directory: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: None,
            metadata_path: None,
            default_directory: DEFAULT_DIRECTORY.to_string(),
        }
    }
}

/// Get the config file path (~/.config/hypernotes/fs.toml).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hypernotes").join("fs.toml"))
}

impl FsConfig {
    /// Parse a TOML document.
    pub fn from_toml(source: &str) -> FsResult<Self> {
        toml::from_str(source).map_err(|e| FsError::Config(e.to_string()))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> FsResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match config_file_path() {
                Some(p) => p,
                None => {
                    tracing::info!("no config directory available, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let source = std::fs::read_to_string(&path)
            .map_err(|e| FsError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&source).map_err(|e| match e {
            FsError::Config(msg) => FsError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
