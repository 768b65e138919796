//! Configuration file support.
//!
//! A project can keep its search roots in `.spath/config.json`:
//!
//! ```json
//! {
//!   "roots": ["public", "templates"],
//!   "cache": true,
//!   "index_files": ["index.html", "index.htm"]
//! }
//! ```
//!
//! Relative roots are resolved against the directory containing `.spath`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SpathError};

/// Directory holding the config file.
pub const CONFIG_DIR: &str = ".spath";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpathConfig {
    /// Search roots in priority order.
    pub roots: Vec<PathBuf>,

    /// Keep an in-memory cache updated by filesystem events.
    pub cache: bool,

    /// Files tried inside a directory hit.
    pub index_files: Vec<String>,
}

impl Default for SpathConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            cache: false,
            index_files: vec!["index.html".to_string()],
        }
    }
}

impl SpathConfig {
    /// Path of the config file for a project directory.
    pub fn path_in(project: &Path) -> PathBuf {
        project.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| SpathError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| SpathError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `<project>/.spath/config.json`, or the defaults if it is missing.
    ///
    /// Relative roots are made absolute against `project`.
    pub fn load_or_default(project: &Path) -> Result<Self> {
        let path = Self::path_in(project);
        let mut config = if crate::path::exists(&path) {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.roots = config
            .roots
            .into_iter()
            .map(|root| if root.is_absolute() { root } else { project.join(root) })
            .collect();
        Ok(config)
    }

    /// Writes the config as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SpathError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SpathError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| SpathError::io(path, e))
    }
}
