//! Error types for registering search directories.
//!
//! Lookups never fail (a miss is just `None`), so the only errors here come
//! from registering a directory or loading the config file.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for fallible spath operations.
pub type Result<T> = std::result::Result<T, SpathError>;

/// Things that can go wrong when registering directories or loading config.
#[derive(Error, Debug)]
pub enum SpathError {
    /// The path did not resolve as given, inside any registered
    /// directory, or relative to the working directory.
    #[error("path '{path}' does not exist")]
    NotFound { path: String },

    /// The path resolved, but to a file. Only directories can be searched.
    #[error("path '{path}' should be a directory")]
    NotADirectory { path: PathBuf },

    /// Couldn't read a file from disk.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file exists but is not valid.
    #[error("invalid config '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

impl SpathError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
