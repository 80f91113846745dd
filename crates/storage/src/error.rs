//! Storage error types.

use cask_core::{AppId, AppName, PackageVersion};
use cask_signer::SignerError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{app} {version} is already published")]
    AlreadyPublished { app: AppName, version: PackageVersion },

    #[error("identity mismatch for {app}: stored {stored}, derived {derived}")]
    IdentityMismatch {
        app: AppName,
        stored: AppId,
        derived: AppId,
    },

    #[error("corrupt repository entry for {app}: {entry}")]
    CorruptEntry { app: String, entry: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("key error for {app}: {source}")]
    Key {
        app: AppName,
        #[source]
        source: SignerError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
