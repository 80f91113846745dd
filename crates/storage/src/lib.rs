//! Key and package storage for cask.
//!
//! This crate provides:
//! - Per-application signing key persistence with single-winner creation
//! - The write-once version repository (`{app}/{version}/{app}.{ext}`)
//! - Identity records that pin each application to its key
//! - A local filesystem backend rooted at the data directory

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{KeyStore, LoadedKey, VersionRepository};

use cask_core::config::{SigningConfig, StorageConfig};
use std::sync::Arc;

/// Create the storage backend from configuration.
pub async fn from_config(
    storage: &StorageConfig,
    signing: &SigningConfig,
) -> StorageResult<Arc<FilesystemBackend>> {
    storage.validate().map_err(StorageError::Config)?;
    signing.validate().map_err(StorageError::Config)?;

    let backend = FilesystemBackend::new(&storage.data_dir)
        .await?
        .with_key_bits(signing.key_bits)
        .with_package_extension(&storage.package_extension);
    Ok(Arc::new(backend))
}
