use cask_core::{AppName, PackageVersion};
use cask_storage::FilesystemBackend;
use std::sync::Arc;
use tempfile::TempDir;

/// Backend rooted in `temp` with small keys for fast generation.
pub async fn backend(temp: &TempDir) -> Arc<FilesystemBackend> {
    Arc::new(
        FilesystemBackend::new(temp.path())
            .await
            .unwrap()
            .with_key_bits(1024),
    )
}

pub fn app(name: &str) -> AppName {
    AppName::parse(name).unwrap()
}

pub fn version(s: &str) -> PackageVersion {
    PackageVersion::parse(s).unwrap()
}
