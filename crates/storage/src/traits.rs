//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use cask_core::{AppId, AppName, PackageVersion, version};
use cask_signer::KeyPair;
use std::sync::Arc;

/// A signing key handed out by a [`KeyStore`].
#[derive(Clone, Debug)]
pub struct LoadedKey {
    /// The application's key pair.
    pub keypair: Arc<KeyPair>,
    /// Whether this call generated the key.
    pub generated: bool,
}

/// Per-application signing key storage.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Load the key for `app`, generating and persisting one if none exists.
    ///
    /// Concurrent first calls for the same application all receive the same
    /// key; exactly one of them reports `generated`.
    async fn get_or_create_key(&self, app: &AppName) -> StorageResult<LoadedKey>;

    /// Get the backend name (for logging/metrics).
    fn backend_name(&self) -> &'static str;
}

/// Write-once store of published packages.
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// List every application that has a repository entry.
    async fn list_apps(&self) -> StorageResult<Vec<AppName>>;

    /// List the published versions of `app`, unordered.
    ///
    /// An entry whose name is not a valid version is an error, not skipped.
    async fn list_versions(&self, app: &AppName) -> StorageResult<Vec<PackageVersion>>;

    /// The highest published version of `app` by semantic-version ordering.
    async fn latest_version(&self, app: &AppName) -> StorageResult<Option<PackageVersion>> {
        let versions = self.list_versions(app).await?;
        Ok(version::latest(&versions).cloned())
    }

    /// Check whether `version` of `app` has been published.
    async fn exists(&self, app: &AppName, version: &PackageVersion) -> StorageResult<bool>;

    /// Publish package bytes for `(app, version)`.
    ///
    /// Fails with `AlreadyPublished` if the version exists, including when a
    /// concurrent publish of the same version wins the race. The package
    /// never becomes visible half-written.
    async fn publish(
        &self,
        app: &AppName,
        version: &PackageVersion,
        package: Bytes,
    ) -> StorageResult<()>;

    /// Check whether the package file for `(app, version)` is present.
    async fn package_exists(&self, app: &AppName, version: &PackageVersion)
    -> StorageResult<bool>;

    /// Read the package bytes for `(app, version)`.
    async fn read_package(&self, app: &AppName, version: &PackageVersion) -> StorageResult<Bytes>;

    /// Canonical package file name for `app`.
    fn package_file_name(&self, app: &AppName) -> String;

    /// Record the identity of `app`.
    ///
    /// Storing the identity already on record is a no-op; storing a different
    /// one fails with `IdentityMismatch`.
    async fn store_identity(&self, app: &AppName, id: &AppId) -> StorageResult<()>;

    /// Load the recorded identity of `app`.
    async fn load_identity(&self, app: &AppName) -> StorageResult<Option<AppId>>;

    /// Withdraw the identity record of `app` while it has no published
    /// versions, so a failed first publish leaves no feed entry behind.
    ///
    /// Returns whether a record was removed. Does nothing once any version
    /// exists.
    async fn discard_unpublished_identity(&self, app: &AppName) -> StorageResult<bool>;

    /// Health check for the backend.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
