//! The publish pipeline: key lookup, build, identity record, placement.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use bytes::Bytes;
use cask_core::config::AppConfig;
use cask_core::{AppId, AppName, Manifest, PackageVersion};
use cask_signer::archive::read_manifest;
use cask_signer::{ExtractLimits, PackageBuilder, derive_identity};
use cask_storage::{KeyStore, StorageError, VersionRepository};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Result of a successful publication.
#[derive(Debug)]
pub struct PublishOutcome {
    /// The manifest as stored in the package.
    pub manifest: Manifest,
    /// Published version.
    pub version: PackageVersion,
    /// Identity of the application.
    pub app_id: AppId,
    /// Whether this publication created the application's key.
    pub generated_key: bool,
}

/// Publishes uploaded extension archives into the repository.
pub struct Publisher {
    keys: Arc<dyn KeyStore>,
    repository: Arc<dyn VersionRepository>,
    builder: PackageBuilder,
    commit_locks: DashMap<AppName, Arc<Mutex<()>>>,
}

impl Publisher {
    /// Create a publisher that builds packages with `builder`.
    pub fn new(
        keys: Arc<dyn KeyStore>,
        repository: Arc<dyn VersionRepository>,
        builder: PackageBuilder,
    ) -> Self {
        Self {
            keys,
            repository,
            builder,
            commit_locks: DashMap::new(),
        }
    }

    /// Create a publisher pointing packages at the configured feed.
    pub fn from_config(
        config: &AppConfig,
        keys: Arc<dyn KeyStore>,
        repository: Arc<dyn VersionRepository>,
    ) -> Self {
        let limits = ExtractLimits {
            max_unpacked_size: config.server.unpacked_size_limit(),
            max_entries: config.server.max_archive_entries,
        };
        let builder = PackageBuilder::new(config.server.feed_url(), config.signing.algorithm)
            .with_limits(limits);
        Self::new(keys, repository, builder)
    }

    /// Feed location injected into published manifests.
    pub fn feed_url(&self) -> &str {
        self.builder.feed_url()
    }

    /// Publish `archive` as a new version of the application called `name`.
    ///
    /// Nothing is written to the repository unless the build succeeds. The
    /// final placement is the authoritative duplicate check; the early
    /// `exists` lookup only skips signing work for obvious re-uploads.
    #[instrument(skip(self, archive), fields(size = archive.len()))]
    pub async fn publish(&self, name: &str, archive: Bytes) -> ApiResult<PublishOutcome> {
        let started = Instant::now();
        let app = AppName::parse(name)?;

        let key = self.keys.get_or_create_key(&app).await?;
        if key.generated {
            metrics::KEYS_GENERATED.inc();
        }

        let declared = read_manifest(&archive)?.package_version()?;
        if self.repository.exists(&app, &declared).await? {
            return Err(StorageError::AlreadyPublished {
                app,
                version: declared,
            }
            .into());
        }

        let built = {
            let builder = self.builder.clone();
            let app = app.clone();
            let keypair = Arc::clone(&key.keypair);
            tokio::task::spawn_blocking(move || builder.build(&app, &archive, &keypair))
                .await
                .map_err(|e| ApiError::Internal(format!("package build task failed: {e}")))??
        };

        let app_id = derive_identity(&key.keypair.public)?;
        // Runs on its own task so a dropped request cannot stop between the
        // identity record and the placement.
        let commit = tokio::spawn(commit(
            Arc::clone(&self.repository),
            self.commit_lock(&app),
            app.clone(),
            app_id.clone(),
            built.version.clone(),
            Bytes::from(built.bytes),
        ));
        commit
            .await
            .map_err(|e| ApiError::Internal(format!("package commit task failed: {e}")))??;

        metrics::PACKAGES_PUBLISHED.inc();
        metrics::PUBLISH_DURATION.observe(started.elapsed().as_secs_f64());
        info!(%app, version = %built.version, %app_id, "published package");

        Ok(PublishOutcome {
            manifest: built.manifest,
            version: built.version,
            app_id,
            generated_key: key.generated,
        })
    }

    fn commit_lock(&self, app: &AppName) -> Arc<Mutex<()>> {
        Arc::clone(self.commit_locks.entry(app.clone()).or_default().value())
    }
}

/// Record the identity of `app` and place its package.
///
/// Commits for one application are serialized. When placement fails on the
/// first publish of an application, the identity record written here is
/// withdrawn again. Another process sharing the data directory can still see
/// the record before the first version lands.
async fn commit(
    repository: Arc<dyn VersionRepository>,
    lock: Arc<Mutex<()>>,
    app: AppName,
    app_id: AppId,
    version: PackageVersion,
    package: Bytes,
) -> ApiResult<()> {
    let _guard = lock.lock().await;

    let first_publish = repository.load_identity(&app).await?.is_none();
    repository.store_identity(&app, &app_id).await?;

    let Err(err) = repository.publish(&app, &version, package).await else {
        return Ok(());
    };
    if first_publish {
        match repository.discard_unpublished_identity(&app).await {
            Ok(true) => warn!(%app, %version, "placement failed, identity record withdrawn"),
            Ok(false) => {}
            Err(e) => warn!(%app, error = %e, "failed to withdraw identity record"),
        }
    }
    Err(err.into())
}
