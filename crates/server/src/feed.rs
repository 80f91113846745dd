//! Update feed generation.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use cask_core::config::AppConfig;
use cask_core::{AppName, FeedDocument, FeedEntry};
use cask_storage::VersionRepository;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds the update feed from the repository contents.
pub struct UpdateFeedGenerator {
    repository: Arc<dyn VersionRepository>,
    config: Arc<AppConfig>,
}

impl UpdateFeedGenerator {
    /// Create a generator over `repository`.
    pub fn new(repository: Arc<dyn VersionRepository>, config: Arc<AppConfig>) -> Self {
        Self { repository, config }
    }

    /// Generate the feed document.
    ///
    /// Fails as a whole if any application lacks a published version, the
    /// package file of its latest version or its identity record.
    #[instrument(skip(self))]
    pub async fn generate(&self) -> ApiResult<FeedDocument> {
        let result = self.collect().await;
        metrics::record_feed_generation(result.is_ok());
        result
    }

    /// Generate the feed and render it as XML.
    pub async fn render(&self) -> ApiResult<String> {
        Ok(self.generate().await?.to_xml()?)
    }

    async fn collect(&self) -> ApiResult<FeedDocument> {
        let mut feed = FeedDocument::new();

        for app in self.repository.list_apps().await? {
            let version = self
                .repository
                .latest_version(&app)
                .await?
                .ok_or_else(|| inconsistency(&app, "no published versions".to_string()))?;

            if !self.repository.package_exists(&app, &version).await? {
                return Err(inconsistency(
                    &app,
                    format!(
                        "version {version} has no package file {}",
                        self.repository.package_file_name(&app)
                    ),
                ));
            }

            let app_id = self
                .repository
                .load_identity(&app)
                .await?
                .ok_or_else(|| inconsistency(&app, "no identity record".to_string()))?;

            feed.push(FeedEntry {
                app_id,
                codebase: self.config.package_url(&app, &version),
                version,
            });
        }

        debug!(entries = feed.entries.len(), "generated update feed");
        Ok(feed)
    }
}

fn inconsistency(app: &AppName, detail: String) -> ApiError {
    ApiError::RepositoryInconsistency {
        app: app.clone(),
        detail,
    }
}
