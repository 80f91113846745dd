//! Application state shared across handlers.

use crate::feed::UpdateFeedGenerator;
use crate::publish::Publisher;
use cask_core::config::AppConfig;
use cask_storage::{KeyStore, VersionRepository};
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Package repository.
    pub repository: Arc<dyn VersionRepository>,
    /// Upload pipeline.
    pub publisher: Arc<Publisher>,
    /// Feed generator.
    pub feed: Arc<UpdateFeedGenerator>,
}

impl AppState {
    /// Create a new application state over separate key and package stores.
    pub fn new(
        config: AppConfig,
        keys: Arc<dyn KeyStore>,
        repository: Arc<dyn VersionRepository>,
    ) -> Self {
        let config = Arc::new(config);
        let publisher = Arc::new(Publisher::from_config(&config, keys, repository.clone()));
        let feed = Arc::new(UpdateFeedGenerator::new(repository.clone(), config.clone()));
        Self {
            config,
            repository,
            publisher,
            feed,
        }
    }

    /// Create state over a backend that stores both keys and packages.
    pub fn with_backend<B>(config: AppConfig, backend: Arc<B>) -> Self
    where
        B: KeyStore + VersionRepository + 'static,
    {
        let keys: Arc<dyn KeyStore> = backend.clone();
        let repository: Arc<dyn VersionRepository> = backend;
        Self::new(config, keys, repository)
    }
}
