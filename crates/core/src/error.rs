//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid application name: {0}")]
    InvalidAppName(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid app id: {0}")]
    InvalidAppId(String),

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("manifest is missing required field: {0}")]
    ManifestMissingField(&'static str),

    #[error("manifest already declares an update feed: {existing}")]
    ConflictingFeed { existing: String },

    #[error("feed rendering error: {0}")]
    Feed(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
