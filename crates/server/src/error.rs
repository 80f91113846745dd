//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cask_core::AppName;
use cask_signer::SignerError;
use cask_storage::StorageError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("repository inconsistent for {app}: {detail}")]
    RepositoryInconsistency { app: AppName, detail: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] cask_core::Error),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::RepositoryInconsistency { .. } => "repository_inconsistency",
            Self::Internal(_) => "internal_error",
            Self::Core(e) => core_code(e),
            Self::Signer(e) => match e {
                SignerError::ManifestMissing => "manifest_missing",
                SignerError::Manifest(e) => core_code(e),
                SignerError::UnsafeArchive { .. } => "unsafe_archive",
                SignerError::ArchiveTooLarge(_) => "archive_too_large",
                SignerError::Archive(_) | SignerError::InvalidPackage(_) => "invalid_archive",
                SignerError::Io(_) => "io_error",
                SignerError::KeyGeneration(_)
                | SignerError::KeyParsing(_)
                | SignerError::Signing(_)
                | SignerError::VerificationFailed
                | SignerError::InvalidSignature(_) => "crypto_error",
            },
            Self::Storage(e) => match e {
                StorageError::AlreadyPublished { .. } => "already_published",
                StorageError::IdentityMismatch { .. } => "identity_mismatch",
                StorageError::CorruptEntry { .. } => "repository_inconsistency",
                StorageError::NotFound(_) => "not_found",
                StorageError::Key { .. } => "crypto_error",
                StorageError::Io { .. } => "io_error",
                StorageError::Config(_) | StorageError::Task(_) => "storage_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RepositoryInconsistency { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Core(e) => core_status(e),
            Self::Signer(e) => match e {
                SignerError::ManifestMissing => StatusCode::UNPROCESSABLE_ENTITY,
                SignerError::Manifest(e) => core_status(e),
                SignerError::ArchiveTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                SignerError::UnsafeArchive { .. }
                | SignerError::Archive(_)
                | SignerError::InvalidPackage(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(e) => match e {
                StorageError::AlreadyPublished { .. } => StatusCode::CONFLICT,
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

fn core_code(e: &cask_core::Error) -> &'static str {
    use cask_core::Error;
    match e {
        Error::InvalidAppName(_) => "invalid_name",
        Error::InvalidVersion(_) => "invalid_version",
        Error::InvalidAppId(_) => "invalid_app_id",
        Error::ManifestParse(_) | Error::ManifestMissingField(_) => "manifest_invalid",
        Error::ConflictingFeed { .. } => "conflicting_feed",
        Error::Feed(_) => "feed_error",
    }
}

fn core_status(e: &cask_core::Error) -> StatusCode {
    use cask_core::Error;
    match e {
        Error::InvalidAppName(_) => StatusCode::BAD_REQUEST,
        Error::InvalidVersion(_) | Error::ManifestParse(_) | Error::ManifestMissingField(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Error::ConflictingFeed { .. } => StatusCode::CONFLICT,
        Error::InvalidAppId(_) | Error::Feed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
