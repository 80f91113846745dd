//! Signer error types.

use thiserror::Error;

/// Signing and packaging errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    #[error("key parsing error: {0}")]
    KeyParsing(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("verification failed")]
    VerificationFailed,

    #[error("invalid signature format: {0}")]
    InvalidSignature(String),

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("archive has no manifest.json at its root")]
    ManifestMissing,

    #[error(transparent)]
    Manifest(#[from] cask_core::Error),

    #[error("archive entry escapes extraction root: {path}")]
    UnsafeArchive { path: String },

    #[error("archive exceeds unpack limits: {0}")]
    ArchiveTooLarge(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for SignerError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Archive(other.to_string()),
        }
    }
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
