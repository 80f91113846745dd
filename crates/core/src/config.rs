//! Configuration types shared across crates.

use crate::app::AppName;
use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum accepted RSA modulus size.
pub const MIN_KEY_BITS: usize = 1024;

/// Maximum accepted RSA modulus size.
pub const MAX_KEY_BITS: usize = 8192;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Absolute base URL under which clients reach this service.
    /// Defaults to `http://{bind}/`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Maximum accepted upload body in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    /// Maximum total size an uploaded archive may unpack to, in bytes.
    /// Defaults to four times `max_upload_size`.
    #[serde(default)]
    pub max_unpacked_size: Option<u64>,
    /// Maximum number of entries in an uploaded archive.
    #[serde(default = "default_max_archive_entries")]
    pub max_archive_entries: usize,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_size() -> usize {
    64 * 1024 * 1024
}

fn default_max_archive_entries() -> usize {
    10_000
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: None,
            max_upload_size: default_max_upload_size(),
            max_unpacked_size: None,
            max_archive_entries: default_max_archive_entries(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// The base URL with a guaranteed trailing slash.
    pub fn base_url(&self) -> String {
        let mut base = self
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/", self.bind));
        if !base.ends_with('/') {
            base.push('/');
        }
        base
    }

    /// URL of the update feed, written into every published manifest.
    pub fn feed_url(&self) -> String {
        format!("{}updates.xml", self.base_url())
    }

    /// Effective bound on the unpacked size of an upload.
    pub fn unpacked_size_limit(&self) -> u64 {
        self.max_unpacked_size
            .unwrap_or_else(|| (self.max_upload_size as u64).saturating_mul(4))
    }

    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_archive_entries == 0 {
            return Err("server.max_archive_entries must be at least 1".to_string());
        }
        let base = self.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(format!(
                "server.public_base_url must be an absolute http(s) URL, got {base}"
            ));
        }
        if base.contains(char::is_whitespace) {
            return Err(format!(
                "server.public_base_url contains whitespace: {base:?}"
            ));
        }
        Ok(())
    }
}

/// Repository storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the persisted state (`keys/` and `repo/` live below it).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File extension of stored packages.
    #[serde(default = "default_package_extension")]
    pub package_extension: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_package_extension() -> String {
    "crx".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            package_extension: default_package_extension(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        let ext = &self.package_extension;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!(
                "storage.package_extension must be non-empty ASCII alphanumerics, got {ext:?}"
            ));
        }
        Ok(())
    }
}

/// Signature scheme applied to package contents.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-1, the scheme CRX2 clients verify.
    #[default]
    RsaSha1,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    RsaSha256,
}

/// Signing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// RSA modulus size for newly generated application keys.
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
    /// Signature scheme for package contents.
    #[serde(default)]
    pub algorithm: SignatureAlgorithm,
}

fn default_key_bits() -> usize {
    2048
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_bits: default_key_bits(),
            algorithm: SignatureAlgorithm::default(),
        }
    }
}

impl SigningConfig {
    /// Validate signing configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.key_bits) {
            return Err(format!(
                "signing.key_bits must be between {MIN_KEY_BITS} and {MAX_KEY_BITS}, got {}",
                self.key_bits
            ));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Signing configuration.
    #[serde(default)]
    pub signing: SigningConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at `data_dir`.
    ///
    /// **For testing only.** Uses 1024-bit keys so key generation stays fast.
    pub fn for_testing(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig {
                public_base_url: Some("http://repo.test/".to_string()),
                ..ServerConfig::default()
            },
            storage: StorageConfig {
                data_dir: data_dir.into(),
                ..StorageConfig::default()
            },
            signing: SigningConfig {
                key_bits: MIN_KEY_BITS,
                ..SigningConfig::default()
            },
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.signing.validate()
    }

    /// Absolute download URL of a published package.
    pub fn package_url(&self, app: &AppName, version: &PackageVersion) -> String {
        format!(
            "{}repo/{app}/{version}/{}",
            self.server.base_url(),
            app.package_file_name(&self.storage.package_extension)
        )
    }
}
