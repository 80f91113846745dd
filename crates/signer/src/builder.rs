//! Package building: unpack, rewrite the manifest, repack and sign.

use crate::archive::{ExtractLimits, extract_to, pack_dir};
use crate::container::SignedPackage;
use crate::error::{SignerError, SignerResult};
use crate::key::KeyPair;
use crate::signer::sign_content;
use cask_core::config::SignatureAlgorithm;
use cask_core::{AppId, AppName, MANIFEST_FILE, Manifest, PackageVersion};
use std::fs;
use std::io;
use tracing::{debug, instrument};

/// Output of a successful build.
#[derive(Debug)]
pub struct BuiltPackage {
    /// The rewritten manifest, including the injected feed location.
    pub manifest: Manifest,
    /// Version declared by the manifest.
    pub version: PackageVersion,
    /// Identity of the signing key.
    pub app_id: AppId,
    /// The signed container.
    pub package: SignedPackage,
    /// Encoded container bytes.
    pub bytes: Vec<u8>,
}

/// Turns an uploaded extension archive into a signed package.
///
/// Building is CPU and disk bound; async callers should run it on a
/// blocking thread.
#[derive(Clone, Debug)]
pub struct PackageBuilder {
    feed_url: String,
    algorithm: SignatureAlgorithm,
    limits: ExtractLimits,
}

impl PackageBuilder {
    /// Create a builder that points packages at `feed_url`.
    pub fn new(feed_url: impl Into<String>, algorithm: SignatureAlgorithm) -> Self {
        Self {
            feed_url: feed_url.into(),
            algorithm,
            limits: ExtractLimits::default(),
        }
    }

    /// Bound how much an uploaded archive may unpack to.
    pub fn with_limits(mut self, limits: ExtractLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Unpack limits applied to uploaded archives.
    pub fn limits(&self) -> &ExtractLimits {
        &self.limits
    }

    /// The feed location injected into every manifest.
    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Signature scheme used for package contents.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Build a signed package for `app` from a zip archive.
    ///
    /// The archive is unpacked into a private scratch directory that is
    /// removed however this returns.
    #[instrument(skip(self, archive, key), fields(app = %app, archive_len = archive.len()))]
    pub fn build(
        &self,
        app: &AppName,
        archive: &[u8],
        key: &KeyPair,
    ) -> SignerResult<BuiltPackage> {
        let workdir = tempfile::Builder::new()
            .prefix(&format!("cask-build-{app}-"))
            .tempdir()?;
        extract_to(archive, workdir.path(), &self.limits)?;

        let manifest_path = workdir.path().join(MANIFEST_FILE);
        let raw = match fs::read(&manifest_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SignerError::ManifestMissing);
            }
            Err(e) => return Err(e.into()),
        };

        let mut manifest = Manifest::from_slice(&raw)?;
        let version = manifest.package_version()?;
        manifest.set_update_url(&self.feed_url)?;
        fs::write(&manifest_path, manifest.to_vec_pretty()?)?;

        let content = pack_dir(workdir.path())?;
        let signature = sign_content(&key.secret, self.algorithm, &content)?;
        let package = SignedPackage::new(key.public.to_der()?, signature, content);
        let bytes = package.encode()?;
        let app_id = package.app_id();

        debug!(%app_id, %version, size = bytes.len(), "built signed package");

        Ok(BuiltPackage {
            manifest,
            version,
            app_id,
            package,
            bytes,
        })
    }
}
