//! Local filesystem storage backend.
//!
//! Layout under the data directory:
//!
//! ```text
//! keys/{app}.pem
//! repo/{app}/appId.txt
//! repo/{app}/{version}/{app}.{ext}
//! ```
//!
//! Every file is written to a dot-prefixed temporary name first and only
//! then placed at its final path, so readers never observe partial writes.
//! Listings ignore dot-prefixed entries.

use crate::error::{StorageError, StorageResult};
use crate::traits::{KeyStore, LoadedKey, VersionRepository};
use async_trait::async_trait;
use bytes::Bytes;
use cask_core::{AppId, AppName, PackageVersion};
use cask_signer::KeyPair;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const KEYS_DIR: &str = "keys";
const REPO_DIR: &str = "repo";
const IDENTITY_FILE: &str = "appId.txt";
const DEFAULT_KEY_BITS: usize = 2048;
const DEFAULT_PACKAGE_EXTENSION: &str = "crx";

/// Permissions applied to newly written files.
#[derive(Clone, Copy, Debug)]
enum FileMode {
    /// Served content and identity records.
    Public,
    /// Private keys.
    Private,
}

impl FileMode {
    #[cfg(unix)]
    fn bits(self) -> u32 {
        match self {
            Self::Public => 0o644,
            Self::Private => 0o600,
        }
    }
}

/// Filesystem-backed key store and version repository.
pub struct FilesystemBackend {
    root: PathBuf,
    key_bits: usize,
    package_extension: String,
    keys: DashMap<AppName, Arc<KeyPair>>,
    key_locks: DashMap<AppName, Arc<Mutex<()>>>,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [root.join(KEYS_DIR), root.join(REPO_DIR)] {
            fs::create_dir_all(&dir).await.map_err(StorageError::io(&dir))?;
        }
        Ok(Self {
            root,
            key_bits: DEFAULT_KEY_BITS,
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            keys: DashMap::new(),
            key_locks: DashMap::new(),
        })
    }

    /// Set the modulus size used for newly generated keys.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the file extension of stored packages.
    pub fn with_package_extension(mut self, extension: &str) -> Self {
        self.package_extension = extension.to_string();
        self
    }

    /// The data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the package file for `(app, version)`.
    pub fn package_path(&self, app: &AppName, version: &PackageVersion) -> PathBuf {
        self.version_dir(app, version)
            .join(app.package_file_name(&self.package_extension))
    }

    fn key_path(&self, app: &AppName) -> PathBuf {
        self.root.join(KEYS_DIR).join(format!("{app}.pem"))
    }

    fn repo_dir(&self) -> PathBuf {
        self.root.join(REPO_DIR)
    }

    fn app_dir(&self, app: &AppName) -> PathBuf {
        self.repo_dir().join(app.as_str())
    }

    fn version_dir(&self, app: &AppName, version: &PackageVersion) -> PathBuf {
        self.app_dir(app).join(version.to_string())
    }

    fn identity_path(&self, app: &AppName) -> PathBuf {
        self.app_dir(app).join(IDENTITY_FILE)
    }

    fn cached_key(&self, app: &AppName) -> Option<Arc<KeyPair>> {
        self.keys.get(app).map(|entry| Arc::clone(entry.value()))
    }

    async fn load_key(&self, app: &AppName, path: &Path) -> StorageResult<Option<KeyPair>> {
        let pem = match fs::read_to_string(path).await {
            Ok(pem) => pem,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path)(e)),
        };
        let keypair = KeyPair::from_pem(&pem).map_err(|source| StorageError::Key {
            app: app.clone(),
            source,
        })?;
        Ok(Some(keypair))
    }

    async fn generate_key(&self, app: &AppName) -> StorageResult<KeyPair> {
        let bits = self.key_bits;
        tokio::task::spawn_blocking(move || KeyPair::generate(bits))
            .await
            .map_err(|e| StorageError::Task(format!("key generation task failed: {e}")))?
            .map_err(|source| StorageError::Key {
                app: app.clone(),
                source,
            })
    }

    async fn stage_package(
        &self,
        staging: &Path,
        app: &AppName,
        package: &[u8],
    ) -> StorageResult<()> {
        fs::create_dir(staging)
            .await
            .map_err(StorageError::io(staging))?;
        let path = staging.join(app.package_file_name(&self.package_extension));
        write_synced(&path, package, FileMode::Public).await
    }
}

#[async_trait]
impl KeyStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem", app = %app))]
    async fn get_or_create_key(&self, app: &AppName) -> StorageResult<LoadedKey> {
        if let Some(keypair) = self.cached_key(app) {
            return Ok(LoadedKey {
                keypair,
                generated: false,
            });
        }

        let lock = Arc::clone(self.key_locks.entry(app.clone()).or_default().value());
        let _guard = lock.lock().await;

        if let Some(keypair) = self.cached_key(app) {
            return Ok(LoadedKey {
                keypair,
                generated: false,
            });
        }

        let path = self.key_path(app);
        let (keypair, generated) = match self.load_key(app, &path).await? {
            Some(keypair) => (keypair, false),
            None => {
                let fresh = self.generate_key(app).await?;
                let pem = fresh.to_pem().map_err(|source| StorageError::Key {
                    app: app.clone(),
                    source,
                })?;
                if write_new_file(&path, pem.as_bytes(), FileMode::Private).await? {
                    info!(
                        public_key = ?fresh.public,
                        bits = self.key_bits,
                        "generated signing key"
                    );
                    (fresh, true)
                } else {
                    // Another process placed the key first.
                    let winner = self
                        .load_key(app, &path)
                        .await?
                        .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
                    (winner, false)
                }
            }
        };

        let keypair = Arc::new(keypair);
        self.keys.insert(app.clone(), Arc::clone(&keypair));
        Ok(LoadedKey { keypair, generated })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[async_trait]
impl VersionRepository for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list_apps(&self) -> StorageResult<Vec<AppName>> {
        let repo = self.repo_dir();
        let mut apps = Vec::new();
        for (name, is_dir) in list_entries(&repo).await? {
            if !is_dir {
                continue;
            }
            let app = AppName::parse(&name).map_err(|_| StorageError::CorruptEntry {
                app: name.clone(),
                entry: repo.join(&name).display().to_string(),
            })?;
            apps.push(app);
        }
        apps.sort();
        Ok(apps)
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app))]
    async fn list_versions(&self, app: &AppName) -> StorageResult<Vec<PackageVersion>> {
        let mut versions = Vec::new();
        for (name, is_dir) in list_entries(&self.app_dir(app)).await? {
            if !is_dir {
                continue;
            }
            let version = PackageVersion::parse(&name).map_err(|_| StorageError::CorruptEntry {
                app: app.to_string(),
                entry: name.clone(),
            })?;
            versions.push(version);
        }
        Ok(versions)
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app, version = %version))]
    async fn exists(&self, app: &AppName, version: &PackageVersion) -> StorageResult<bool> {
        let dir = self.version_dir(app, version);
        fs::try_exists(&dir).await.map_err(StorageError::io(&dir))
    }

    #[instrument(
        skip(self, package),
        fields(backend = "filesystem", app = %app, version = %version, size = package.len())
    )]
    async fn publish(
        &self,
        app: &AppName,
        version: &PackageVersion,
        package: Bytes,
    ) -> StorageResult<()> {
        let already_published = || StorageError::AlreadyPublished {
            app: app.clone(),
            version: version.clone(),
        };

        let app_dir = self.app_dir(app);
        fs::create_dir_all(&app_dir)
            .await
            .map_err(StorageError::io(&app_dir))?;

        let final_dir = self.version_dir(app, version);
        if fs::try_exists(&final_dir)
            .await
            .map_err(StorageError::io(&final_dir))?
        {
            return Err(already_published());
        }

        let staging = app_dir.join(format!(".{version}.tmp-{}", Uuid::new_v4()));
        if let Err(e) = self.stage_package(&staging, app, &package).await {
            discard(&staging).await;
            return Err(e);
        }

        // Renaming onto a populated directory fails, which makes placement the
        // authoritative collision check.
        match fs::rename(&staging, &final_dir).await {
            Ok(()) => {
                debug!(path = %final_dir.display(), "placed package");
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty
                ) =>
            {
                discard(&staging).await;
                Err(already_published())
            }
            Err(e) => {
                discard(&staging).await;
                Err(StorageError::io(&final_dir)(e))
            }
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app, version = %version))]
    async fn package_exists(
        &self,
        app: &AppName,
        version: &PackageVersion,
    ) -> StorageResult<bool> {
        let path = self.package_path(app, version);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path)(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app, version = %version))]
    async fn read_package(&self, app: &AppName, version: &PackageVersion) -> StorageResult<Bytes> {
        let path = self.package_path(app, version);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(format!("{app} {version}"))
            } else {
                StorageError::io(&path)(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    fn package_file_name(&self, app: &AppName) -> String {
        app.package_file_name(&self.package_extension)
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app, app_id = %id))]
    async fn store_identity(&self, app: &AppName, id: &AppId) -> StorageResult<()> {
        let check = |stored: AppId| {
            if &stored == id {
                Ok(())
            } else {
                Err(StorageError::IdentityMismatch {
                    app: app.clone(),
                    stored,
                    derived: id.clone(),
                })
            }
        };

        if let Some(stored) = self.load_identity(app).await? {
            return check(stored);
        }

        let app_dir = self.app_dir(app);
        fs::create_dir_all(&app_dir)
            .await
            .map_err(StorageError::io(&app_dir))?;

        let path = self.identity_path(app);
        if write_new_file(&path, id.as_str().as_bytes(), FileMode::Public).await? {
            debug!("recorded identity");
            return Ok(());
        }

        let stored = self
            .load_identity(app)
            .await?
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
        check(stored)
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app))]
    async fn load_identity(&self, app: &AppName) -> StorageResult<Option<AppId>> {
        let path = self.identity_path(app);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path)(e)),
        };
        let id = AppId::parse(raw.trim()).map_err(|_| StorageError::CorruptEntry {
            app: app.to_string(),
            entry: IDENTITY_FILE.to_string(),
        })?;
        Ok(Some(id))
    }

    #[instrument(skip(self), fields(backend = "filesystem", app = %app))]
    async fn discard_unpublished_identity(&self, app: &AppName) -> StorageResult<bool> {
        if !self.list_versions(app).await?.is_empty() {
            return Ok(false);
        }

        let path = self.identity_path(app);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::io(&path)(e)),
        }

        // An empty app directory would still be listed; a concurrent staging
        // directory keeps it alive.
        let app_dir = self.app_dir(app);
        if let Err(e) = fs::remove_dir(&app_dir).await {
            debug!(path = %app_dir.display(), error = %e, "kept application directory");
        }
        info!("withdrew identity record of unpublished application");
        Ok(true)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let repo = self.repo_dir();
        fs::metadata(&repo).await.map_err(StorageError::io(&repo))?;
        Ok(())
    }
}

/// List `(name, is_dir)` for the visible entries of `dir`.
///
/// A missing directory lists as empty. Symlinks are reported as neither
/// directories nor files and are therefore skipped by callers.
async fn list_entries(dir: &Path) -> StorageResult<Vec<(String, bool)>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(dir)(e)),
    };

    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(StorageError::io(dir))? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(StorageError::io(entry.path()))?;
        out.push((name, file_type.is_dir()));
    }
    Ok(out)
}

/// Write `data` to `path` and flush it to disk.
async fn write_synced(path: &Path, data: &[u8], mode: FileMode) -> StorageResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode.bits());
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).await.map_err(StorageError::io(path))?;
    file.write_all(data).await.map_err(StorageError::io(path))?;
    file.sync_all().await.map_err(StorageError::io(path))?;
    Ok(())
}

/// Create `path` with `data` unless it already exists.
///
/// The content is written to a temporary sibling and hard-linked into place,
/// so the final name appears fully written or not at all. Returns `false`
/// when another writer got there first.
async fn write_new_file(path: &Path, data: &[u8], mode: FileMode) -> StorageResult<bool> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{name}.tmp.{}", Uuid::new_v4()));

    let written = write_synced(&temp, data, mode).await;
    let linked = match written {
        Ok(()) => fs::hard_link(&temp, path).await,
        Err(e) => {
            remove_temp(&temp).await;
            return Err(e);
        }
    };
    remove_temp(&temp).await;

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StorageError::io(path)(e)),
    }
}

async fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove temporary file");
    }
}

async fn discard(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %dir.display(), error = %e, "failed to remove staging directory");
    }
}
