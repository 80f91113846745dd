//! Archive extraction and deterministic repacking.

use crate::error::{SignerError, SignerResult};
use cask_core::{MANIFEST_FILE, Manifest};
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime as ZipDateTime, ZipArchive, ZipWriter};

/// Bounds applied while unpacking an uploaded archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Total decompressed bytes across all entries.
    pub max_unpacked_size: u64,
    /// Number of entries, directories included.
    pub max_entries: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_unpacked_size: 256 * 1024 * 1024,
            max_entries: 10_000,
        }
    }
}

/// Largest manifest [`read_manifest`] will decompress.
pub const MAX_MANIFEST_SIZE: u64 = 1024 * 1024;

/// Extract a zip archive held in memory into `dest`.
///
/// Every entry is checked before anything is written for it. An entry whose
/// path is absolute or climbs out of `dest` aborts extraction with
/// [`SignerError::UnsafeArchive`]; exceeding `limits` aborts it with
/// [`SignerError::ArchiveTooLarge`]. Returns the number of files written.
pub fn extract_to(archive: &[u8], dest: &Path, limits: &ExtractLimits) -> SignerResult<usize> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    if zip.len() > limits.max_entries {
        return Err(SignerError::ArchiveTooLarge(format!(
            "{} entries, limit is {}",
            zip.len(),
            limits.max_entries
        )));
    }

    let mut written = 0;
    let mut unpacked: u64 = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = entry_path(entry.name(), entry.enclosed_name())?;
        if relative.as_os_str().is_empty() {
            if entry.is_dir() {
                continue;
            }
            return Err(SignerError::UnsafeArchive {
                path: entry.name().to_string(),
            });
        }
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        let remaining = limits.max_unpacked_size - unpacked;
        let too_large = || {
            SignerError::ArchiveTooLarge(format!(
                "more than {} bytes unpacked",
                limits.max_unpacked_size
            ))
        };
        // The declared size is advisory; the copy below enforces the bound.
        if entry.size() > remaining {
            return Err(too_large());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        let copied = io::copy(&mut (&mut entry).take(remaining + 1), &mut out)?;
        if copied > remaining {
            return Err(too_large());
        }
        unpacked += copied;
        written += 1;
    }

    debug!(files = written, bytes = unpacked, dest = %dest.display(), "extracted archive");
    Ok(written)
}

/// Read the root manifest straight from an archive without extracting it.
///
/// Entry names are resolved the same way [`extract_to`] resolves them, so
/// `./manifest.json` is the root manifest too.
pub fn read_manifest(archive: &[u8]) -> SignerResult<Manifest> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = entry_path(entry.name(), entry.enclosed_name())?;
        if entry.is_dir() || relative != Path::new(MANIFEST_FILE) {
            continue;
        }

        let mut raw = Vec::new();
        (&mut entry).take(MAX_MANIFEST_SIZE + 1).read_to_end(&mut raw)?;
        if raw.len() as u64 > MAX_MANIFEST_SIZE {
            return Err(SignerError::ArchiveTooLarge(format!(
                "{MANIFEST_FILE} exceeds {MAX_MANIFEST_SIZE} bytes"
            )));
        }
        return Ok(Manifest::from_slice(&raw)?);
    }
    Err(SignerError::ManifestMissing)
}

/// Resolve an entry name to a path relative to the extraction root.
///
/// `.` components are dropped so equivalent spellings resolve alike.
fn entry_path(name: &str, enclosed: Option<PathBuf>) -> SignerResult<PathBuf> {
    validate_entry_path(Path::new(name))?;
    let enclosed = enclosed.ok_or_else(|| SignerError::UnsafeArchive {
        path: name.to_string(),
    })?;
    Ok(enclosed
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect())
}

/// Repack the directory tree at `root` into a zip archive.
///
/// The output depends only on the tree's paths and contents: entries are
/// written in sorted path order with a fixed timestamp and fixed permissions.
pub fn pack_dir(root: &Path) -> SignerResult<Vec<u8>> {
    let mut entries = Vec::new();
    collect_entries(root, root, &mut entries)?;

    let timestamp = zip_timestamp();
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(timestamp)
        .unix_permissions(0o644);
    let dir_options = SimpleFileOptions::default()
        .last_modified_time(timestamp)
        .unix_permissions(0o755);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in &entries {
        match entry {
            PackEntry::Dir(name) => writer.add_directory(name.as_str(), dir_options)?,
            PackEntry::File(name, path) => {
                writer.start_file(name.as_str(), file_options)?;
                writer.write_all(&fs::read(path)?)?;
            }
        }
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

enum PackEntry {
    Dir(String),
    File(String, PathBuf),
}

fn collect_entries(root: &Path, dir: &Path, out: &mut Vec<PackEntry>) -> SignerResult<()> {
    let mut children = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|child| child.file_name());

    for child in children {
        let path = child.path();
        let name = archive_name(root, &path)?;
        let file_type = child.file_type()?;
        if file_type.is_dir() {
            out.push(PackEntry::Dir(format!("{name}/")));
            collect_entries(root, &path, out)?;
        } else if file_type.is_file() {
            out.push(PackEntry::File(name, path));
        }
    }
    Ok(())
}

fn archive_name(root: &Path, path: &Path) -> SignerResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        SignerError::Archive(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str().map(str::to_owned).ok_or_else(|| {
                SignerError::Archive(format!("non UTF-8 path: {}", path.display()))
            }),
            _ => Err(SignerError::Archive(format!(
                "unexpected path component in {}",
                path.display()
            ))),
        })
        .collect::<SignerResult<Vec<_>>>()?;
    Ok(parts.join("/"))
}

fn validate_entry_path(path: &Path) -> SignerResult<()> {
    let unsafe_entry = || SignerError::UnsafeArchive {
        path: path.display().to_string(),
    };
    if path.is_absolute() {
        return Err(unsafe_entry());
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(unsafe_entry());
        }
    }
    Ok(())
}

fn zip_timestamp() -> ZipDateTime {
    ZipDateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).unwrap_or_default()
}
