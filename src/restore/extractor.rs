//! Archive extraction for restore
//!
//! Streams a `.tar.gz` object out of the bucket and unpacks it entry by
//! entry into the destination root:
//! - Directories are created with their archived mode
//! - Files are created or truncated with their archived mode, content copied verbatim
//! - The first read, decode or filesystem error aborts extraction
//!
//! Partially extracted entries are left on disk. Every reader, decoder and
//! file handle is owned by a scope and released on all exit paths.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::Serialize;
use tar::Archive;
use tokio_util::sync::CancellationToken;

use crate::store::{BlobStore, StoreError};

use super::errors::{RestoreError, RestoreResult};
use super::locator::BackupKey;

/// Permission bits kept from archived modes
const MODE_MASK: u32 = 0o7777;

/// What one extraction wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Fails reads once the run is cancelled
struct CancellableReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled.into_io());
        }
        self.inner.read(buf)
    }
}

/// Stream `key` from the store and unpack it into `destination`
pub fn extract_archive(
    store: &dyn BlobStore,
    key: &BackupKey,
    destination: &Path,
    cancel: &CancellationToken,
) -> RestoreResult<ExtractionSummary> {
    if cancel.is_cancelled() {
        return Err(RestoreError::cancelled("Restore cancelled before extraction"));
    }

    let reader = store.open_reader(key.as_str())?;

    fs::create_dir_all(destination).map_err(|e| {
        RestoreError::io_error(
            format!("Failed to create destination {}", destination.display()),
            e,
        )
    })?;

    tracing::info!(key = %key, destination = %destination.display(), "extracting archive");
    let summary = unpack_archive(reader, destination, cancel)?;
    tracing::info!(
        key = %key,
        directories = summary.directories,
        files = summary.files,
        bytes = summary.bytes,
        "archive extracted"
    );

    Ok(summary)
}

/// Unpack a gzip-compressed tar stream into `destination`
///
/// Concatenated gzip members, as written by parallel compressors, decode as
/// one stream.
pub fn unpack_archive<R: Read>(
    reader: R,
    destination: &Path,
    cancel: &CancellationToken,
) -> RestoreResult<ExtractionSummary> {
    let decoder = MultiGzDecoder::new(CancellableReader {
        inner: reader,
        cancel: cancel.clone(),
    });
    let mut archive = Archive::new(decoder);
    let mut summary = ExtractionSummary::default();

    let entries = archive
        .entries()
        .map_err(|e| archive_error(cancel, "Failed to read backup archive", e))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| archive_error(cancel, "Failed to read backup archive entry", e))?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }

        let relative = entry
            .path()
            .map_err(|e| archive_error(cancel, "Invalid archive entry path", e))?
            .into_owned();
        let target = resolve_entry_path(destination, &relative)?;
        let mode = entry
            .header()
            .mode()
            .map_err(|e| archive_error(cancel, "Invalid archive entry mode", e))?
            & MODE_MASK;

        if entry_type.is_dir() {
            create_directory(&target, mode)?;
            summary.directories += 1;
        } else {
            summary.bytes += write_file(&target, mode, &mut entry, cancel)?;
            summary.files += 1;
        }
    }

    Ok(summary)
}

/// Join an entry path onto the destination, refusing paths that leave it
fn resolve_entry_path(destination: &Path, relative: &Path) -> RestoreResult<PathBuf> {
    let mut target = destination.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(RestoreError::io_error(
                    format!(
                        "Archive entry {} escapes the destination",
                        relative.display()
                    ),
                    io::Error::new(io::ErrorKind::InvalidData, "unsafe entry path"),
                ));
            }
        }
    }
    Ok(target)
}

fn create_directory(target: &Path, mode: u32) -> RestoreResult<()> {
    // Like mkdir -p, an existing directory keeps its mode.
    let existed = target.is_dir();

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    builder
        .create(target)
        .map_err(|e| RestoreError::io_error_at_path(target, e))?;

    if !existed {
        set_mode(target, mode)?;
    }
    Ok(())
}

fn write_file<R: Read>(
    target: &Path,
    mode: u32,
    content: &mut R,
    cancel: &CancellationToken,
) -> RestoreResult<u64> {
    if let Some(parent) = target.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RestoreError::io_error_at_path(parent, e))?;
        }
    }

    let mut file =
        open_truncated(target, mode).map_err(|e| RestoreError::io_error_at_path(target, e))?;
    let written = io::copy(content, &mut file).map_err(|e| {
        archive_error(
            cancel,
            &format!("Failed to write {}", target.display()),
            e,
        )
    })?;
    drop(file);

    set_mode(target, mode)?;
    Ok(written)
}

fn open_truncated(target: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(target)
}

/// Apply the archived mode regardless of the process umask
#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> RestoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| RestoreError::io_error_at_path(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> RestoreResult<()> {
    Ok(())
}

fn archive_error(cancel: &CancellationToken, context: &str, e: io::Error) -> RestoreError {
    if cancel.is_cancelled() {
        return RestoreError::cancelled(format!("{}: restore cancelled", context));
    }
    RestoreError::io_error(context, e)
}
