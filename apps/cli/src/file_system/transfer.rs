//! Uploads into and downloads out of the mounted tree.
//!
//! Plain chunked file I/O against the mount directory. Uploads are only allowed into an app's
//! Documents folder, and a device that refuses writes there is reported as such rather than
//! as a generic I/O error.

use filetime::FileTime;
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::mount::MountLifecycle;

/// Copy chunk size. Small enough for timely progress over the FUSE link.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Progress fires after this many chunks, and once more at the end.
const PROGRESS_EVERY_CHUNKS: u64 = 10;

/// Called with (bytes_copied_so_far, total_bytes).
pub type CopyProgressFn<'a> = &'a mut dyn FnMut(u64, u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TransferError {
    NotMounted,
    /// Uploads need an app's Documents folder mounted.
    DocumentsModeRequired,
    /// The device refuses writes into this app's Documents folder.
    WriteUnsupported { path: String },
    PermissionDenied { path: String, message: String },
    SourceNotFound { path: String },
    Io { path: String, message: String },
}

impl TransferError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotMounted => "iPhone not mounted.".to_string(),
            Self::DocumentsModeRequired => "To upload files, you need to mount in Documents mode.\n\n\
                 Please unmount first, then mount an app's Documents folder instead."
                .to_string(),
            Self::WriteUnsupported { .. } => "This iOS app's Documents folder doesn't support file uploads.\n\n\
                 Try a different app (Firefox and Chrome often work), or use the device's own file sharing."
                .to_string(),
            Self::PermissionDenied { path, .. } => format!(
                "Can't write {}. This may be due to iOS restrictions.\n\n\
                 Make sure an app's Documents folder is mounted and the device is unlocked.",
                path
            ),
            Self::SourceNotFound { path } => format!("Source file not found: {}", path),
            Self::Io { path, message } => format!("Transfer of {} failed: {}", path, message),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotMounted => write!(f, "Not mounted"),
            Self::DocumentsModeRequired => write!(f, "Documents mode required"),
            Self::WriteUnsupported { path } => write!(f, "Writing is not supported here: {path}"),
            Self::PermissionDenied { path, message } => write!(f, "Permission denied for {path}: {message}"),
            Self::SourceNotFound { path } => write!(f, "Source not found: {path}"),
            Self::Io { path, message } => write!(f, "I/O error on {path}: {message}"),
        }
    }
}

impl std::error::Error for TransferError {}

/// One file that `download_many` couldn't copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFailure {
    pub path: String,
    pub error: TransferError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    pub succeeded: usize,
    pub failures: Vec<DownloadFailure>,
}

impl DownloadSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

// ============================================================================
// Upload / download
// ============================================================================

/// Uploads `source` into the root of the mounted Documents folder. Returns the destination.
///
/// Rejected before anything is written unless an app's Documents folder is mounted.
pub fn upload(
    lifecycle: &mut MountLifecycle<'_>,
    source: &Path,
    on_progress: CopyProgressFn<'_>,
) -> Result<PathBuf, TransferError> {
    if !lifecycle.is_mounted() {
        return Err(TransferError::NotMounted);
    }
    if !lifecycle.current_mode_is_documents() {
        return Err(TransferError::DocumentsModeRequired);
    }
    if !source.is_file() {
        return Err(source_not_found(source));
    }
    let Some(file_name) = source.file_name() else {
        return Err(source_not_found(source));
    };

    let dest = lifecycle.mount_path().join(file_name);
    info!("Uploading {} to {}", source.display(), dest.display());
    let bytes = copy_file(source, &dest, on_progress)?;
    lifecycle.invalidate_listing();
    info!("Uploaded {} bytes to {}", bytes, dest.display());
    Ok(dest)
}

/// Copies one file out of the mount. If `dest` is a directory, the file keeps its name.
pub fn download(lifecycle: &MountLifecycle<'_>, relative: &str, dest: &Path) -> Result<PathBuf, TransferError> {
    if !lifecycle.is_mounted() {
        return Err(TransferError::NotMounted);
    }
    let source = resolve_source(lifecycle.mount_path(), relative)?;
    let dest = if dest.is_dir() {
        match source.file_name() {
            Some(name) => dest.join(name),
            None => return Err(source_not_found(&source)),
        }
    } else {
        dest.to_path_buf()
    };

    debug!("Downloading {} to {}", source.display(), dest.display());
    copy_file(&source, &dest, &mut |_, _| {})?;
    Ok(dest)
}

/// Downloads each selected path into `dest_dir`, carrying on past individual failures.
pub fn download_many(
    lifecycle: &MountLifecycle<'_>,
    relatives: &[String],
    dest_dir: &Path,
) -> Result<DownloadSummary, TransferError> {
    if !lifecycle.is_mounted() {
        return Err(TransferError::NotMounted);
    }
    if !dest_dir.is_dir() {
        return Err(TransferError::Io {
            path: dest_dir.display().to_string(),
            message: "Destination is not a directory".to_string(),
        });
    }

    let mut summary = DownloadSummary::default();
    for (index, relative) in relatives.iter().enumerate() {
        debug!("Downloading file {} of {}: {}", index + 1, relatives.len(), relative);
        match download(lifecycle, relative, dest_dir) {
            Ok(_) => summary.succeeded += 1,
            Err(error) => {
                warn!("Couldn't download {}: {}", relative, error);
                summary.failures.push(DownloadFailure {
                    path: relative.clone(),
                    error,
                });
            }
        }
    }
    info!(
        "Downloaded {} file(s) to {}, {} failed",
        summary.succeeded,
        dest_dir.display(),
        summary.failed()
    );
    Ok(summary)
}

/// Maps a listing entry to a regular file under the mount. Anything else, including paths
/// that climb out of the mount, is "not found".
fn resolve_source(mount_path: &Path, relative: &str) -> Result<PathBuf, TransferError> {
    let relative_path = Path::new(relative);
    let stays_inside = relative_path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    let source = mount_path.join(relative_path);
    if relative.trim().is_empty() || !stays_inside || !source.is_file() {
        return Err(source_not_found(&source));
    }
    Ok(source)
}

fn source_not_found(path: &Path) -> TransferError {
    TransferError::SourceNotFound {
        path: path.display().to_string(),
    }
}

// ============================================================================
// Chunked copy
// ============================================================================

/// Copies `source` to `dest` in [`CHUNK_SIZE`] chunks, then carries the modification time
/// over. A partially written destination is removed on failure.
pub fn copy_file(source: &Path, dest: &Path, on_progress: CopyProgressFn<'_>) -> Result<u64, TransferError> {
    let mut src_file = File::open(source).map_err(|e| read_error(source, e))?;
    let metadata = src_file.metadata().map_err(|e| read_error(source, e))?;
    let total = metadata.len();

    let mut dst_file = File::create(dest).map_err(|e| classify_write_error(dest, e))?;
    let result = copy_stream(&mut src_file, &mut dst_file, total, on_progress);
    drop(dst_file);

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(dest) {
                debug!("Couldn't remove partial file {}: {}", dest.display(), remove_err);
            }
            return Err(classify_write_error(dest, e));
        }
    };

    // Best effort, the device may not support setting times
    let mtime = FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_mtime(dest, mtime) {
        debug!("Couldn't preserve modification time on {}: {}", dest.display(), e);
    }
    Ok(bytes)
}

/// The copy loop. Progress fires every [`PROGRESS_EVERY_CHUNKS`] chunks and at the end.
pub fn copy_stream(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    total: u64,
    on_progress: CopyProgressFn<'_>,
) -> io::Result<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    let mut chunks: u64 = 0;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
        chunks += 1;
        if chunks % PROGRESS_EVERY_CHUNKS == 0 {
            on_progress(copied, total);
        }
    }
    writer.flush()?;
    on_progress(copied, total);
    Ok(copied)
}

/// True for the error a device returns when an app's Documents folder refuses writes.
pub fn is_write_unsupported(error: &io::Error) -> bool {
    #[cfg(unix)]
    if error.raw_os_error() == Some(libc::ENOSYS) {
        return true;
    }
    error.kind() == io::ErrorKind::Unsupported || error.to_string().to_lowercase().contains("function not implemented")
}

fn classify_write_error(path: &Path, error: io::Error) -> TransferError {
    let path = path.display().to_string();
    if is_write_unsupported(&error) {
        TransferError::WriteUnsupported { path }
    } else if error.kind() == io::ErrorKind::PermissionDenied {
        TransferError::PermissionDenied {
            path,
            message: error.to_string(),
        }
    } else {
        TransferError::Io {
            path,
            message: error.to_string(),
        }
    }
}

fn read_error(path: &Path, error: io::Error) -> TransferError {
    if error.kind() == io::ErrorKind::NotFound {
        return source_not_found(path);
    }
    TransferError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}
