//! Tests for uploads, downloads and the chunked copy.

use super::transfer::*;
use crate::config::Config;
use crate::mount::MountLifecycle;
use crate::mount::mock_host::MockHost;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MEDIA_LINE: &str = "ifuse on /home/user/iPhoneMount type fuse.ifuse (rw,nosuid,nodev)";
const DOCUMENTS_LINE: &str = "ifuse on /home/user/iPhoneMount type fuse.ifuse (rw,nosuid,nodev,documents)";

/// A mount directory in a temp dir, with the mock reporting it mounted via `line`.
fn mounted(root: &Path, line: Option<&str>) -> (Config, MockHost) {
    let config = Config {
        mount_path: root.join("iPhoneMount"),
        ..Config::default()
    };
    fs::create_dir_all(&config.mount_path).unwrap();
    let host = MockHost::new();
    if let Some(line) = line {
        host.set_mounted(line);
    }
    (config, host)
}

fn write_source(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    fs::write(&path, data).unwrap();
    path
}

// ============================================================================
// Upload
// ============================================================================

#[test]
fn test_upload_into_documents_folder() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(DOCUMENTS_LINE));
    let mut lifecycle = MountLifecycle::new(&config, &host, &host);
    let source = write_source(dir.path(), "report.pdf", 700 * 1024);

    let mut progress = Vec::new();
    let dest = upload(&mut lifecycle, &source, &mut |copied, total| progress.push((copied, total))).unwrap();

    assert_eq!(dest, config.mount_path.join("report.pdf"));
    assert_eq!(fs::read(&dest).unwrap(), fs::read(&source).unwrap());
    // 11 chunks: once after the tenth, once at the end
    let total = 700 * 1024;
    assert_eq!(progress, vec![(10 * CHUNK_SIZE as u64, total), (total, total)]);
}

#[test]
fn test_upload_in_media_mode_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(MEDIA_LINE));
    let mut lifecycle = MountLifecycle::new(&config, &host, &host);
    let source = write_source(dir.path(), "photo.jpg", 10);

    let result = upload(&mut lifecycle, &source, &mut |_, _| {});

    assert_eq!(result, Err(TransferError::DocumentsModeRequired));
    assert!(!config.mount_path.join("photo.jpg").exists());
}

#[test]
fn test_upload_requires_mount() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), None);
    let mut lifecycle = MountLifecycle::new(&config, &host, &host);
    let source = write_source(dir.path(), "photo.jpg", 10);

    assert_eq!(
        upload(&mut lifecycle, &source, &mut |_, _| {}),
        Err(TransferError::NotMounted)
    );
}

#[test]
fn test_upload_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(DOCUMENTS_LINE));
    let mut lifecycle = MountLifecycle::new(&config, &host, &host);

    let result = upload(&mut lifecycle, &dir.path().join("nope.txt"), &mut |_, _| {});
    assert!(matches!(result, Err(TransferError::SourceNotFound { .. })));
}

// ============================================================================
// Download
// ============================================================================

#[test]
fn test_download_keeps_name_and_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(MEDIA_LINE));
    let lifecycle = MountLifecycle::new(&config, &host, &host);
    fs::create_dir_all(config.mount_path.join("DCIM/100APPLE")).unwrap();
    let source = write_source(&config.mount_path.join("DCIM/100APPLE"), "IMG_0001.JPG", 1000);
    let mtime = filetime::FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&source, mtime).unwrap();
    let dest_dir = dir.path().join("out");
    fs::create_dir_all(&dest_dir).unwrap();

    let dest = download(&lifecycle, "DCIM/100APPLE/IMG_0001.JPG", &dest_dir).unwrap();

    assert_eq!(dest, dest_dir.join("IMG_0001.JPG"));
    assert_eq!(fs::read(&dest).unwrap(), fs::read(&source).unwrap());
    let copied = filetime::FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
    assert_eq!(copied, mtime);
}

#[test]
fn test_download_rejects_paths_outside_the_mount() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(MEDIA_LINE));
    let lifecycle = MountLifecycle::new(&config, &host, &host);
    write_source(dir.path(), "secret.txt", 5);

    let result = download(&lifecycle, "../secret.txt", dir.path());
    assert!(matches!(result, Err(TransferError::SourceNotFound { .. })));
}

#[test]
fn test_download_many_continues_past_failures() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(MEDIA_LINE));
    let lifecycle = MountLifecycle::new(&config, &host, &host);
    write_source(&config.mount_path, "a.jpg", 10);
    write_source(&config.mount_path, "b.jpg", 10);
    fs::create_dir_all(config.mount_path.join("DCIM")).unwrap();
    let dest_dir = dir.path().join("out");
    fs::create_dir_all(&dest_dir).unwrap();

    let selection = vec![
        "a.jpg".to_string(),
        "missing.jpg".to_string(),
        "DCIM".to_string(),
        "b.jpg".to_string(),
    ];
    let summary = download_many(&lifecycle, &selection, &dest_dir).unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.failures[0].path, "missing.jpg");
    assert!(matches!(summary.failures[1].error, TransferError::SourceNotFound { .. }));
    assert!(dest_dir.join("a.jpg").exists());
    assert!(dest_dir.join("b.jpg").exists());
}

#[test]
fn test_download_many_requires_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (config, host) = mounted(dir.path(), Some(MEDIA_LINE));
    let lifecycle = MountLifecycle::new(&config, &host, &host);

    let result = download_many(&lifecycle, &["a.jpg".to_string()], &dir.path().join("missing"));
    assert!(matches!(result, Err(TransferError::Io { .. })));
}

// ============================================================================
// Chunked copy and error classification
// ============================================================================

/// Accepts `limit` bytes, then fails with the given error.
struct FailingWriter {
    written: usize,
    limit: usize,
    error: fn() -> io::Error,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.limit {
            return Err((self.error)());
        }
        let n = buf.len().min(self.limit - self.written);
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_copy_stream_reports_progress_at_end_for_small_files() {
    let data = vec![7u8; 1000];
    let mut out = Vec::new();
    let mut progress = Vec::new();

    let copied = copy_stream(&mut data.as_slice(), &mut out, 1000, &mut |c, t| progress.push((c, t))).unwrap();

    assert_eq!(copied, 1000);
    assert_eq!(out, data);
    assert_eq!(progress, vec![(1000, 1000)]);
}

#[test]
fn test_copy_stream_surfaces_write_failure() {
    let data = vec![1u8; 3 * CHUNK_SIZE];
    let mut writer = FailingWriter {
        written: 0,
        limit: CHUNK_SIZE,
        error: || io::Error::from_raw_os_error(libc::ENOSYS),
    };

    let err = copy_stream(&mut data.as_slice(), &mut writer, data.len() as u64, &mut |_, _| {}).unwrap_err();
    assert!(is_write_unsupported(&err));
}

#[test]
fn test_write_unsupported_detection() {
    assert!(is_write_unsupported(&io::Error::from_raw_os_error(libc::ENOSYS)));
    assert!(is_write_unsupported(&io::Error::other("Function not implemented (os error 38)")));
    assert!(!is_write_unsupported(&io::Error::from(io::ErrorKind::PermissionDenied)));
    assert!(!is_write_unsupported(&io::Error::other("disk full")));
}

#[test]
fn test_copy_file_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let result = copy_file(&dir.path().join("nope"), &dir.path().join("dest"), &mut |_, _| {});
    assert!(matches!(result, Err(TransferError::SourceNotFound { .. })));
    assert!(!dir.path().join("dest").exists());
}

#[test]
fn test_user_messages() {
    assert_eq!(TransferError::NotMounted.user_message(), "iPhone not mounted.");
    assert!(
        TransferError::WriteUnsupported { path: "/m/a".to_string() }
            .user_message()
            .contains("doesn't support file uploads")
    );
    assert_eq!(TransferError::DocumentsModeRequired.to_string(), "Documents mode required");
}
