//! OS mount table access.
//!
//! `is_mounted` is the authoritative mounted/unmounted fact that every lifecycle step
//! re-checks. `mount_line` is the human-readable `mount` output line for our path, used for
//! the best-effort Documents-mode detection and for diagnostics.

use log::debug;
use std::fs;
use std::path::Path;

use crate::process::{ProcessRunner, SystemProcessRunner};

/// Kernel mount table for the current mount namespace.
const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Read access to the OS mount table.
pub trait MountTable {
    /// Returns true if the OS currently reports `path` as a mount point.
    fn is_mounted(&self, path: &Path) -> bool;

    /// Returns the `mount` output line describing `path`, if any.
    fn mount_line(&self, path: &Path) -> Option<String>;
}

/// Mount table backed by `/proc/self/mounts` and the `mount` command.
#[derive(Debug, Clone)]
pub struct SystemMountTable {
    mount_table_command: String,
}

impl SystemMountTable {
    pub fn new(mount_table_command: impl Into<String>) -> Self {
        Self {
            mount_table_command: mount_table_command.into(),
        }
    }
}

impl MountTable for SystemMountTable {
    fn is_mounted(&self, path: &Path) -> bool {
        match fs::read_to_string(PROC_MOUNTS) {
            Ok(contents) => {
                let canonical = fs::canonicalize(path).ok();
                mount_points(&contents).any(|mount_point| {
                    let mount_point = Path::new(&mount_point);
                    mount_point == path || canonical.as_deref() == Some(mount_point)
                })
            }
            Err(e) => {
                debug!("Can't read {}: {}, comparing device ids instead", PROC_MOUNTS, e);
                differs_from_parent_device(path)
            }
        }
    }

    fn mount_line(&self, path: &Path) -> Option<String> {
        let output = SystemProcessRunner.run(&self.mount_table_command, &[]);
        if !output.success() {
            debug!("{} failed: {}", self.mount_table_command, output.error_text());
            return None;
        }
        find_mount_line(&output.stdout, path)
    }
}

/// Iterates over the (unescaped) mount points in `/proc/mounts` format.
pub fn mount_points(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(decode_mount_escapes)
}

/// Decodes the octal escapes (`\040` for space and friends) used in `/proc/mounts`.
pub fn decode_mount_escapes(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = u32::from(bytes[i + 1] - b'0') * 64
                + u32::from(bytes[i + 2] - b'0') * 8
                + u32::from(bytes[i + 3] - b'0');
            if let Ok(byte) = u8::try_from(value) {
                decoded.push(byte);
                i += 4;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Finds the `mount` output line for `path`.
///
/// Only the exact `" on <path> "` form matches, so `~/iPhoneMount2` never stands in for
/// `~/iPhoneMount`.
pub fn find_mount_line(output: &str, path: &Path) -> Option<String> {
    let exact = format!(" on {} ", path.to_string_lossy());
    output.lines().find(|line| line.contains(&exact)).map(str::to_string)
}

/// A directory is a mount point if its device id differs from its parent's.
#[cfg(unix)]
fn differs_from_parent_device(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let parent = path.parent().unwrap_or(Path::new("/"));
    match fs::metadata(parent) {
        Ok(parent_metadata) => metadata.dev() != parent_metadata.dev(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn differs_from_parent_device(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_SAMPLE: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
ifuse /home/user/iPhoneMount fuse.ifuse rw,nosuid,nodev,relatime,user_id=1000,group_id=1000 0 0
ifuse /home/user/My\\040Phone fuse.ifuse rw,nosuid,nodev 0 0
";

    #[test]
    fn test_mount_points_are_decoded() {
        let points: Vec<String> = mount_points(PROC_SAMPLE).collect();
        assert_eq!(
            points,
            vec!["/sys", "/", "/home/user/iPhoneMount", "/home/user/My Phone"]
        );
    }

    #[test]
    fn test_decode_mount_escapes() {
        assert_eq!(decode_mount_escapes("/a\\040b\\011c"), "/a b\tc");
        assert_eq!(decode_mount_escapes("/back\\134slash"), "/back\\slash");
        // Not an escape: left alone
        assert_eq!(decode_mount_escapes("/odd\\9x"), "/odd\\9x");
        assert_eq!(decode_mount_escapes("/trailing\\04"), "/trailing\\04");
    }

    #[test]
    fn test_find_mount_line_prefers_exact_path() {
        let output = "\
ifuse on /home/user/iPhoneMount2 type fuse.ifuse (rw,nosuid,nodev)
ifuse on /home/user/iPhoneMount type fuse.ifuse (rw,nosuid,nodev,documents)
";
        let line = find_mount_line(output, Path::new("/home/user/iPhoneMount")).unwrap();
        assert!(line.contains("documents"));
    }

    #[test]
    fn test_find_mount_line_ignores_longer_sibling_path() {
        let output = "\
ifuse on /home/user/iPhoneMount2 type fuse.ifuse (rw,nosuid,nodev,documents)
/dev/fuse on /home/user/iPhoneMount/sub type fuse (rw)
";
        assert_eq!(find_mount_line(output, Path::new("/home/user/iPhoneMount")), None);
    }

    #[test]
    fn test_find_mount_line_missing() {
        let output = "/dev/sda1 on / type ext4 (rw)\n";
        assert_eq!(find_mount_line(output, Path::new("/home/user/iPhoneMount")), None);
    }

    #[test]
    fn test_plain_directory_is_not_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let table = SystemMountTable::new("mount");
        assert!(!table.is_mounted(dir.path()));
    }

    #[test]
    fn test_missing_directory_is_not_mounted() {
        let table = SystemMountTable::new("mount");
        assert!(!table.is_mounted(Path::new("/definitely/does/not/exist/12345")));
    }
}
