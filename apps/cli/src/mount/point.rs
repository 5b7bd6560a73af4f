//! Mount point directory management.
//!
//! Owns the existence, emptiness and permissions of the mount directory. Reset and deep clean
//! are ordered lists of remediation steps. Every step may fail on its own; failures are logged
//! and the sequence keeps going. Overall success is only ever judged by the final check that
//! the directory exists and is writable.

use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use super::table::MountTable;
use crate::config::HelperPrograms;
use crate::process::ProcessRunner;

/// One step of a reset or deep clean sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationStep {
    /// Runs a command. Its exit code is logged, never acted on.
    Run { program: String, args: Vec<String> },
    /// Like `Run`, but skipped while the path is still mounted. Used for removal and for
    /// ownership changes, which must never reach into device content.
    RunWhenUnmounted { program: String, args: Vec<String> },
    /// Removes the directory tree as far as permissions allow. Skipped while mounted.
    RemoveTree,
    /// Creates the directory and its parents with mode 755.
    CreateDir,
}

impl fmt::Display for RemediationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run { program, args } | Self::RunWhenUnmounted { program, args } => {
                write!(f, "{} {}", program, args.join(" "))
            }
            Self::RemoveTree => write!(f, "remove directory tree"),
            Self::CreateDir => write!(f, "create directory"),
        }
    }
}

/// Manages the mount directory for one mount path.
pub struct MountPointManager<'a> {
    path: &'a Path,
    helpers: &'a HelperPrograms,
    runner: &'a dyn ProcessRunner,
    table: &'a dyn MountTable,
}

impl<'a> MountPointManager<'a> {
    pub fn new(
        path: &'a Path,
        helpers: &'a HelperPrograms,
        runner: &'a dyn ProcessRunner,
        table: &'a dyn MountTable,
    ) -> Self {
        Self {
            path,
            helpers,
            runner,
            table,
        }
    }

    /// Creates the directory (and parents) if absent. Returns whether it exists afterwards.
    pub fn ensure_exists(&self) -> bool {
        if let Err(e) = fs::create_dir_all(self.path) {
            warn!("Couldn't create mount point {}: {}", self.path.display(), e);
        }
        self.path.is_dir()
    }

    /// Authoritative mounted/unmounted check, straight from the OS.
    pub fn is_mounted(&self) -> bool {
        self.table.is_mounted(self.path)
    }

    /// True if the current user can create entries in the directory.
    pub fn is_writable(&self) -> bool {
        is_writable_dir(self.path)
    }

    /// Removes plain files sitting directly in the mount directory, since a non-empty mount
    /// point can make the mount helper refuse to mount. Subdirectories are left alone.
    ///
    /// Returns how many files were removed. Does nothing while mounted.
    pub fn clear_loose_files(&self) -> usize {
        if self.is_mounted() {
            debug!("Not clearing {}: still mounted", self.path.display());
            return 0;
        }
        let entries = match fs::read_dir(self.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Couldn't read mount point {}: {}", self.path.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Removed loose file {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => warn!("Couldn't remove {}: {}", entry.path().display(), e),
            }
        }
        removed
    }

    /// Steps of a plain reset: graceful and forced unmount, removal, recreation.
    pub fn reset_steps(&self) -> Vec<RemediationStep> {
        let path = self.path_arg();
        vec![
            RemediationStep::Run {
                program: self.helpers.unmount_helper.clone(),
                args: vec!["-u".to_string(), path.clone()],
            },
            RemediationStep::Run {
                program: self.helpers.unmount_helper.clone(),
                args: vec!["-uz".to_string(), path],
            },
            RemediationStep::RemoveTree,
            RemediationStep::CreateDir,
        ]
    }

    /// Steps of a deep clean: the escalated unmount, removal, recreation and ownership fix-up.
    pub fn deep_clean_steps(&self) -> Vec<RemediationStep> {
        let path = self.path_arg();
        let sudo = |args: &[&str]| RemediationStep::Run {
            program: self.helpers.elevate_command.clone(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        let sudo_unmounted = |args: &[&str]| RemediationStep::RunWhenUnmounted {
            program: self.helpers.elevate_command.clone(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        let owner = format!("{}:{}", uzers::get_current_uid(), uzers::get_current_gid());
        vec![
            RemediationStep::Run {
                program: self.helpers.unmount_helper.clone(),
                args: vec!["-u".to_string(), path.clone()],
            },
            sudo(&["umount", "-f", &path]),
            sudo_unmounted(&["rm", "-rf", &path]),
            sudo(&["mkdir", "-p", &path]),
            sudo_unmounted(&["chown", &owner, &path]),
            sudo_unmounted(&["chmod", "755", &path]),
        ]
    }

    /// Tears the mount point down and recreates it. Safe to repeat, safe on a missing
    /// directory. Returns true if the directory exists and is writable afterwards.
    pub fn reset(&self) -> bool {
        info!("Resetting mount point {}", self.path.display());
        let ok = self.run_steps(&self.reset_steps());
        info!("Reset of {} {}", self.path.display(), if ok { "succeeded" } else { "failed" });
        ok
    }

    /// Reset with elevated privileges, for a directory the user can't fix alone.
    pub fn deep_clean(&self) -> bool {
        info!("Deep cleaning mount point {}", self.path.display());
        let ok = self.run_steps(&self.deep_clean_steps());
        info!("Deep clean of {} {}", self.path.display(), if ok { "succeeded" } else { "failed" });
        ok
    }

    /// Runs every step in order, then does the final existence and writability check.
    pub fn run_steps(&self, steps: &[RemediationStep]) -> bool {
        for step in steps {
            self.run_step(step);
        }
        self.path.is_dir() && self.is_writable()
    }

    fn run_step(&self, step: &RemediationStep) {
        match step {
            RemediationStep::Run { program, args } => self.run_command(program, args),
            RemediationStep::RunWhenUnmounted { program, args } => {
                if self.is_mounted() {
                    warn!("Skipping \"{}\": {} is still mounted", step, self.path.display());
                } else {
                    self.run_command(program, args);
                }
            }
            RemediationStep::RemoveTree => {
                if self.is_mounted() {
                    warn!("Not removing {}: still mounted", self.path.display());
                } else {
                    remove_tree(self.path);
                }
            }
            RemediationStep::CreateDir => create_dir(self.path),
        }
    }

    fn run_command(&self, program: &str, args: &[String]) {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run(program, &args);
        if !output.success() {
            debug!(
                "Remediation step \"{} {}\" failed (continuing): {}",
                program,
                args.join(" "),
                output.error_text()
            );
        }
    }

    fn path_arg(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Removes `path` and everything below it, carrying on past entries that can't be removed.
fn remove_tree(path: &Path) {
    if fs::symlink_metadata(path).is_err() {
        return;
    }
    if fs::remove_dir_all(path).is_ok() {
        debug!("Removed {}", path.display());
        return;
    }

    let mut failures = 0;
    for entry in WalkDir::new(path).contents_first(true).into_iter().flatten() {
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())
        } else {
            fs::remove_file(entry.path())
        };
        if let Err(e) = result {
            debug!("Couldn't remove {}: {}", entry.path().display(), e);
            failures += 1;
        }
    }
    if failures > 0 {
        warn!("{} entries under {} couldn't be removed", failures, path.display());
    }
}

fn create_dir(path: &Path) {
    if let Err(e) = fs::create_dir_all(path) {
        warn!("Couldn't create {}: {}", path.display(), e);
        return;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o755)) {
            warn!("Couldn't set permissions on {}: {}", path.display(), e);
        }
    }
}

#[cfg(unix)]
fn is_writable_dir(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid null-terminated string that outlives the call
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK | libc::X_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable_dir(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}
