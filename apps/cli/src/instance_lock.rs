//! Single-instance guard.
//!
//! Two instances driving the same mount point would fight over it, so the binary takes this
//! guard before any lifecycle command runs. On Linux the guard is a datagram socket bound to
//! an abstract address, which the kernel frees when the process dies. Elsewhere (or when the
//! socket can't be bound) it's an exclusive `flock` on a lock file.

use log::debug;
use std::fs::File;
use std::io;
use std::path::Path;

#[derive(Debug)]
pub enum InstanceError {
    AlreadyRunning,
    Io { message: String },
}

impl InstanceError {
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyRunning => "Another instance is already running.".to_string(),
            Self::Io { message } => format!("Couldn't check for another running instance: {}", message),
        }
    }
}

impl std::fmt::Display for InstanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "Already running"),
            Self::Io { message } => write!(f, "Instance lock error: {message}"),
        }
    }
}

impl std::error::Error for InstanceError {}

/// Held for as long as this process is the only instance. Released on drop.
#[derive(Debug)]
pub enum InstanceGuard {
    #[cfg(target_os = "linux")]
    Socket { _socket: std::os::unix::net::UnixDatagram },
    LockFile { _file: File },
    /// No locking is available on this platform.
    #[cfg(not(unix))]
    Unguarded,
}

impl InstanceGuard {
    /// Claims the instance `name`. `lock_dir` holds the lock file when one is needed.
    pub fn acquire(name: &str, lock_dir: &Path) -> Result<Self, InstanceError> {
        #[cfg(target_os = "linux")]
        match bind_abstract(name) {
            Ok(socket) => {
                debug!("Holding instance socket @{}", name);
                return Ok(Self::Socket { _socket: socket });
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => return Err(InstanceError::AlreadyRunning),
            Err(e) => log::warn!("Couldn't bind instance socket ({}), using a lock file", e),
        }

        lock_file(&lock_dir.join(format!("{name}.lock")))
    }
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> io::Result<std::os::unix::net::UnixDatagram> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixDatagram};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    UnixDatagram::bind_addr(&addr)
}

#[cfg(unix)]
fn lock_file(path: &Path) -> Result<InstanceGuard, InstanceError> {
    use std::fs::{self, OpenOptions};
    use std::os::unix::io::AsRawFd;

    let io_error = |e: io::Error| InstanceError::Io {
        message: format!("{}: {}", path.display(), e),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(io_error)?;

    // SAFETY: the fd is valid for the lifetime of `file`
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        debug!("Holding instance lock {}", path.display());
        return Ok(InstanceGuard::LockFile { _file: file });
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Err(InstanceError::AlreadyRunning)
    } else {
        Err(io_error(err))
    }
}

#[cfg(not(unix))]
fn lock_file(path: &Path) -> Result<InstanceGuard, InstanceError> {
    log::warn!("No instance locking on this platform, not locking {}", path.display());
    Ok(InstanceGuard::Unguarded)
}
