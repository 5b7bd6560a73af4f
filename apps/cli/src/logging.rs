//! Logging setup for the binary.
//!
//! Library code only uses the `log` facade. This wires `env_logger` to stderr and, when
//! possible, to `phonemount.log` in the app config directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::APP_NAME;

/// Writes every log line to stderr and to an append-only log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A broken log file must not take stderr logging down with it
        let _ = self.file.write_all(buf);
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.file.flush();
        io::stderr().flush()
    }
}

/// Path of the log file inside the given config directory.
pub fn log_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(format!("{APP_NAME}.log"))
}

/// Initializes logging. Respects `RUST_LOG`; the default filter is `info`, or `debug` when
/// `debug` is set. Safe to call more than once (later calls are no-ops).
pub fn init_logging(debug: bool, config_dir: Option<&Path>) {
    let default_filter = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.format_timestamp_millis();

    if let Some(file) = config_dir.and_then(open_log_file) {
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

fn open_log_file(config_dir: &Path) -> Option<File> {
    fs::create_dir_all(config_dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(config_dir))
        .ok()
}
