//! Synchronous wrapper around external helper programs.
//!
//! Every helper this app talks to (`ifuse`, `fusermount`, `idevice_id`, `mount`, `sudo`) is
//! an opaque subprocess. Callers get the exit code and both output streams back, and decide
//! for themselves what counts as failure. A nonzero exit is never an `Err`.

use log::debug;
use std::process::Command;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process could not be started or was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Exit code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Builds a successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Best text to show when the command failed: stderr, then stdout.
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr;
        }
        self.stdout.trim()
    }
}

/// Runs external commands. Injected everywhere a helper is invoked so tests can script them.
pub trait ProcessRunner {
    /// Runs `program` with `args` to completion and captures its output.
    ///
    /// Must not fail on a nonzero exit. A spawn failure is reported as `code: None` with the
    /// OS error in `stderr`.
    fn run(&self, program: &str, args: &[&str]) -> CommandOutput;
}

/// Runs commands with `std::process::Command`, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        debug!("Running: {} {}", program, args.join(" "));
        match Command::new(program).args(args).output() {
            Ok(output) => {
                let result = CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                debug!("{} exited with {:?}", program, result.code);
                if !result.success() && !result.stderr.is_empty() {
                    debug!("{} stderr: {}", program, result.stderr.trim());
                }
                result
            }
            Err(e) => {
                debug!("Failed to start {}: {}", program, e);
                CommandOutput {
                    code: None,
                    stdout: String::new(),
                    stderr: format!("Failed to run {}: {}", program, e),
                }
            }
        }
    }
}
