// Deny unused code to catch dead code early
#![deny(unused)]
// Warn on unused dependencies to catch platform-specific cfg mismatches
#![warn(unused_crate_dependencies)]
// Warn on redundant path prefixes (e.g., std::path::Path when Path is imported)
#![warn(unused_qualifications)]
// Use log::* macros instead of println!/eprintln! for proper log level control
#![deny(clippy::print_stdout, clippy::print_stderr)]

//noinspection RsUnusedImport
// clap is only used by the binary target
use clap as _;

pub mod config;
pub mod device;
pub mod file_system;
pub mod instance_lock;
pub mod logging;
pub mod mount;
pub mod process;
pub mod prompter;
pub mod requirements;

pub use config::Config;
pub use device::AppEntry;
pub use file_system::{DownloadSummary, Listing, TransferError};
pub use mount::{MountError, MountLifecycle, MountMode, MountOutcome, ResetOutcome, UnmountOutcome};
pub use process::{CommandOutput, ProcessRunner, SystemProcessRunner};
pub use prompter::Prompter;

/// Application name used for the config directory, log file and lock name.
pub const APP_NAME: &str = "phonemount";

/// Application version, taken from the crate manifest.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
