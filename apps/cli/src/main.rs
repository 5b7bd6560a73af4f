//! phonemount binary.
//!
//! Usage:
//!   phonemount [--debug] [--mount-path DIR] <COMMAND>
//!
//! Environment variables:
//!   PHONEMOUNT_MOUNT_PATH - Mount point (same as --mount-path)
//!   RUST_LOG              - Log filter (default: info)

mod cli;

use clap::Parser;
use std::process::ExitCode;

use phonemount_lib::config::config_dir;
use phonemount_lib::logging::init_logging;
use phonemount_lib::{APP_NAME, APP_VERSION};

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_logging(cli.debug, config_dir().as_deref());
    log::debug!("{} v{} starting: {:?}", APP_NAME, APP_VERSION, cli.command);
    cli::run(cli)
}
