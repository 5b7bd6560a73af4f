//! Command-line front-end. Stands in for the app window: every button is a subcommand, and
//! `shell` keeps one session open the way the window did.

pub mod prompt;
pub mod shell;

use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::PathBuf;
use std::process::ExitCode;

use phonemount_lib::config::{self, Config};
use phonemount_lib::device::list_apps;
use phonemount_lib::file_system::{download, download_many, upload};
use phonemount_lib::instance_lock::{InstanceError, InstanceGuard};
use phonemount_lib::mount::{MountKind, SystemMountTable};
use phonemount_lib::requirements::missing_requirements;
use phonemount_lib::{
    APP_NAME, MountError, MountLifecycle, MountMode, MountOutcome, ProcessRunner, Prompter, ResetOutcome,
    SystemProcessRunner, TransferError, UnmountOutcome,
};

use prompt::TerminalPrompter;

#[derive(Parser, Debug)]
#[command(name = "phonemount", version, about = "Mount, browse and transfer files on an iPhone with ifuse")]
pub struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Mount point, instead of the configured one
    #[arg(long, global = true, value_name = "DIR", env = "PHONEMOUNT_MOUNT_PATH")]
    pub mount_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check that the helper programs are installed
    Check,
    /// Show what is mounted
    Status,
    /// Mount the media store, or an app's Documents folder
    Mount {
        /// Mount the Documents folder of an app (read-write, allows uploads)
        #[arg(long)]
        documents: bool,
    },
    /// Unmount the device
    Unmount,
    /// List files on the mounted device
    List,
    /// Search the file list (case-insensitive)
    Search { term: String },
    /// List apps with file sharing
    Apps,
    /// Upload a file into the mounted Documents folder
    Upload { file: PathBuf },
    /// Download files from the device
    Download {
        /// Paths as shown by `list`
        #[arg(required = true)]
        paths: Vec<String>,
        /// Destination file or directory
        #[arg(long, value_name = "DIR")]
        to: PathBuf,
    },
    /// Unmount, remove and recreate the mount point
    Reset,
    /// Like reset, but with sudo
    DeepClean,
    /// Interactive session
    Shell,
}

#[derive(Debug)]
pub enum CliError {
    Mount(MountError),
    Transfer(TransferError),
    Instance(InstanceError),
    MissingTools(usize),
}

impl CliError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Mount(e) => e.user_message(),
            Self::Transfer(e) => e.user_message(),
            Self::Instance(e) => e.user_message(),
            Self::MissingTools(count) => format!("{} required program(s) missing. Run \"phonemount check\".", count),
        }
    }
}

impl From<MountError> for CliError {
    fn from(e: MountError) -> Self {
        Self::Mount(e)
    }
}

impl From<TransferError> for CliError {
    fn from(e: TransferError) -> Self {
        Self::Transfer(e)
    }
}

/// Everything a command needs.
pub struct Session<'a> {
    pub lifecycle: MountLifecycle<'a>,
    pub runner: &'a dyn ProcessRunner,
    pub prompter: &'a dyn Prompter,
}

/// Loads the config; `--mount-path` beats everything else.
pub fn load_config(mount_path: Option<PathBuf>) -> Config {
    let mut config = Config::load();
    if let Some(path) = mount_path {
        config.mount_path = config::expand_home(&path.to_string_lossy());
    }
    debug!("Config: {:?}", config);
    config
}

pub fn run(cli: Cli) -> ExitCode {
    let config = load_config(cli.mount_path);
    let runner = SystemProcessRunner;

    let result = if cli.command == Command::Check {
        check(&runner, &config)
    } else {
        run_guarded(&config, &runner, &cli.command)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run_guarded(config: &Config, runner: &SystemProcessRunner, command: &Command) -> Result<(), CliError> {
    let missing = missing_requirements(runner, &config.helpers);
    if !missing.is_empty() {
        for tool in &missing {
            eprintln!("{}", tool.install_hint);
        }
        return Err(CliError::MissingTools(missing.len()));
    }

    let lock_dir = config::config_dir().unwrap_or_else(std::env::temp_dir);
    let _guard = InstanceGuard::acquire(APP_NAME, &lock_dir).map_err(CliError::Instance)?;

    let table = SystemMountTable::new(config.helpers.mount_table_command.clone());
    let prompter = TerminalPrompter;
    let mut session = Session {
        lifecycle: MountLifecycle::new(config, runner, &table),
        runner,
        prompter: &prompter,
    };
    let mode = session.lifecycle.detect_mode();
    info!("Starting with {} at {}", mode, config.mount_path.display());
    execute(&mut session, command)
}

fn check(runner: &dyn ProcessRunner, config: &Config) -> Result<(), CliError> {
    let missing = missing_requirements(runner, &config.helpers);
    if missing.is_empty() {
        println!("All required programs are installed.");
        return Ok(());
    }
    for tool in &missing {
        println!("Missing {}: {}", tool.program, tool.install_hint);
    }
    Err(CliError::MissingTools(missing.len()))
}

/// Runs one command against an open session.
pub fn execute(session: &mut Session<'_>, command: &Command) -> Result<(), CliError> {
    let lifecycle = &mut session.lifecycle;
    match command {
        Command::Check => check(session.runner, lifecycle.config()),
        Command::Status => {
            let mode = lifecycle.detect_mode();
            println!("Mount point: {}", lifecycle.mount_path().display());
            println!("Status: {}", mode);
            if let Some(listing) = lifecycle.cached_listing() {
                println!("Last listing: {}", listing.summary);
            }
            Ok(())
        }
        Command::Mount { documents } => {
            let kind = if *documents { MountKind::Documents } else { MountKind::Media };
            match lifecycle.mount(kind, session.prompter)? {
                MountOutcome::Mounted(MountMode::Documents { app_id }) => println!(
                    "Documents of {} mounted at {} (read-write).\nYou can now upload files to this app.",
                    app_id,
                    lifecycle.mount_path().display()
                ),
                MountOutcome::Mounted(_) => println!(
                    "iPhone media mounted at {} (mostly read-only).",
                    lifecycle.mount_path().display()
                ),
                MountOutcome::AlreadyMounted => println!("iPhone is already mounted."),
                MountOutcome::Cancelled => println!("App selection cancelled."),
            }
            Ok(())
        }
        Command::Unmount => {
            match lifecycle.unmount()? {
                UnmountOutcome::Unmounted => println!("iPhone unmounted successfully."),
                UnmountOutcome::NotMounted => println!("iPhone is not currently mounted."),
            }
            Ok(())
        }
        Command::List => list(lifecycle),
        Command::Search { term } => search(lifecycle, term),
        Command::Apps => {
            let apps = list_apps(session.runner, &lifecycle.config().helpers.mount_helper);
            if apps.is_empty() {
                return Err(MountError::NoSharingApps.into());
            }
            for app in apps {
                println!("{}", app.label());
            }
            Ok(())
        }
        Command::Upload { file } => {
            let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let mut on_progress = |copied: u64, total: u64| {
                let percent = if total == 0 { 100 } else { copied * 100 / total };
                eprint!("\rUploading {} ({}%)...", name, percent);
            };
            let result = upload(lifecycle, file, &mut on_progress);
            eprintln!();
            let dest = result?;
            println!(
                "File {} uploaded to {}.\nYou can access this file in the app on your iPhone.",
                name,
                dest.display()
            );
            Ok(())
        }
        Command::Download { paths, to } => {
            if let [single] = paths.as_slice() {
                let dest = download(lifecycle, single, to)?;
                println!("File saved to {}", dest.display());
                return Ok(());
            }
            let summary = download_many(lifecycle, paths, to)?;
            for failure in &summary.failures {
                eprintln!("Failed: {}: {}", failure.path, failure.error.user_message());
            }
            if summary.failed() > 0 {
                println!(
                    "Downloaded {} files successfully. Failed to download {} files.",
                    summary.succeeded,
                    summary.failed()
                );
            } else {
                println!("Successfully downloaded {} files to {}", summary.succeeded, to.display());
            }
            Ok(())
        }
        Command::Reset => {
            match lifecycle.reset(session.prompter)? {
                ResetOutcome::Reset => println!("Mount point reset successfully."),
                ResetOutcome::DeepCleaned => println!("Mount point deep cleaned successfully."),
                ResetOutcome::Cancelled => println!("Reset cancelled."),
            }
            Ok(())
        }
        Command::DeepClean => {
            if !session
                .prompter
                .confirm("This uses sudo and may ask for your password in the terminal. Continue?")
            {
                println!("Deep clean cancelled.");
                return Ok(());
            }
            lifecycle.deep_clean()?;
            println!("Mount point deep cleaned successfully.");
            Ok(())
        }
        Command::Shell => shell::run(session),
    }
}

fn list(lifecycle: &mut MountLifecycle<'_>) -> Result<(), CliError> {
    let listing = lifecycle.list_files(&mut |batch| {
        for path in batch {
            println!("{}", path);
        }
    })?;
    if listing.mode.is_documents() && listing.entries.is_empty() {
        println!("This folder is empty. Use \"upload\" to add files.");
    }
    if listing.summary.truncated {
        println!("--- Only showing {} files. Use \"search\" to find specific files ---", listing.entries.len());
    }
    println!("{}", listing.summary);
    Ok(())
}

fn search(lifecycle: &mut MountLifecycle<'_>, term: &str) -> Result<(), CliError> {
    if !lifecycle.is_mounted() {
        return Err(TransferError::NotMounted.into());
    }
    if lifecycle.cached_listing().is_none() {
        lifecycle.list_files(&mut |_| {})?;
    }
    let matches = lifecycle.cached_listing().map(|listing| listing.search(term)).unwrap_or_default();
    for path in &matches {
        println!("{}", path);
    }
    println!("{} match(es) for \"{}\"", matches.len(), term.trim());
    Ok(())
}
