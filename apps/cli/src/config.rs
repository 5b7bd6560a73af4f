//! App configuration.
//!
//! Priority: environment variables > `config.json` in the app config directory > defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::APP_NAME;

/// Default mount point, relative to the user's home directory.
const DEFAULT_MOUNT_DIR_NAME: &str = "iPhoneMount";

/// Names of the external helper programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelperPrograms {
    /// Attaches the device filesystem (`ifuse`). Also lists apps with file sharing.
    pub mount_helper: String,
    /// FUSE unmount command (`fusermount`).
    pub unmount_helper: String,
    /// Lists connected device identifiers (`idevice_id`).
    pub device_lister: String,
    /// Prints the OS mount table (`mount`).
    pub mount_table_command: String,
    /// Privilege escalation for deep clean (`sudo`).
    pub elevate_command: String,
}

impl Default for HelperPrograms {
    fn default() -> Self {
        Self {
            mount_helper: "ifuse".to_string(),
            unmount_helper: "fusermount".to_string(),
            device_lister: "idevice_id".to_string(),
            mount_table_command: "mount".to_string(),
            elevate_command: "sudo".to_string(),
        }
    }
}

/// Bounds for mounted-tree listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingLimits {
    /// Entries delivered per batch.
    pub batch_size: usize,
    /// Listing stops once this many entries were collected.
    pub max_entries: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_entries: 5000,
        }
    }
}

/// Full app configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub mount_path: PathBuf,
    pub helpers: HelperPrograms,
    pub listing: ListingLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount_path: default_mount_path(),
            helpers: HelperPrograms::default(),
            listing: ListingLimits::default(),
        }
    }
}

impl Config {
    /// Loads `config.json` from the app config directory, then applies env var overrides.
    pub fn load() -> Self {
        let from_file = config_dir()
            .map(|dir| dir.join("config.json"))
            .and_then(|path| Self::load_file(&path));
        Self::with_env_overrides(from_file.unwrap_or_default())
    }

    /// Reads a config file. Returns `None` if it's missing or unparsable.
    pub fn load_file(path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring unparsable config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Applies `PHONEMOUNT_MOUNT_PATH`, `PHONEMOUNT_BATCH_SIZE` and `PHONEMOUNT_MAX_ENTRIES`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            env::var("PHONEMOUNT_MOUNT_PATH").ok(),
            env::var("PHONEMOUNT_BATCH_SIZE").ok(),
            env::var("PHONEMOUNT_MAX_ENTRIES").ok(),
        )
    }

    fn with_overrides(
        mut self,
        mount_path: Option<String>,
        batch_size: Option<String>,
        max_entries: Option<String>,
    ) -> Self {
        if let Some(path) = mount_path.filter(|p| !p.trim().is_empty()) {
            self.mount_path = expand_home(&path);
        }
        if let Some(size) = batch_size.and_then(|v| v.parse::<usize>().ok()).filter(|v| *v > 0) {
            self.listing.batch_size = size;
        }
        if let Some(max) = max_entries.and_then(|v| v.parse::<usize>().ok()).filter(|v| *v > 0) {
            self.listing.max_entries = max;
        }
        self
    }
}

/// `~/.config/phonemount` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// `~/iPhoneMount`, or a relative `iPhoneMount` if the home directory is unknown.
pub fn default_mount_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_MOUNT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT_DIR_NAME))
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
