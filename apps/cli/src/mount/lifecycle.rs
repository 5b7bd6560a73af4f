//! The mount lifecycle state machine.
//!
//! Tracks which mode is active (unmounted, media, or one app's Documents folder) and drives
//! mount, unmount, reset and deep clean. The OS mount table is the source of truth for the
//! mounted/unmounted fact; the internal mode is only advanced after the OS confirms a mount,
//! and is re-checked against the OS whenever it could have gone stale.

use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use super::errors::{MountError, mount_error_from_helper, truncate_detail};
use super::point::MountPointManager;
use super::table::MountTable;
use crate::config::Config;
use crate::device::{first_device_id, list_apps};
use crate::file_system::enumerator::collect_listing;
use crate::file_system::{Listing, TransferError};
use crate::process::ProcessRunner;
use crate::prompter::Prompter;

/// What is mounted, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MountMode {
    Unmounted,
    /// The device's media store. Effectively read-only.
    Media,
    /// One app's sandboxed Documents folder. Read-write.
    ///
    /// `app_id` is empty when the mode was recovered from the mount table rather than set by
    /// our own mount.
    #[serde(rename_all = "camelCase")]
    Documents { app_id: String },
}

impl MountMode {
    pub fn is_documents(&self) -> bool {
        matches!(self, Self::Documents { .. })
    }

    pub fn is_mounted(&self) -> bool {
        !matches!(self, Self::Unmounted)
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmounted => write!(f, "not mounted"),
            Self::Media => write!(f, "media (read-only)"),
            Self::Documents { app_id } if app_id.is_empty() => write!(f, "app documents (read-write)"),
            Self::Documents { app_id } => write!(f, "documents of {} (read-write)", app_id),
        }
    }
}

/// Which kind of mount to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Media,
    /// Prompts for the app whose Documents folder gets mounted.
    Documents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted(MountMode),
    /// Something was already mounted at the path. Nothing was changed.
    AlreadyMounted,
    /// The user closed the app selection.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    Unmounted,
    NotMounted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    /// The plain reset failed and the user agreed to the escalated one, which worked.
    DeepCleaned,
    /// The user declined to unmount a mounted device for the reset.
    Cancelled,
}

/// Internal record of the active mode.
///
/// `None` is the transitional value held while a mount attempt is in flight. Every exit from
/// a lifecycle operation leaves a concrete mode behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleState {
    mode: Option<MountMode>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            mode: Some(MountMode::Unmounted),
        }
    }
}

impl LifecycleState {
    /// The recorded mode. The transitional value reads as `Unmounted`.
    pub fn mode(&self) -> MountMode {
        self.mode.clone().unwrap_or(MountMode::Unmounted)
    }

    fn set(&mut self, mode: MountMode) {
        debug!("Mount mode: {:?} -> {:?}", self.mode, mode);
        self.mode = Some(mode);
    }

    fn begin_transition(&mut self) {
        self.mode = None;
    }
}

/// Drives the mount lifecycle for one mount path.
pub struct MountLifecycle<'a> {
    config: &'a Config,
    runner: &'a dyn ProcessRunner,
    table: &'a dyn MountTable,
    state: LifecycleState,
    listing: Option<Listing>,
}

impl<'a> MountLifecycle<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn ProcessRunner, table: &'a dyn MountTable) -> Self {
        Self {
            config,
            runner,
            table,
            state: LifecycleState::default(),
            listing: None,
        }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn mount_path(&self) -> &Path {
        &self.config.mount_path
    }

    /// The internally recorded mode. See [`Self::detect_mode`] for one checked against the OS.
    pub fn mode(&self) -> MountMode {
        self.state.mode()
    }

    pub fn is_mounted(&self) -> bool {
        self.table.is_mounted(self.mount_path())
    }

    fn mount_point(&self) -> MountPointManager<'a> {
        let config: &'a Config = self.config;
        MountPointManager::new(&config.mount_path, &config.helpers, self.runner, self.table)
    }

    // ========================================================================
    // Mount
    // ========================================================================

    /// Mounts the media store.
    pub fn mount_media(&mut self) -> Result<MountOutcome, MountError> {
        self.mount_with(None)
    }

    /// Mounts the Documents folder of an app the user picks from the live app list.
    pub fn mount_documents(&mut self, prompter: &dyn Prompter) -> Result<MountOutcome, MountError> {
        self.mount_with(Some(prompter))
    }

    pub fn mount(&mut self, kind: MountKind, prompter: &dyn Prompter) -> Result<MountOutcome, MountError> {
        match kind {
            MountKind::Media => self.mount_media(),
            MountKind::Documents => self.mount_documents(prompter),
        }
    }

    /// `prompter` is only given for Documents mounts.
    fn mount_with(&mut self, prompter: Option<&dyn Prompter>) -> Result<MountOutcome, MountError> {
        let path = self.mount_path().to_path_buf();
        if self.is_mounted() {
            info!("{} is already mounted", path.display());
            return Ok(MountOutcome::AlreadyMounted);
        }
        self.listing = None;

        let mount_point = self.mount_point();
        if !(mount_point.ensure_exists() && mount_point.is_writable()) {
            warn!("Mount point {} is missing or not writable, resetting it", path.display());
            if !mount_point.reset() {
                self.state.set(MountMode::Unmounted);
                return Err(self.broken("the directory can't be created or written to"));
            }
        }

        // Best effort: a stale FUSE mount makes the helper fail
        let path_arg = path.to_string_lossy().into_owned();
        let stale = self.runner.run(&self.config.helpers.unmount_helper, &["-u", &path_arg]);
        if !stale.success() {
            debug!("No stale mount to remove: {}", stale.error_text());
        }

        self.state.begin_transition();
        mount_point.clear_loose_files();

        let result = self.attach(&path_arg, prompter);
        match &result {
            Ok(MountOutcome::Mounted(mode)) => {
                info!("Mounted {} as {}", path.display(), mode);
                self.state.set(mode.clone());
            }
            Ok(_) => self.state.set(MountMode::Unmounted),
            Err(e) => {
                warn!("Mount failed: {}", e);
                self.state.set(MountMode::Unmounted);
            }
        }
        result
    }

    /// Probes the device, picks the app if needed, runs the mount helper and checks the result.
    fn attach(&self, path_arg: &str, prompter: Option<&dyn Prompter>) -> Result<MountOutcome, MountError> {
        let helpers = &self.config.helpers;
        let Some(udid) = first_device_id(self.runner, &helpers.device_lister) else {
            return Err(MountError::NoDeviceFound);
        };
        debug!("Using device {}", udid);

        let app_id = match prompter {
            None => None,
            Some(prompter) => {
                let apps = list_apps(self.runner, &helpers.mount_helper);
                if apps.is_empty() {
                    return Err(MountError::NoSharingApps);
                }
                match prompter.select_app(&apps) {
                    Some(app_id) if apps.iter().any(|app| app.app_id == app_id) => Some(app_id),
                    Some(app_id) => {
                        warn!("{} isn't in the app list, not mounting it", app_id);
                        return Ok(MountOutcome::Cancelled);
                    }
                    None => {
                        info!("App selection cancelled");
                        return Ok(MountOutcome::Cancelled);
                    }
                }
            }
        };

        let args = mount_helper_args(&udid, app_id.as_deref(), path_arg);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run(&helpers.mount_helper, &args);

        // The exit code alone isn't trusted, only the mount table
        if self.is_mounted() {
            let mode = match app_id {
                Some(app_id) => MountMode::Documents { app_id },
                None => MountMode::Media,
            };
            return Ok(MountOutcome::Mounted(mode));
        }
        debug!("{} exited with {:?} but nothing is mounted", helpers.mount_helper, output.code);
        Err(mount_error_from_helper(output.error_text()))
    }

    // ========================================================================
    // Unmount
    // ========================================================================

    /// Unmounts gracefully, falling back to a lazy forced unmount.
    pub fn unmount(&mut self) -> Result<UnmountOutcome, MountError> {
        if !self.is_mounted() {
            info!("Nothing mounted at {}", self.mount_path().display());
            return Ok(UnmountOutcome::NotMounted);
        }

        let helper = &self.config.helpers.unmount_helper;
        let path_arg = self.mount_path().to_string_lossy().into_owned();
        let graceful = self.runner.run(helper, &["-u", &path_arg]);
        if !graceful.success() {
            warn!("Graceful unmount failed ({}), forcing it", graceful.error_text());
            let forced = self.runner.run(helper, &["-uz", &path_arg]);
            if !forced.success() {
                debug!("Forced unmount failed too: {}", forced.error_text());
            }
        }

        if self.is_mounted() {
            let detail = self
                .table
                .mount_line(self.mount_path())
                .unwrap_or_else(|| non_empty_or_unknown(graceful.error_text()));
            warn!("{} is still mounted: {}", self.mount_path().display(), detail);
            return Err(MountError::StillMounted {
                detail: truncate_detail(&detail),
            });
        }

        info!("Unmounted {}", self.mount_path().display());
        self.state.set(MountMode::Unmounted);
        self.listing = None;
        Ok(UnmountOutcome::Unmounted)
    }

    // ========================================================================
    // Mode detection
    // ========================================================================

    /// True if the active mount is an app's Documents folder.
    ///
    /// Re-checks the OS first, so a mount that vanished behind our back clears the record.
    /// Without a Documents record it falls back to looking for a "documents" marker in the
    /// mount table line. That scan is a best-effort heuristic: a mount path that happens to
    /// contain the word also matches.
    pub fn current_mode_is_documents(&mut self) -> bool {
        if !self.is_mounted() {
            if self.state.mode().is_mounted() {
                info!("Mount at {} is gone, clearing stale mode", self.mount_path().display());
                self.listing = None;
            }
            self.state.set(MountMode::Unmounted);
            return false;
        }
        if self.state.mode().is_documents() {
            return true;
        }

        let is_documents = self
            .table
            .mount_line(self.mount_path())
            .is_some_and(|line| has_documents_marker(&line));
        let mode = if is_documents {
            MountMode::Documents { app_id: String::new() }
        } else {
            MountMode::Media
        };
        if self.state.mode() != mode {
            self.state.set(mode);
        }
        is_documents
    }

    /// Reconciles the record with the OS and returns the resulting mode. Used at start-up,
    /// when the device may already be mounted by an earlier run.
    pub fn detect_mode(&mut self) -> MountMode {
        self.current_mode_is_documents();
        self.mode()
    }

    // ========================================================================
    // Reset / deep clean
    // ========================================================================

    /// Resets the mount point, offering a deep clean if the plain reset doesn't help.
    pub fn reset(&mut self, prompter: &dyn Prompter) -> Result<ResetOutcome, MountError> {
        if self.is_mounted()
            && !prompter.confirm("The device is mounted. Unmount it and reset the mount point?")
        {
            return Ok(ResetOutcome::Cancelled);
        }

        let reset_ok = self.mount_point().reset();
        self.sync_after_teardown();
        if reset_ok && !self.is_mounted() {
            return Ok(ResetOutcome::Reset);
        }

        if !prompter.confirm("Resetting the mount point failed. Try a deep clean? This uses sudo.") {
            return Err(self.teardown_error("reset couldn't recreate a writable directory"));
        }
        self.deep_clean().map(|()| ResetOutcome::DeepCleaned)
    }

    /// Escalated reset with sudo. Fails if the device is still mounted afterwards.
    pub fn deep_clean(&mut self) -> Result<(), MountError> {
        let ok = self.mount_point().deep_clean();
        self.sync_after_teardown();
        if ok && !self.is_mounted() {
            Ok(())
        } else {
            Err(self.teardown_error("deep clean couldn't recreate a writable directory"))
        }
    }

    fn sync_after_teardown(&mut self) {
        self.listing = None;
        if !self.is_mounted() {
            self.state.set(MountMode::Unmounted);
        }
    }

    /// Why a reset or deep clean didn't leave an empty, writable, unmounted directory.
    fn teardown_error(&self, broken_detail: &str) -> MountError {
        if !self.is_mounted() {
            return self.broken(broken_detail);
        }
        let detail = self
            .table
            .mount_line(self.mount_path())
            .unwrap_or_else(|| "the device couldn't be unmounted".to_string());
        warn!("{} is still mounted after teardown: {}", self.mount_path().display(), detail);
        MountError::StillMounted {
            detail: truncate_detail(&detail),
        }
    }

    fn broken(&self, detail: &str) -> MountError {
        MountError::MountPointBroken {
            path: self.mount_path().display().to_string(),
            detail: detail.to_string(),
        }
    }

    // ========================================================================
    // Listing cache
    // ========================================================================

    /// Walks the mounted tree, filtering vendor metadata unless an app's Documents folder is
    /// mounted. Batches go to `on_batch` as they fill; the result is cached.
    pub fn list_files(&mut self, on_batch: &mut dyn FnMut(&[String])) -> Result<&Listing, TransferError> {
        if !self.is_mounted() {
            self.current_mode_is_documents();
            return Err(TransferError::NotMounted);
        }
        let mode = self.detect_mode();
        let listing = collect_listing(&self.config.mount_path, &mode, self.config.listing, on_batch);
        Ok(self.listing.insert(listing))
    }

    /// Drops the cached listing, for example after an upload changed the tree.
    pub fn invalidate_listing(&mut self) {
        self.listing = None;
    }

    pub fn store_listing(&mut self, listing: Listing) {
        self.listing = Some(listing);
    }

    /// The most recent listing. Dropped on unmount, reset and every mount attempt.
    pub fn cached_listing(&self) -> Option<&Listing> {
        self.listing.as_ref()
    }
}

/// Arguments for the mount helper: device, optional app, "tolerate nonempty", target path.
pub fn mount_helper_args(udid: &str, app_id: Option<&str>, path: &str) -> Vec<String> {
    let mut args = vec!["--udid".to_string(), udid.to_string()];
    if let Some(app_id) = app_id {
        args.push("--documents".to_string());
        args.push(app_id.to_string());
    }
    args.extend(["-o".to_string(), "nonempty".to_string(), path.to_string()]);
    args
}

/// Best-effort Documents-mode marker in a `mount` output line.
pub fn has_documents_marker(mount_line: &str) -> bool {
    mount_line.to_lowercase().contains("documents")
}

fn non_empty_or_unknown(text: &str) -> String {
    if text.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        text.trim().to_string()
    }
}
