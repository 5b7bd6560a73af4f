//! Error types for mount lifecycle operations.

use serde::Serialize;

/// Longest helper error text carried in an error, in characters.
pub const MAX_DETAIL_CHARS: usize = 200;

/// Final, classified outcome of a failed lifecycle operation.
///
/// Intermediate failures inside a remediation sequence never show up here. They are logged
/// and the sequence moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MountError {
    /// The device lister returned no device.
    NoDeviceFound,
    /// The mount helper reported a permission failure.
    PermissionDenied { detail: String },
    /// The mount directory can't be created or cleaned by ordinary means.
    MountPointBroken { path: String, detail: String },
    /// Any other helper failure, with the helper's own (truncated) error text.
    HelperFailure { detail: String },
    /// Documents mode was requested but no app exposes a Documents folder.
    NoSharingApps,
    /// Unmount ran but the OS still reports the mount. Carries the mount-table line.
    StillMounted { detail: String },
}

impl MountError {
    /// Returns a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoDeviceFound => "No iPhone device found. Please make sure it's connected and unlocked.".to_string(),
            Self::PermissionDenied { detail } => format!(
                "Permission denied when mounting iPhone ({}).\n\nTry running the app with sudo or as root.",
                detail
            ),
            Self::MountPointBroken { path, detail } => format!(
                "The mount point {} can't be prepared: {}\n\nUse \"reset\" to recreate it. If that fails, \"deep-clean\" \
                 fixes it with sudo.",
                path, detail
            ),
            Self::HelperFailure { detail } => format!("Failed to mount iPhone: {}", detail),
            Self::NoSharingApps => "No apps with file sharing found.".to_string(),
            Self::StillMounted { detail } => format!(
                "Failed to unmount iPhone: {}\n\nTry \"deep-clean\" to force it.",
                detail
            ),
        }
    }
}

impl std::fmt::Display for MountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDeviceFound => write!(f, "No device found"),
            Self::PermissionDenied { detail } => write!(f, "Permission denied: {detail}"),
            Self::MountPointBroken { path, detail } => write!(f, "Mount point {path} is broken: {detail}"),
            Self::HelperFailure { detail } => write!(f, "Mount helper failed: {detail}"),
            Self::NoSharingApps => write!(f, "No apps with file sharing found"),
            Self::StillMounted { detail } => write!(f, "Still mounted: {detail}"),
        }
    }
}

impl std::error::Error for MountError {}

/// What the mount helper's error text says went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperErrorKind {
    NoDevice,
    PermissionDenied,
    Generic,
}

/// Classifies mount helper error text. All the substrings we match on live here.
pub fn classify_helper_error(text: &str) -> HelperErrorKind {
    if text.contains("No device found") {
        HelperErrorKind::NoDevice
    } else if text.contains("Permission denied") {
        HelperErrorKind::PermissionDenied
    } else {
        HelperErrorKind::Generic
    }
}

/// Turns helper error text into the matching [`MountError`].
pub fn mount_error_from_helper(text: &str) -> MountError {
    let text = if text.trim().is_empty() { "Unknown error" } else { text.trim() };
    match classify_helper_error(text) {
        HelperErrorKind::NoDevice => MountError::NoDeviceFound,
        HelperErrorKind::PermissionDenied => MountError::PermissionDenied {
            detail: truncate_detail(text),
        },
        HelperErrorKind::Generic => MountError::HelperFailure {
            detail: truncate_detail(text),
        },
    }
}

/// Cuts helper output down to [`MAX_DETAIL_CHARS`] characters, marking the cut with "...".
pub fn truncate_detail(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    truncated.push_str("...");
    truncated
}
