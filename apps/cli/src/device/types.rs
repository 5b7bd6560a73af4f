//! Device and app identifiers passed between discovery, the prompter and the lifecycle.

use serde::{Deserialize, Serialize};

/// Opaque device identifier (UDID) as printed by the device lister.
///
/// Fetched fresh for every mount attempt, since the connected device can change between
/// operations.
pub type DeviceId = String;

/// An app that exposes a Documents folder through file sharing.
///
/// Only lives for one selection prompt; the app list is re-read for every Documents mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEntry {
    /// Bundle identifier, for example "com.example.app".
    pub app_id: String,
    pub display_name: String,
}

impl AppEntry {
    pub fn new(app_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the label shown in the selection prompt: "Example App (com.example.app)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.display_name, self.app_id)
    }
}
