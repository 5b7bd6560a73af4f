//! Device-side helpers: connected device discovery and the app list for Documents mode.

pub mod apps;
pub mod discovery;
mod types;

pub use apps::{list_apps, parse_app_list};
pub use discovery::{first_device_id, list_device_ids};
pub use types::{AppEntry, DeviceId};
