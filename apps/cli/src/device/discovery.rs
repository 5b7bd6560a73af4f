//! Connected device discovery.
//!
//! Wraps the device lister (`idevice_id -l`), which prints one UDID per line.

use log::{debug, warn};

use super::types::DeviceId;
use crate::process::ProcessRunner;

/// Lists the identifiers of all connected devices.
///
/// Returns an empty vector if the lister fails or prints nothing (graceful degradation).
pub fn list_device_ids(runner: &dyn ProcessRunner, device_lister: &str) -> Vec<DeviceId> {
    let output = runner.run(device_lister, &["-l"]);
    if !output.success() {
        warn!("{} -l failed: {}", device_lister, output.error_text());
        return Vec::new();
    }

    let ids: Vec<DeviceId> = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!("Found {} device(s)", ids.len());
    ids
}

/// Returns the device to mount: the first one listed.
pub fn first_device_id(runner: &dyn ProcessRunner, device_lister: &str) -> Option<DeviceId> {
    list_device_ids(runner, device_lister).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::mock_host::MockHost;
    use crate::process::CommandOutput;

    #[test]
    fn test_first_device_is_selected() {
        let host = MockHost::new();
        host.respond("idevice_id", CommandOutput::ok("00008030-AAAA\n00008030-BBBB\n"));
        assert_eq!(first_device_id(&host, "idevice_id"), Some("00008030-AAAA".to_string()));
        assert_eq!(host.calls(), vec!["idevice_id -l"]);
    }

    #[test]
    fn test_empty_output_means_no_device() {
        let host = MockHost::new();
        host.respond("idevice_id", CommandOutput::ok("\n"));
        assert!(list_device_ids(&host, "idevice_id").is_empty());
        assert_eq!(first_device_id(&host, "idevice_id"), None);
    }

    #[test]
    fn test_failed_lister_means_no_device() {
        let host = MockHost::new();
        host.respond("idevice_id", CommandOutput::failed(1, "ERROR: Unable to connect"));
        assert_eq!(first_device_id(&host, "idevice_id"), None);
    }
}
