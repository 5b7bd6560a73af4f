//! Apps with file sharing, as reported by `ifuse --list-apps`.
//!
//! Each output line is a comma-separated record: app id, version, then the quoted display
//! name (which may itself contain commas).

use log::{debug, warn};

use super::types::AppEntry;
use crate::process::ProcessRunner;

/// Lists apps that expose a Documents folder. Empty if the helper fails.
pub fn list_apps(runner: &dyn ProcessRunner, mount_helper: &str) -> Vec<AppEntry> {
    let output = runner.run(mount_helper, &["--list-apps"]);
    if !output.success() {
        warn!("{} --list-apps failed: {}", mount_helper, output.error_text());
        return Vec::new();
    }
    let apps = parse_app_list(&output.stdout);
    debug!("Found {} app(s) with file sharing", apps.len());
    apps
}

/// Parses `--list-apps` output. Blank lines and records with fewer than three fields are
/// skipped, as is the header line some helper versions print.
pub fn parse_app_list(output: &str) -> Vec<AppEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let parts: Vec<&str> = line.splitn(3, ',').collect();
            if parts.len() < 3 {
                debug!("Skipping malformed app line: {}", line);
                return None;
            }
            let app_id = parts[0].trim();
            let display_name = parts[2].trim().trim_matches('"');
            if app_id.is_empty() || app_id == "CFBundleIdentifier" {
                return None;
            }
            Some(AppEntry::new(app_id, display_name))
        })
        .collect()
}
