//! Presence check for the external helper programs.

use log::{debug, warn};
use serde::Serialize;

use crate::config::HelperPrograms;
use crate::process::ProcessRunner;

/// A helper program that isn't on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingTool {
    pub program: String,
    pub install_hint: String,
}

fn install_hint(program: &str) -> String {
    match program {
        "ifuse" => "ifuse command is required to mount iPhone. Install with: sudo apt install ifuse".to_string(),
        "idevice_id" => "idevice_id command is required to detect iPhone. \
                         Install with: sudo apt install libimobiledevice-utils"
            .to_string(),
        "fusermount" => "fusermount command is required to mount filesystem. Install with: sudo apt install fuse"
            .to_string(),
        other => format!("{} command is required. Install it or fix the helper name in config.json", other),
    }
}

/// Returns one entry per required helper that `which` can't find.
pub fn missing_requirements(runner: &dyn ProcessRunner, helpers: &HelperPrograms) -> Vec<MissingTool> {
    let required = [&helpers.mount_helper, &helpers.device_lister, &helpers.unmount_helper];
    let missing: Vec<MissingTool> = required
        .into_iter()
        .filter(|program| {
            let found = runner.run("which", &[program.as_str()]).success();
            debug!("{}: {}", program, if found { "found" } else { "missing" });
            !found
        })
        .map(|program| MissingTool {
            program: program.clone(),
            install_hint: install_hint(program),
        })
        .collect();

    if !missing.is_empty() {
        warn!(
            "Missing helpers: {}",
            missing.iter().map(|tool| tool.program.as_str()).collect::<Vec<_>>().join(", ")
        );
    }
    missing
}
