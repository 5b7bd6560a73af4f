//! Mount lifecycle: the mount table, the mount point directory and the state machine on top.

pub mod errors;
pub mod lifecycle;
pub mod point;
pub mod table;

#[cfg(test)]
pub(crate) mod mock_host;

pub use errors::{MountError, classify_helper_error};
pub use lifecycle::{LifecycleState, MountKind, MountLifecycle, MountMode, MountOutcome, ResetOutcome, UnmountOutcome};
pub use point::{MountPointManager, RemediationStep};
pub use table::{MountTable, SystemMountTable};
