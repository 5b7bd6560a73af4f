//! User interaction the core needs mid-operation.
//!
//! The core never talks to a UI toolkit directly. Choosing an app for Documents mode and
//! confirming escalations go through this trait, implemented by the front-end.

use crate::device::AppEntry;

/// Synchronous prompts issued by lifecycle operations.
pub trait Prompter {
    /// Asks the user to pick one app. Returns its app id, or `None` if cancelled.
    fn select_app(&self, apps: &[AppEntry]) -> Option<String>;

    /// Asks a yes/no question.
    fn confirm(&self, question: &str) -> bool;
}
