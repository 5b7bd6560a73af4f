//! Bounded, batched walk of the mounted tree.
//!
//! In media mode, known vendor subtrees are pruned before descent and each remaining file goes
//! through the classifier. Documents mode lists everything. Results come out in batches so a
//! caller can render as it goes, and the walk stops once the entry ceiling is reached.

use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::classifier::{is_hidden, matches_system_prefix};
use crate::config::ListingLimits;
use crate::mount::MountMode;

type PruneFn = Box<dyn FnMut(&DirEntry) -> bool>;

/// Counters for one enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumerationSummary {
    pub listed: usize,
    /// Files seen but classified as metadata. Pruned subtrees aren't counted.
    pub hidden: usize,
    /// True if the ceiling was hit before the walk completed.
    pub truncated: bool,
    /// Directories (or entries) that couldn't be read and were skipped.
    pub skipped_dirs: usize,
}

impl EnumerationSummary {
    /// Listed plus hidden files, as far as the walk got.
    pub fn total_seen(&self) -> usize {
        self.listed + self.hidden
    }
}

impl fmt::Display for EnumerationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} files listed", self.listed)?;
        if self.hidden > 0 {
            write!(f, " ({} system files hidden)", self.hidden)?;
        }
        if self.truncated {
            write!(f, " (limited, {} files seen so far)", self.total_seen())?;
        }
        if self.skipped_dirs > 0 {
            write!(f, " ({} unreadable entries skipped)", self.skipped_dirs)?;
        }
        Ok(())
    }
}

/// Walks a mounted tree and yields batches of relative paths.
///
/// Finite and not restartable. Make a new one to list again.
pub struct TreeEnumerator {
    root: PathBuf,
    walker: walkdir::FilterEntry<walkdir::IntoIter, PruneFn>,
    filter_metadata: bool,
    limits: ListingLimits,
    summary: EnumerationSummary,
    finished: bool,
}

impl TreeEnumerator {
    pub fn new(root: &Path, mode: &MountMode, limits: ListingLimits) -> Self {
        let filter_metadata = matches!(mode, MountMode::Media);
        let prune_root = root.to_path_buf();
        let keep: PruneFn = Box::new(move |entry: &DirEntry| {
            if !filter_metadata || !entry.file_type().is_dir() {
                return true;
            }
            let relative = relative_path(&prune_root, entry.path());
            if matches_system_prefix(&relative) {
                debug!("Pruning {}", relative);
                return false;
            }
            true
        });

        Self {
            root: root.to_path_buf(),
            walker: WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(keep),
            filter_metadata,
            limits,
            summary: EnumerationSummary::default(),
            finished: false,
        }
    }

    pub fn summary(&self) -> EnumerationSummary {
        self.summary
    }
}

impl Iterator for TreeEnumerator {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.limits.batch_size.min(1024));
        loop {
            if self.summary.listed >= self.limits.max_entries {
                // Stop at the ceiling; anything left in the walk means the listing is cut short
                self.summary.truncated = self.walker.next().is_some();
                self.finished = true;
                break;
            }
            let Some(item) = self.walker.next() else {
                self.finished = true;
                break;
            };
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    self.summary.skipped_dirs += 1;
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let relative = relative_path(&self.root, entry.path());
            if self.filter_metadata && is_hidden(&relative) {
                self.summary.hidden += 1;
                continue;
            }
            self.summary.listed += 1;
            batch.push(relative);
            if batch.len() >= self.limits.batch_size {
                break;
            }
        }

        if batch.is_empty() { None } else { Some(batch) }
    }
}

/// A finished listing of the mounted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Mode the listing was taken in.
    pub mode: MountMode,
    pub entries: Vec<String>,
    pub summary: EnumerationSummary,
}

impl Listing {
    /// Entries whose path contains `term`, ignoring case. A blank term matches nothing.
    pub fn search(&self, term: &str) -> Vec<&str> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|entry| entry.to_lowercase().contains(&term))
            .map(String::as_str)
            .collect()
    }
}

/// Runs a full enumeration, handing each batch to `on_batch` as it fills.
pub fn collect_listing(
    root: &Path,
    mode: &MountMode,
    limits: ListingLimits,
    on_batch: &mut dyn FnMut(&[String]),
) -> Listing {
    let mut enumerator = TreeEnumerator::new(root, mode, limits);
    let mut entries = Vec::new();
    for batch in &mut enumerator {
        on_batch(&batch);
        entries.extend(batch);
    }
    let summary = enumerator.summary();
    info!("Listed {}: {}", root.display(), summary);
    Listing {
        mode: mode.clone(),
        entries,
        summary,
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().into_owned()
}
