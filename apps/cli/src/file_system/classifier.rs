//! Tells user content apart from device and vendor metadata in a mounted media store.
//!
//! Paths are relative to the mount point and `/`-separated. All matching is case-sensitive.

// ── System directories ──────────────────────────────────────────────

/// Directories whose whole subtree is vendor metadata. A path matches if it equals one of
/// these or starts with it followed by `/`. The enumerator also uses this list to skip
/// descending into these subtrees at all.
pub const SYSTEM_DIR_PREFIXES: &[&str] = &[
    // Photos and media
    "PhotoData/Catches",
    "PhotoData/AlbumsMetadata",
    "PhotoData/Mutations",
    "PhotoData/Sync",
    "PhotoData/Thumbnails",
    "PhotoData/Videos",
    "PhotoData/CPLAssets",
    "PhotoData/Metadata",
    "MediaAnalysis",
    "MotionAssets",
    // iTunes and media library
    "iTunes_Control",
    "iTunes-control",
    "iTunesControl",
    "Books",
    "Podcasts",
    "Recordings",
    "Purchases",
    // Caches and metadata
    ".Spotlight-V100",
    ".DocumentRevisions-V100",
    ".TemporaryItems",
    ".Trashes",
    ".fseventsd",
    ".Trash",
    ".com.apple",
    // Camera internals
    "DCIM/.MISC",
    "DCIM/.thumbnails",
    "DCIM/.TRACES",
    // System, keychains, backups
    "System",
    "private/var/mobile/Library/Caches",
    "private/var/mobile/Library/Logs",
    "private/var/mobile/Library/Preferences",
    "private/var/root",
    "private/var/Keychains",
    "private/var/stash",
    "private/etc",
    "private/tmp",
    "private/var/MobileDevice",
    "private/var/containers",
    "private/var/db",
    "private/var/keybags",
];

// ── Metadata patterns ───────────────────────────────────────────────

/// Substrings that mark a path as metadata anywhere they occur.
pub const SYSTEM_PATTERNS: &[&str] = &[
    // Extensions
    ".lock",
    ".DS_Store",
    ".ithmb",
    ".plist",
    ".albummetadata",
    ".memorymetadata",
    ".facemetadata",
    ".log",
    ".sqlite",
    ".sqlitedb",
    ".sqlite-shm",
    ".sqlite-wal",
    ".db",
    ".dat",
    ".tmp",
    ".pb",
    ".cache",
    ".ptl",
    ".crashreport",
    ".btree",
    ".strings",
    ".itc",
    ".itdb",
    ".itl",
    ".bak",
    ".mdbackup",
    ".mddata",
    ".thumb",
    ".journal",
    ".synctoken",
    ".artwork",
    ".bat",
    // Name fragments
    "Thumbs.db",
    "thumbs",
    "iTunesMetadata",
    "iTunesArtwork",
    "iTunesPrefs",
    "iTunesTouch",
    "iTunesSync",
    "CoverFlow",
    "Manifest.",
    "SyncData",
    "Recordings",
    "PhotoData",
    ".config",
    // Apple system files
    ".Trashes",
    "__MACOSX",
    ".fseventsd",
    ".metadata_",
    ".com.apple",
    "._",
    ".DocumentRevisions-",
    "DCIM/.MISC",
];

/// True if the path is vendor metadata that a media listing hides.
///
/// Pure and total: any string, including the empty one, gets an answer. Dotfiles are always
/// hidden.
pub fn is_hidden(relative_path: &str) -> bool {
    matches_system_prefix(relative_path) || matches_system_pattern(relative_path) || is_dotfile(relative_path)
}

/// The path-prefix rule alone. Used for subtree pruning.
pub fn matches_system_prefix(relative_path: &str) -> bool {
    SYSTEM_DIR_PREFIXES.iter().any(|dir| {
        relative_path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

pub fn matches_system_pattern(relative_path: &str) -> bool {
    SYSTEM_PATTERNS.iter().any(|pattern| relative_path.contains(pattern))
}

fn is_dotfile(relative_path: &str) -> bool {
    relative_path.rsplit('/').next().is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_content_is_visible() {
        assert!(!is_hidden("DCIM/100APPLE/IMG_0001.JPG"));
        assert!(!is_hidden("DCIM/100APPLE/IMG_0002.HEIC"));
        assert!(!is_hidden("Downloads/report.pdf"));
    }

    #[test]
    fn test_prefix_rule() {
        assert!(is_hidden(".Trashes/file1"));
        assert!(is_hidden("PhotoData/Thumbnails/V2/x.jpg"));
        assert!(is_hidden("iTunes_Control/Music/F00/abc.mp3"));
        assert!(is_hidden("MediaAnalysis"));
        assert!(matches_system_prefix("System"));
        assert!(matches_system_prefix("private/var/db/x"));
    }

    #[test]
    fn test_prefix_rule_needs_a_whole_component() {
        assert!(!matches_system_prefix("Systematic/notes.txt"));
        assert!(!matches_system_prefix("BooksToRead/list.txt"));
        assert!(!matches_system_prefix("MotionAssetsBackup"));
    }

    #[test]
    fn test_prefixes_with_and_without_trailing_slash_agree() {
        // "MotionAssets" and "iTunes_Control" are separate entries
        assert!(matches_system_prefix("MotionAssets/a"));
        assert!(matches_system_prefix("iTunes_Control"));
        assert!(SYSTEM_DIR_PREFIXES.iter().all(|dir| !dir.ends_with('/')));
    }

    #[test]
    fn test_pattern_rule() {
        assert!(is_hidden(".cache/db.sqlite"));
        assert!(is_hidden("Downloads/Photos.sqlite-wal"));
        assert!(is_hidden("DCIM/100APPLE/IMG_0001.JPG.plist"));
        assert!(is_hidden("Music/Thumbs.db"));
        assert!(is_hidden("Vacation/Manifest.mbdb"));
    }

    #[test]
    fn test_dotfiles_are_always_hidden() {
        assert!(is_hidden(".hidden"));
        assert!(is_hidden("DCIM/100APPLE/.IMG_0001.JPG"));
        assert!(is_hidden("a/b/c/.x"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!is_hidden("system/readme.txt"));
        assert!(is_hidden("System/readme.txt"));
    }

    #[test]
    fn test_total_on_odd_input() {
        assert!(!is_hidden(""));
        assert!(!is_hidden("/"));
        assert!(!is_hidden("a//b"));
        assert!(is_hidden("."));
    }
}
