//! Run options for a reconciliation.

use std::path::PathBuf;

use crate::priorities::PriorityRule;

/// Everything that shapes one reconciliation run.
///
/// Torrent selection is either an explicit hash list or `all`; with neither
/// set the run is rejected as a configuration error before anything happens.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Info hashes to process. Takes precedence over `all`.
    pub hashes: Vec<String>,
    /// Process every torrent the client knows about.
    pub all: bool,
    /// Directory to scan for candidates. Must sit inside the download root.
    pub search_path: Option<PathBuf>,
    /// New download root for the torrents; triggers set-location + recheck.
    pub download_path: Option<PathBuf>,
    /// Scan the torrent's save path instead of its content directory.
    pub use_save_path: bool,
    /// Only match disk files sharing the slot's extension.
    pub match_extension: bool,
    /// Report what would happen without mutating anything.
    pub dry_run: bool,
    /// Consolidate matches via hardlink instead of renaming slots.
    pub hardlink_mode: bool,
    /// Zero the priority of slots with no disk match or declined conflicts.
    pub no_redownload: bool,
    /// Pattern-based priority overrides, tested in order.
    pub rules: Vec<PriorityRule>,
    /// Delete every file that reads back at priority zero, not just those
    /// matched by a deleting rule.
    pub delete_unwanted: bool,
}
