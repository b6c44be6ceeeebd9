//! Matching session state and resolution outcomes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Mutable state of one reconciliation session.
///
/// The claims set enforces the at-most-one-slot-per-disk-file invariant and is
/// reset at the start of every torrent's pass. The ignore sets are answers the
/// user already gave ("everything under X is noise") and live for the whole
/// run — re-asking for every remaining file under X would make large
/// reconciliations unusable. Nothing here is ever persisted across runs.
#[derive(Debug, Default)]
pub struct MatchContext {
    matched: HashSet<PathBuf>,
    ignored_subfolders: HashSet<PathBuf>,
    ignored_extensions: HashSet<String>,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-torrent claims; ignore memory survives.
    pub fn begin_pass(&mut self) {
        self.matched.clear();
    }

    /// Claim a disk path for a file slot. Returns false if already claimed.
    pub fn claim(&mut self, path: &Path) -> bool {
        self.matched.insert(path.to_path_buf())
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.matched.contains(path)
    }

    /// Ignore every file under `folder` for the rest of the run.
    pub fn ignore_subfolder(&mut self, folder: &Path) {
        self.ignored_subfolders.insert(folder.to_path_buf());
    }

    /// Ignore every file with this (lowercase, dot-free) extension for the rest of the run.
    pub fn ignore_extension(&mut self, extension: &str) {
        self.ignored_extensions.insert(extension.to_lowercase());
    }

    /// Whether `path` sits under any ignored subfolder.
    pub fn is_under_ignored_subfolder(&self, path: &Path) -> bool {
        path.ancestors()
            .skip(1)
            .any(|ancestor| self.ignored_subfolders.contains(ancestor))
    }

    pub fn is_extension_ignored(&self, extension: &str) -> bool {
        self.ignored_extensions.contains(&extension.to_lowercase())
    }
}

/// Outcome of disambiguating one torrent file slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One disk file was chosen for this slot.
    Selected(PathBuf),
    /// Leave the slot alone.
    Skip,
    /// Physically merge the candidate set via hardlinks.
    Consolidate(Vec<PathBuf>),
}

/// Lowercased file extension of a path or slot name, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
