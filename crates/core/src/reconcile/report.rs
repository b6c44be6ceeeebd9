//! Run reporting.

use crate::priorities::PriorityReport;

/// Per-torrent outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentReport {
    pub hash: String,
    pub name: String,
    /// Slots renamed to adopt a disk file.
    pub renamed: usize,
    /// Candidate sets merged via hardlink.
    pub consolidated: usize,
    /// Slots whose disk file was already in the expected place.
    pub already_placed: usize,
    /// Actions reported but not performed (dry run).
    pub planned: usize,
    /// Slots skipped by a user decision or ignore rule.
    pub skipped: usize,
    /// Slots with no disk candidate at all.
    pub not_found: usize,
    /// Renames rejected because the destination was occupied.
    pub conflicts: usize,
    /// Local failures that were logged and stepped over.
    pub errors: usize,
    /// Priority writes issued by the rule pipeline.
    pub priorities_changed: usize,
    /// Files deleted by the rule pipeline.
    pub deleted: usize,
    /// Deletions that failed even after the pause/retry cycle.
    pub delete_failures: usize,
}

impl TorrentReport {
    pub fn new(hash: &str, name: &str) -> Self {
        Self {
            hash: hash.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn absorb_priorities(&mut self, report: PriorityReport) {
        self.priorities_changed += report.priorities_changed;
        self.deleted += report.deleted;
        self.delete_failures += report.delete_failures;
    }
}

/// Outcome of a whole run, one entry per processed torrent.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub torrents: Vec<TorrentReport>,
}

impl RunReport {
    /// Total slots renamed across all torrents.
    pub fn total_renamed(&self) -> usize {
        self.torrents.iter().map(|t| t.renamed).sum()
    }

    /// Total slots with no disk candidate.
    pub fn total_not_found(&self) -> usize {
        self.torrents.iter().map(|t| t.not_found).sum()
    }

    /// Whether any local error was stepped over during the run.
    pub fn had_errors(&self) -> bool {
        self.torrents
            .iter()
            .any(|t| t.errors > 0 || t.delete_failures > 0)
    }
}
