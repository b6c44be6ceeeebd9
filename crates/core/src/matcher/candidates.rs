//! Candidate filtering for one torrent file slot.

use std::path::PathBuf;

use crate::scan::DiskCandidate;
use crate::torrent_client::TorrentFileEntry;

use super::types::{file_extension, MatchContext};

/// Disk candidates that could satisfy `torrent_file`.
///
/// Pure filter over the scanned set: equal size, optionally equal lowercased
/// extension, and not already claimed by an earlier slot in this pass. Order
/// follows the scan order, so results are deterministic for a given tree.
pub fn find_candidates(
    torrent_file: &TorrentFileEntry,
    disk_candidates: &[DiskCandidate],
    ctx: &MatchContext,
    require_same_extension: bool,
) -> Vec<PathBuf> {
    let wanted_extension = file_extension(&torrent_file.relative_path);

    disk_candidates
        .iter()
        .filter(|candidate| candidate.size == torrent_file.size)
        .filter(|candidate| {
            !require_same_extension
                || file_extension(&candidate.path.to_string_lossy()) == wanted_extension
        })
        .filter(|candidate| !ctx.is_claimed(&candidate.path))
        .map(|candidate| candidate.path.clone())
        .collect()
}
