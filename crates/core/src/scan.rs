//! Disk scanner.
//!
//! Walks a directory tree and collects the files whose sizes appear in the
//! torrent's manifest. Matching works purely by size (hashing individual files
//! against a torrent's piece-aligned hashes is not practical), so this size
//! pre-filter is what keeps the later matching combinatorics small.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// A file found on disk, a potential match for a torrent file slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCandidate {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Logical size in bytes.
    pub size: u64,
}

/// Files at or below this size are never worth hardlink-deduplicating;
/// merging unrelated zero/near-zero-byte files is all risk and no gain.
pub const HARDLINK_MIN_SIZE: u64 = 512;

/// Recursively scan `root` for regular files whose size is in `wanted_sizes`.
///
/// Entries that vanish or cannot be stat'ed between enumeration and inspection
/// are logged and skipped, never fatal. When `hardlink_mode` is set, files of
/// size <= [`HARDLINK_MIN_SIZE`] are excluded.
///
/// Traversal order is sorted by file name, so repeated scans of an unchanged
/// tree yield candidates in a stable order.
pub fn scan_candidates(
    root: &Path,
    wanted_sizes: &HashSet<u64>,
    hardlink_mode: bool,
) -> Vec<DiskCandidate> {
    let mut candidates = Vec::new();
    let mut total = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        total += 1;

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if hardlink_mode && size <= HARDLINK_MIN_SIZE {
            continue;
        }

        if wanted_sizes.contains(&size) {
            candidates.push(DiskCandidate {
                path: entry.into_path(),
                size,
            });
        }
    }

    debug!(
        "Scanned {} files under {}, {} match a wanted size",
        total,
        root.display(),
        candidates.len()
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_scan_filters_by_wanted_size() {
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("a/movie.mkv"), 1000);
        write_file(&temp.path().join("a/sub.srt"), 20);
        write_file(&temp.path().join("b/other.bin"), 999);

        let wanted: HashSet<u64> = [1000, 20].into_iter().collect();
        let found = scan_candidates(temp.path(), &wanted, false);

        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|c| c.size == 1000));
        assert!(found.iter().any(|c| c.size == 20));
    }

    #[test]
    fn test_scan_hardlink_mode_drops_tiny_files() {
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("tiny.srt"), 20);
        write_file(&temp.path().join("boundary.bin"), HARDLINK_MIN_SIZE as usize);
        write_file(&temp.path().join("big.mkv"), 1000);

        let wanted: HashSet<u64> = [20, HARDLINK_MIN_SIZE, 1000].into_iter().collect();
        let found = scan_candidates(temp.path(), &wanted, true);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 1000);
    }

    #[test]
    fn test_scan_missing_root_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        let wanted: HashSet<u64> = [1].into_iter().collect();

        let found = scan_candidates(&missing, &wanted, false);
        assert!(found.is_empty());
    }

    #[test]
    fn test_scan_order_is_stable() {
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("z/file.bin"), 500);
        write_file(&temp.path().join("a/file.bin"), 500);

        let wanted: HashSet<u64> = [500].into_iter().collect();
        let first = scan_candidates(temp.path(), &wanted, false);
        let second = scan_candidates(temp.path(), &wanted, false);

        assert_eq!(first, second);
        assert!(first[0].path.ends_with("a/file.bin"));
    }
}
