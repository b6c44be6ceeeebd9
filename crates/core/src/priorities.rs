//! Priority rules and the deletion pipeline.
//!
//! Independent of matching: every file of every selected torrent is tested
//! against the configured rules, priorities are adjusted through the torrent
//! client, and files that end up at "do not download" can be deleted from
//! disk. The live client may still hold a handle on such a file, so deletion
//! retries once through a pause/unlink/resume cycle.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::torrent_client::{FilePriority, TorrentClient, TorrentFileEntry};

/// How long to give the client to release a locked file before retrying.
const LOCKED_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A pattern-to-priority mapping used to bulk-classify files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRule {
    /// Case-insensitive substring matched against the file name.
    pub pattern: String,
    /// Priority to apply on match.
    pub priority: FilePriority,
    /// Delete the file from disk once its priority reads back as zero.
    pub delete_if_zero: bool,
}

/// Errors from parsing a rule given as `PATTERN=PRIORITY[,delete]`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("Rule must look like PATTERN=PRIORITY[,delete]: {0}")]
    MissingSeparator(String),

    #[error("Empty pattern in rule: {0}")]
    EmptyPattern(String),

    #[error("Invalid priority value '{0}' (expected 0, 1, 6 or 7)")]
    InvalidPriority(String),

    #[error("Unknown rule flag '{0}' (expected 'delete')")]
    UnknownFlag(String),
}

impl FromStr for PriorityRule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pattern, rest) = s
            .split_once('=')
            .ok_or_else(|| RuleParseError::MissingSeparator(s.to_string()))?;

        if pattern.trim().is_empty() {
            return Err(RuleParseError::EmptyPattern(s.to_string()));
        }

        let (priority_str, flag) = match rest.split_once(',') {
            Some((priority, flag)) => (priority, Some(flag)),
            None => (rest, None),
        };

        let wire: i64 = priority_str
            .trim()
            .parse()
            .map_err(|_| RuleParseError::InvalidPriority(priority_str.to_string()))?;
        if ![0, 1, 6, 7].contains(&wire) {
            return Err(RuleParseError::InvalidPriority(priority_str.to_string()));
        }

        let delete_if_zero = match flag.map(str::trim) {
            None => false,
            Some(f) if f.eq_ignore_ascii_case("delete") => true,
            Some(f) => return Err(RuleParseError::UnknownFlag(f.to_string())),
        };

        Ok(PriorityRule {
            pattern: pattern.trim().to_string(),
            priority: FilePriority::from_wire(wire),
            delete_if_zero,
        })
    }
}

/// Counters from one priority/deletion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PriorityReport {
    pub priorities_changed: usize,
    pub deleted: usize,
    pub delete_failures: usize,
}

/// First rule whose pattern occurs in the file's name, if any.
///
/// The name is taken from the last path component, separator-normalized, and
/// compared case-insensitively. First match wins both the priority and the
/// delete flag; later rules are not consulted for this file.
fn first_matching_rule<'r>(
    rules: &'r [PriorityRule],
    relative_path: &str,
) -> Option<&'r PriorityRule> {
    let normalized = relative_path.replace('\\', "/");
    let file_name = normalized.rsplit('/').next().unwrap_or(&normalized).to_lowercase();

    rules
        .iter()
        .find(|rule| file_name.contains(&rule.pattern.to_lowercase()))
}

/// Apply priority rules to every file of a torrent and delete unwanted files.
///
/// `files` is the local manifest view; priority changes are mirrored into it.
/// A file is only eligible for deletion when the global `delete_unwanted` flag
/// is set or it matched a rule with the delete flag — a file that already sits
/// at priority zero for unrelated reasons is never touched. Before any unlink
/// the file's priority is re-fetched from the client and must read back zero.
pub async fn apply_priority_rules(
    client: &dyn TorrentClient,
    hash: &str,
    files: &mut [TorrentFileEntry],
    rules: &[PriorityRule],
    delete_unwanted: bool,
    download_root: &Path,
    dry_run: bool,
) -> PriorityReport {
    let mut report = PriorityReport::default();

    if rules.is_empty() && !delete_unwanted {
        return report;
    }

    for file in files.iter_mut() {
        let matched = first_matching_rule(rules, &file.relative_path);

        if let Some(rule) = matched {
            if rule.priority != file.priority {
                if dry_run {
                    info!(
                        "Dry run: would set priority of '{}' to {:?}",
                        file.relative_path, rule.priority
                    );
                } else {
                    match client.set_file_priority(hash, &[file.index], rule.priority).await {
                        Ok(()) => {
                            info!(
                                "Priority of '{}' set to {:?}",
                                file.relative_path, rule.priority
                            );
                            file.priority = rule.priority;
                            report.priorities_changed += 1;
                        }
                        Err(e) => {
                            warn!(
                                "Failed to set priority of '{}': {}",
                                file.relative_path, e
                            );
                            continue;
                        }
                    }
                }
            }
        }

        let delete_requested = matched.is_some_and(|rule| rule.delete_if_zero);
        if !delete_unwanted && !delete_requested {
            continue;
        }

        if dry_run {
            if file.priority == FilePriority::DoNotDownload {
                info!("Dry run: would delete '{}'", file.relative_path);
            }
            continue;
        }

        // Never trust the snapshot for a destructive decision; the client's
        // view can lag the priority write we just issued.
        let fresh = match client.file(hash, file.index).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Could not re-fetch '{}': {}", file.relative_path, e);
                continue;
            }
        };
        if fresh.priority != FilePriority::DoNotDownload {
            debug!(
                "'{}' reads back at {:?}, not deleting",
                file.relative_path, fresh.priority
            );
            continue;
        }

        let on_disk = download_root.join(&file.relative_path);
        match delete_with_retry(client, hash, &on_disk, &|p| std::fs::remove_file(p)).await {
            DeleteOutcome::Deleted => {
                info!("Deleted '{}'", on_disk.display());
                report.deleted += 1;
            }
            DeleteOutcome::Missing => {
                debug!("'{}' already gone", on_disk.display());
            }
            DeleteOutcome::Failed => {
                report.delete_failures += 1;
            }
        }
    }

    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteOutcome {
    Deleted,
    Missing,
    Failed,
}

/// Errors the OS raises for a file some process still holds open.
fn is_locked_error(e: &std::io::Error) -> bool {
    // 26 = ETXTBSY, 32 = Windows sharing violation.
    e.kind() == std::io::ErrorKind::PermissionDenied
        || matches!(e.raw_os_error(), Some(26) | Some(32))
}

/// Unlink `path`, retrying once through a pause/resume cycle when locked.
///
/// The torrent is resumed whether or not the retry succeeds: a failed cleanup
/// must not leave the torrent paused as a side effect.
async fn delete_with_retry(
    client: &dyn TorrentClient,
    hash: &str,
    path: &Path,
    remove: &(dyn Fn(&Path) -> std::io::Result<()> + Sync),
) -> DeleteOutcome {
    match remove(path) {
        Ok(()) => return DeleteOutcome::Deleted,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return DeleteOutcome::Missing,
        Err(e) if is_locked_error(&e) => {
            warn!(
                "'{}' is in use, pausing torrent and retrying: {}",
                path.display(),
                e
            );
        }
        Err(e) => {
            warn!("Failed to delete '{}': {}", path.display(), e);
            return DeleteOutcome::Failed;
        }
    }

    if let Err(e) = client.pause(hash).await {
        warn!("Failed to pause torrent {}: {}", hash, e);
    }

    tokio::time::sleep(LOCKED_RETRY_DELAY).await;
    let retry = remove(path);

    if let Err(e) = client.resume(hash).await {
        warn!("Failed to resume torrent {}: {}", hash, e);
    }

    match retry {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeleteOutcome::Missing,
        Err(e) => {
            warn!(
                "Still cannot delete '{}' after pause/resume: {}",
                path.display(),
                e
            );
            DeleteOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClientEvent, MockTorrentClient};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn entry(index: i64, relative_path: &str, priority: FilePriority) -> TorrentFileEntry {
        TorrentFileEntry {
            index,
            relative_path: relative_path.to_string(),
            size: 1000,
            priority,
        }
    }

    #[test]
    fn test_rule_parsing() {
        let rule: PriorityRule = "sample=0,delete".parse().unwrap();
        assert_eq!(rule.pattern, "sample");
        assert_eq!(rule.priority, FilePriority::DoNotDownload);
        assert!(rule.delete_if_zero);

        let rule: PriorityRule = "trailer=1".parse().unwrap();
        assert_eq!(rule.priority, FilePriority::Normal);
        assert!(!rule.delete_if_zero);
    }

    #[test]
    fn test_rule_parsing_errors() {
        assert!(matches!(
            "nosuchformat".parse::<PriorityRule>(),
            Err(RuleParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "=0".parse::<PriorityRule>(),
            Err(RuleParseError::EmptyPattern(_))
        ));
        assert!(matches!(
            "x=3".parse::<PriorityRule>(),
            Err(RuleParseError::InvalidPriority(_))
        ));
        assert!(matches!(
            "x=0,purge".parse::<PriorityRule>(),
            Err(RuleParseError::UnknownFlag(_))
        ));
    }

    #[test]
    fn test_first_match_wins_priority_and_delete_flag() {
        let rules = vec![
            "sample=0,delete".parse::<PriorityRule>().unwrap(),
            "sample=1".parse::<PriorityRule>().unwrap(),
        ];

        let rule = first_matching_rule(&rules, "Show/Movie.Sample.mkv").unwrap();
        assert_eq!(rule.priority, FilePriority::DoNotDownload);
        assert!(rule.delete_if_zero);
    }

    #[test]
    fn test_matching_is_case_insensitive_and_name_based() {
        let rules = vec!["SAMPLE=0".parse::<PriorityRule>().unwrap()];
        assert!(first_matching_rule(&rules, "dir/movie.sample.mkv").is_some());
        // Pattern must occur in the file name, not in a folder component.
        assert!(first_matching_rule(&rules, "samples/movie.mkv").is_none());
        // Backslash-separated paths are normalized first.
        assert!(first_matching_rule(&rules, "dir\\movie.Sample.mkv").is_some());
    }

    #[tokio::test]
    async fn test_rule_match_sets_priority_and_deletes() {
        let temp = TempDir::new().unwrap();
        let on_disk = temp.path().join("Movie.Sample.mkv");
        std::fs::write(&on_disk, b"junk").unwrap();

        let client = MockTorrentClient::new();
        let mut files = vec![entry(0, "Movie.Sample.mkv", FilePriority::Normal)];
        client.add_mock_torrent_with_files("abc", temp.path(), &files).await;

        let rules = vec!["sample=0,delete".parse::<PriorityRule>().unwrap()];
        let report =
            apply_priority_rules(&client, "abc", &mut files, &rules, false, temp.path(), false)
                .await;

        assert_eq!(report.priorities_changed, 1);
        assert_eq!(report.deleted, 1);
        assert!(!on_disk.exists());
        assert_eq!(files[0].priority, FilePriority::DoNotDownload);

        // The unlink succeeded directly, so no pause/resume happened.
        let events = client.events().await;
        assert!(!events.iter().any(|e| matches!(e, MockClientEvent::Paused(_))));
    }

    #[tokio::test]
    async fn test_unmatched_zero_priority_file_is_never_deleted() {
        let temp = TempDir::new().unwrap();
        let on_disk = temp.path().join("keep.bin");
        std::fs::write(&on_disk, b"precious").unwrap();

        let client = MockTorrentClient::new();
        let mut files = vec![entry(0, "keep.bin", FilePriority::DoNotDownload)];
        client.add_mock_torrent_with_files("abc", temp.path(), &files).await;

        let rules = vec!["sample=0,delete".parse::<PriorityRule>().unwrap()];
        let report =
            apply_priority_rules(&client, "abc", &mut files, &rules, false, temp.path(), false)
                .await;

        assert_eq!(report.deleted, 0);
        assert!(on_disk.exists());
    }

    #[tokio::test]
    async fn test_delete_unwanted_flag_covers_unmatched_zero_priority_files() {
        let temp = TempDir::new().unwrap();
        let on_disk = temp.path().join("unwanted.bin");
        std::fs::write(&on_disk, b"junk").unwrap();

        let client = MockTorrentClient::new();
        let mut files = vec![entry(0, "unwanted.bin", FilePriority::DoNotDownload)];
        client.add_mock_torrent_with_files("abc", temp.path(), &files).await;

        let report =
            apply_priority_rules(&client, "abc", &mut files, &[], true, temp.path(), false).await;

        assert_eq!(report.deleted, 1);
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_refetch_gates_deletion() {
        let temp = TempDir::new().unwrap();
        let on_disk = temp.path().join("Movie.Sample.mkv");
        std::fs::write(&on_disk, b"junk").unwrap();

        let client = MockTorrentClient::new();
        let mut files = vec![entry(0, "Movie.Sample.mkv", FilePriority::Normal)];
        client.add_mock_torrent_with_files("abc", temp.path(), &files).await;
        // The priority write lands but is not reflected back; the re-fetch
        // must veto deletion.
        client.ignore_priority_changes(true).await;

        let rules = vec!["sample=0,delete".parse::<PriorityRule>().unwrap()];
        let report =
            apply_priority_rules(&client, "abc", &mut files, &rules, false, temp.path(), false)
                .await;

        assert_eq!(report.deleted, 0);
        assert!(on_disk.exists());
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let on_disk = temp.path().join("Movie.Sample.mkv");
        std::fs::write(&on_disk, b"junk").unwrap();

        let client = MockTorrentClient::new();
        let mut files = vec![entry(0, "Movie.Sample.mkv", FilePriority::Normal)];
        client.add_mock_torrent_with_files("abc", temp.path(), &files).await;

        let rules = vec!["sample=0,delete".parse::<PriorityRule>().unwrap()];
        let report =
            apply_priority_rules(&client, "abc", &mut files, &rules, false, temp.path(), true)
                .await;

        assert_eq!(report, PriorityReport::default());
        assert!(on_disk.exists());
        assert!(client.events().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_file_pauses_retries_and_resumes() {
        let client = MockTorrentClient::new();
        client.add_mock_torrent_with_files("abc", Path::new("/d"), &[]).await;

        let attempts = AtomicUsize::new(0);
        let remove = |_: &Path| -> std::io::Result<()> {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::from_raw_os_error(26)) // ETXTBSY
            } else {
                Ok(())
            }
        };

        let outcome =
            delete_with_retry(&client, "abc", &PathBuf::from("/d/locked.bin"), &remove).await;

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let events = client.events().await;
        assert_eq!(
            events,
            vec![
                MockClientEvent::Paused("abc".to_string()),
                MockClientEvent::Resumed("abc".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_file_resumes_even_when_retry_fails() {
        let client = MockTorrentClient::new();
        client.add_mock_torrent_with_files("abc", Path::new("/d"), &[]).await;

        let remove =
            |_: &Path| -> std::io::Result<()> { Err(std::io::Error::from_raw_os_error(26)) };

        let outcome =
            delete_with_retry(&client, "abc", &PathBuf::from("/d/locked.bin"), &remove).await;

        assert_eq!(outcome, DeleteOutcome::Failed);
        let events = client.events().await;
        assert_eq!(
            events,
            vec![
                MockClientEvent::Paused("abc".to_string()),
                MockClientEvent::Resumed("abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_is_locked_error() {
        assert!(is_locked_error(&std::io::Error::from_raw_os_error(26)));
        assert!(is_locked_error(&std::io::Error::from_raw_os_error(32)));
        assert!(is_locked_error(&std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied"
        )));
        assert!(!is_locked_error(&std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone"
        )));
    }
}
