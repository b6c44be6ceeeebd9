//! The reconciliation orchestrator.
//!
//! Sequences scan -> match -> disambiguate -> act across all files of a
//! torrent, across all selected torrents, then runs the priority pipeline and
//! triggers a recheck when the pass changed anything the client should
//! re-verify. Strictly sequential: one torrent, one file slot at a time, so
//! claims against the session's matched set are totally ordered.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::choice::Chooser;
use crate::consolidate::consolidate_paths;
use crate::fsmeta::{same_underlying_file, FsMeta};
use crate::matcher::{file_extension, find_candidates, resolve_ambiguity, MatchContext, Resolution};
use crate::priorities::apply_priority_rules;
use crate::scan::scan_candidates;
use crate::torrent_client::{
    FilePriority, TorrentClient, TorrentClientError, TorrentFileEntry, TorrentFilter, TorrentInfo,
};

use super::options::ReconcileOptions;
use super::report::{RunReport, TorrentReport};
use super::ReconcileError;

const CONFLICT_HARDLINK_OPTION: &str = "<Consolidate via hardlink instead>";
const CONFLICT_SKIP_OPTION: &str = "<Leave the slot as it is>";

/// Search and download roots derived for one torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TorrentPaths {
    search_root: PathBuf,
    download_root: PathBuf,
}

/// Drives one reconciliation run against a set of collaborators.
pub struct Reconciler {
    client: Arc<dyn TorrentClient>,
    chooser: Arc<dyn Chooser>,
    fsmeta: Arc<dyn FsMeta>,
    options: ReconcileOptions,
    ctx: MatchContext,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn TorrentClient>,
        chooser: Arc<dyn Chooser>,
        fsmeta: Arc<dyn FsMeta>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            client,
            chooser,
            fsmeta,
            options,
            ctx: MatchContext::new(),
        }
    }

    /// Run the full reconciliation.
    ///
    /// Structural problems (nothing selected, no torrents found, a search path
    /// outside the download root) abort before any mutation. Everything at the
    /// single-file level is logged, counted, and stepped over.
    pub async fn run(&mut self) -> Result<RunReport, ReconcileError> {
        let filter = if !self.options.hashes.is_empty() {
            TorrentFilter::for_hashes(&self.options.hashes)
        } else if self.options.all {
            TorrentFilter::default()
        } else {
            return Err(ReconcileError::Configuration(
                "no torrents selected; pass hashes or enable processing of all torrents".into(),
            ));
        };

        let torrents = self.client.list_torrents(&filter).await?;
        if torrents.is_empty() {
            return Err(ReconcileError::NoTorrents);
        }

        for requested in &self.options.hashes {
            let requested = requested.to_lowercase();
            if !torrents.iter().any(|t| t.hash == requested) {
                warn!("Torrent with hash '{}' not found", requested);
            }
        }

        // Path constraints are validated for every torrent up front, so a bad
        // search path aborts before the first mutation rather than mid-run.
        let mut planned = Vec::with_capacity(torrents.len());
        for info in &torrents {
            planned.push(self.derive_paths(info)?);
        }

        let mut run_report = RunReport::default();
        for (info, paths) in torrents.iter().zip(planned) {
            info!("Processing torrent '{}' ({})", info.name, info.hash);
            debug!(
                "Search root '{}', download root '{}'",
                paths.search_root.display(),
                paths.download_root.display()
            );

            match self.process_torrent(info, &paths).await {
                Ok(report) => run_report.torrents.push(report),
                Err(ReconcileError::Client(e)) => {
                    warn!("Skipping torrent '{}': {}", info.name, e);
                    let mut report = TorrentReport::new(&info.hash, &info.name);
                    report.errors += 1;
                    run_report.torrents.push(report);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(run_report)
    }

    /// Derive where to scan and what the download root is for one torrent.
    ///
    /// A download-path override re-roots the content path under the new
    /// location. An explicit search path must sit inside the download root.
    /// Otherwise the content directory is scanned when it exists, falling back
    /// to the download root (also forced by the use-save-path flag).
    fn derive_paths(&self, info: &TorrentInfo) -> Result<TorrentPaths, ReconcileError> {
        let mut content_path = PathBuf::from(&info.content_path);
        let mut download_root = PathBuf::from(&info.save_path);

        if let Some(new_root) = &self.options.download_path {
            let relative = content_path.strip_prefix(&download_root).map_err(|_| {
                ReconcileError::Configuration(format!(
                    "content path '{}' is not under save path '{}'",
                    content_path.display(),
                    download_root.display()
                ))
            })?;
            content_path = new_root.join(relative);
            download_root = new_root.clone();
        }

        let download_root = resolve_lenient(&download_root);

        let search_root = if let Some(search) = &self.options.search_path {
            let search = resolve_lenient(search);
            if !search.starts_with(&download_root) {
                return Err(ReconcileError::Configuration(format!(
                    "search path '{}' must be a subdirectory of the download path '{}'",
                    search.display(),
                    download_root.display()
                )));
            }
            search
        } else if self.options.use_save_path || !content_path.exists() {
            download_root.clone()
        } else if content_path.is_dir() {
            resolve_lenient(&content_path)
        } else {
            content_path
                .parent()
                .map(resolve_lenient)
                .unwrap_or_else(|| download_root.clone())
        };

        Ok(TorrentPaths {
            search_root,
            download_root,
        })
    }

    async fn process_torrent(
        &mut self,
        info: &TorrentInfo,
        paths: &TorrentPaths,
    ) -> Result<TorrentReport, ReconcileError> {
        let mut report = TorrentReport::new(&info.hash, &info.name);
        self.ctx.begin_pass();

        let mut files = self.client.files(&info.hash).await?;
        let wanted_sizes: HashSet<u64> = files.iter().map(|f| f.size).collect();
        let disk_candidates = scan_candidates(
            &paths.search_root,
            &wanted_sizes,
            self.options.hardlink_mode,
        );
        info!(
            "{} candidate file(s) under '{}'",
            disk_candidates.len(),
            paths.search_root.display()
        );

        let mut mutated = false;

        for slot in 0..files.len() {
            let candidates = find_candidates(
                &files[slot],
                &disk_candidates,
                &self.ctx,
                self.options.match_extension,
            );

            let resolution = match candidates.len() {
                0 => {
                    warn!("No matches found for '{}'", files[slot].relative_path);
                    report.not_found += 1;
                    self.zero_unmatched_slot(&info.hash, &mut files[slot], &mut report)
                        .await;
                    continue;
                }
                1 => Resolution::Selected(candidates[0].clone()),
                _ if same_underlying_file(self.fsmeta.as_ref(), &candidates) => {
                    // N paths, one storage object: already consolidated,
                    // nothing to decide or do.
                    debug!(
                        "Candidates for '{}' are one underlying file, leaving alone",
                        files[slot].relative_path
                    );
                    report.already_placed += 1;
                    continue;
                }
                _ => {
                    resolve_ambiguity(
                        &files[slot],
                        &candidates,
                        &mut self.ctx,
                        self.chooser.as_ref(),
                        self.options.dry_run,
                    )
                    .await?
                }
            };

            match resolution {
                Resolution::Skip => report.skipped += 1,
                Resolution::Selected(selected) => {
                    self.ctx.claim(&selected);
                    let acted = self
                        .act_on_selection(info, paths, &mut files[slot], &selected, &mut report)
                        .await?;
                    mutated |= acted;
                }
                Resolution::Consolidate(group) => {
                    for path in &group {
                        self.ctx.claim(path);
                    }
                    match consolidate_paths(self.fsmeta.as_ref(), &group).await {
                        Ok(Some(done)) => {
                            report.consolidated += 1;
                            mutated |= !done.relinked.is_empty();
                        }
                        Ok(None) => report.skipped += 1,
                        Err(e) => {
                            warn!(
                                "Consolidation failed for '{}': {}",
                                files[slot].relative_path, e
                            );
                            report.errors += 1;
                        }
                    }
                }
            }
        }

        let priority_report = apply_priority_rules(
            self.client.as_ref(),
            &info.hash,
            &mut files,
            &self.options.rules,
            self.options.delete_unwanted,
            &paths.download_root,
            self.options.dry_run,
        )
        .await;
        mutated |= priority_report.priorities_changed > 0 || priority_report.deleted > 0;
        report.absorb_priorities(priority_report);

        if self.options.dry_run {
            info!("Dry run, '{}' was not modified", info.name);
            return Ok(report);
        }

        if let Some(new_root) = &self.options.download_path {
            if Path::new(&info.save_path) != new_root.as_path() {
                info!("Moving '{}' to '{}'", info.name, new_root.display());
                self.client
                    .set_location(&info.hash, &new_root.display().to_string())
                    .await?;
                self.client.recheck(&info.hash).await?;
                return Ok(report);
            }
        }

        if mutated {
            info!("Rechecking '{}'", info.name);
            self.client.recheck(&info.hash).await?;
        }

        Ok(report)
    }

    /// Act on a single selected disk file. Returns whether anything mutated.
    async fn act_on_selection(
        &self,
        info: &TorrentInfo,
        paths: &TorrentPaths,
        file: &mut TorrentFileEntry,
        selected: &Path,
        report: &mut TorrentReport,
    ) -> Result<bool, ReconcileError> {
        let relative = match selected.strip_prefix(&paths.download_root) {
            Ok(relative) => slash_join(relative),
            Err(_) => {
                warn!(
                    "Match '{}' lies outside the download root '{}'",
                    selected.display(),
                    paths.download_root.display()
                );
                report.errors += 1;
                return Ok(false);
            }
        };

        if relative == file.relative_path {
            debug!("'{}' already in place", file.relative_path);
            report.already_placed += 1;
            return Ok(false);
        }

        if self.options.dry_run {
            info!("Dry run: {} -> {}", file.relative_path, relative);
            report.planned += 1;
            return Ok(false);
        }

        let expected = paths.download_root.join(&file.relative_path);

        if self.options.hardlink_mode {
            return match consolidate_paths(
                self.fsmeta.as_ref(),
                &[expected, selected.to_path_buf()],
            )
            .await
            {
                Ok(Some(done)) => {
                    report.consolidated += 1;
                    Ok(!done.relinked.is_empty())
                }
                Ok(None) => {
                    report.skipped += 1;
                    Ok(false)
                }
                Err(e) => {
                    warn!("Consolidation failed for '{}': {}", file.relative_path, e);
                    report.errors += 1;
                    Ok(false)
                }
            };
        }

        match self
            .client
            .rename_file(&info.hash, file.index, &relative)
            .await
        {
            Ok(()) => {
                info!("Renamed: {} -> {}", file.relative_path, relative);
                file.relative_path = relative;
                report.renamed += 1;
                // A slot that now has its data on disk is worth seeding again.
                if file.priority == FilePriority::DoNotDownload {
                    match self
                        .client
                        .set_file_priority(&info.hash, &[file.index], FilePriority::Normal)
                        .await
                    {
                        Ok(()) => file.priority = FilePriority::Normal,
                        Err(e) => warn!(
                            "Could not restore priority of '{}': {}",
                            file.relative_path, e
                        ),
                    }
                }
                Ok(true)
            }
            Err(TorrentClientError::Conflict(occupied)) => {
                warn!(
                    "Skipping '{}', target '{}' is already occupied",
                    file.relative_path, occupied
                );
                report.conflicts += 1;

                if let Some(ext) = file_extension(&file.relative_path) {
                    if self.ctx.is_extension_ignored(&ext) {
                        return Ok(false);
                    }
                }

                let options = vec![
                    CONFLICT_HARDLINK_OPTION.to_string(),
                    CONFLICT_SKIP_OPTION.to_string(),
                ];
                let prompt = format!(
                    "Cannot rename '{}', its target is occupied. What now?",
                    file.relative_path
                );
                let answer = self.chooser.choose_one(&prompt, &options).await?;

                if answer == 0 {
                    let group = vec![expected, selected.to_path_buf()];
                    return match consolidate_paths(self.fsmeta.as_ref(), &group).await {
                        Ok(Some(done)) => {
                            report.consolidated += 1;
                            Ok(!done.relinked.is_empty())
                        }
                        Ok(None) => Ok(false),
                        Err(e) => {
                            warn!("Consolidation failed for '{}': {}", file.relative_path, e);
                            report.errors += 1;
                            Ok(false)
                        }
                    };
                }

                if self.options.no_redownload && file.priority != FilePriority::DoNotDownload {
                    match self
                        .client
                        .set_file_priority(&info.hash, &[file.index], FilePriority::DoNotDownload)
                        .await
                    {
                        Ok(()) => {
                            file.priority = FilePriority::DoNotDownload;
                            return Ok(true);
                        }
                        Err(e) => warn!(
                            "Could not zero priority of '{}': {}",
                            file.relative_path, e
                        ),
                    }
                }
                Ok(false)
            }
            Err(e) => {
                warn!("Rename of '{}' failed: {}", file.relative_path, e);
                report.errors += 1;
                Ok(false)
            }
        }
    }

    /// Apply the no-redownload policy to a slot that matched nothing on disk.
    async fn zero_unmatched_slot(
        &self,
        hash: &str,
        file: &mut TorrentFileEntry,
        report: &mut TorrentReport,
    ) {
        if !self.options.no_redownload
            || self.options.dry_run
            || file.priority == FilePriority::DoNotDownload
        {
            return;
        }

        match self
            .client
            .set_file_priority(hash, &[file.index], FilePriority::DoNotDownload)
            .await
        {
            Ok(()) => {
                info!("Not re-downloading '{}'", file.relative_path);
                file.priority = FilePriority::DoNotDownload;
            }
            Err(e) => {
                warn!("Could not zero priority of '{}': {}", file.relative_path, e);
                report.errors += 1;
            }
        }
    }
}

/// Canonicalize when possible, keep the raw path when the target is missing.
fn resolve_lenient(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Join path components with '/', the separator torrent manifests use.
fn slash_join(path: &Path) -> String {
    path.iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_join_normalizes() {
        assert_eq!(slash_join(Path::new("a/b/c.mkv")), "a/b/c.mkv");
        assert_eq!(slash_join(Path::new("single.mkv")), "single.mkv");
        assert_eq!(slash_join(Path::new("")), "");
    }

    #[test]
    fn test_resolve_lenient_keeps_missing_paths() {
        let missing = Path::new("/definitely/not/here");
        assert_eq!(resolve_lenient(missing), missing.to_path_buf());
    }
}
