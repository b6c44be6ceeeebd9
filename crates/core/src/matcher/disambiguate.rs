//! Disambiguation of multi-candidate matches.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::choice::{ChoiceError, Chooser};
use crate::torrent_client::TorrentFileEntry;

use super::types::{file_extension, MatchContext, Resolution};

pub(crate) const SKIP_LABEL: &str = "<Skip this file>";
pub(crate) const HARDLINK_LABEL: &str = "<Consolidate the copies via hardlink>";

fn ignore_subfolder_label(folder: &Path) -> String {
    format!("<Ignore all files in '{}'>", folder.display())
}

fn ignore_extension_label(extension: &str) -> String {
    format!("<Ignore all files with '.{}' extensions>", extension)
}

/// Resolve a slot with two or more surviving candidates.
///
/// Memoized ignore rules are consulted before anyone is asked: if the whole
/// candidate set falls under ignored subfolders, or the slot's extension was
/// ignored earlier, the slot is skipped without a prompt. In dry-run mode
/// ambiguity cannot be resolved at all, so the slot is reported and skipped.
/// Otherwise the candidates plus four control options go to the chooser; an
/// answer outside that range is logged and treated as a skip.
///
/// An empty candidate set resolves to `Skip` without a prompt (the ignored
/// subfolder check holds vacuously).
pub async fn resolve_ambiguity(
    torrent_file: &TorrentFileEntry,
    candidates: &[PathBuf],
    ctx: &mut MatchContext,
    chooser: &dyn Chooser,
    dry_run: bool,
) -> Result<Resolution, ChoiceError> {
    if candidates
        .iter()
        .all(|path| ctx.is_under_ignored_subfolder(path))
    {
        debug!(
            "All candidates for '{}' are under ignored subfolders, skipping",
            torrent_file.relative_path
        );
        return Ok(Resolution::Skip);
    }

    let extension = file_extension(&torrent_file.relative_path);
    if let Some(ext) = &extension {
        if ctx.is_extension_ignored(ext) {
            debug!(
                "Extension '.{}' is ignored, skipping '{}'",
                ext, torrent_file.relative_path
            );
            return Ok(Resolution::Skip);
        }
    }

    if dry_run {
        warn!(
            "Dry run: {} candidates for '{}', cannot disambiguate, skipping",
            candidates.len(),
            torrent_file.relative_path
        );
        return Ok(Resolution::Skip);
    }

    // First candidate's parent is the folder the ignore control offers,
    // mirroring the order the candidates are presented in.
    let subfolder = candidates[0]
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let subfolder_label = ignore_subfolder_label(&subfolder);
    let extension_value = extension.unwrap_or_default();
    let extension_label = ignore_extension_label(&extension_value);

    let mut options: Vec<String> = candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    options.push(SKIP_LABEL.to_string());
    options.push(subfolder_label);
    options.push(extension_label);
    options.push(HARDLINK_LABEL.to_string());

    let prompt = format!(
        "Multiple matches found for '{}'. Select a file to match:",
        torrent_file.relative_path
    );
    let selected = chooser.choose_one(&prompt, &options).await?;

    if let Some(path) = candidates.get(selected) {
        return Ok(Resolution::Selected(path.clone()));
    }

    match selected - candidates.len() {
        0 => Ok(Resolution::Skip),
        1 => {
            info!("Ignoring subfolder '{}' for this session", subfolder.display());
            ctx.ignore_subfolder(&subfolder);
            Ok(Resolution::Skip)
        }
        2 => {
            info!("Ignoring extension '.{}' for this session", extension_value);
            ctx.ignore_extension(&extension_value);
            Ok(Resolution::Skip)
        }
        3 => Ok(Resolution::Consolidate(candidates.to_vec())),
        _ => {
            warn!(
                "Chooser answered with out-of-range index {}, skipping '{}'",
                selected, torrent_file.relative_path
            );
            Ok(Resolution::Skip)
        }
    }
}
