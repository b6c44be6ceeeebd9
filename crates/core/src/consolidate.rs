//! Hardlink consolidation.
//!
//! Replaces multiple same-content copies with hardlinks to one physical copy.
//! Experimental: hardlinking across filesystem/volume boundaries fails, and
//! editing one linked copy silently affects all others.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::fsmeta::FsMeta;

/// Errors that can occur while consolidating copies.
#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove existing entry: {path}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to hardlink {from} to {to}")]
    LinkFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a consolidation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// The copy every other path now links to.
    pub canonical: PathBuf,
    /// Paths that were replaced with hardlinks to the canonical copy.
    pub relinked: Vec<PathBuf>,
}

/// Merge `paths` into hardlinks of a single physical copy.
///
/// Each path is resolved to a symlink-free absolute form; only those that
/// currently exist take part, and `Ok(None)` is returned when none do. The
/// copy with the largest size on disk (allocated blocks, not logical length —
/// the two diverge on sparse/compressed filesystems) becomes canonical. Every
/// other path has its existing entry removed (rmdir for directories, unlink
/// otherwise, already-gone is fine) and is recreated as a hardlink, so no
/// logical location ends up missing.
pub async fn consolidate_paths(
    meta: &dyn FsMeta,
    paths: &[PathBuf],
) -> Result<Option<ConsolidationReport>, ConsolidateError> {
    let mut existing: Vec<PathBuf> = Vec::new();
    for path in paths {
        match std::fs::canonicalize(path) {
            Ok(resolved) => {
                if !existing.contains(&resolved) {
                    existing.push(resolved);
                }
            }
            Err(e) => debug!("Leaving out {}: {}", path.display(), e),
        }
    }

    if existing.is_empty() {
        return Ok(None);
    }

    let canonical = existing
        .iter()
        .max_by_key(|path| disk_footprint(meta, path))
        .cloned()
        .unwrap_or_else(|| existing[0].clone());

    let mut relinked = Vec::new();
    for path in &existing {
        if *path == canonical {
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|source| {
                ConsolidateError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        remove_entry(path).await?;

        fs::hard_link(&canonical, path)
            .await
            .map_err(|source| ConsolidateError::LinkFailed {
                from: canonical.clone(),
                to: path.clone(),
                source,
            })?;

        relinked.push(path.clone());
    }

    info!(
        "Consolidated {} path(s) onto {}",
        relinked.len() + 1,
        canonical.display()
    );
    Ok(Some(ConsolidationReport { canonical, relinked }))
}

/// Size on disk, falling back to logical length when the backend cannot tell.
fn disk_footprint(meta: &dyn FsMeta, path: &Path) -> u64 {
    meta.allocated_size(path).unwrap_or_else(|e| {
        warn!("No allocated size for {}: {}", path.display(), e);
        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    })
}

/// Remove whatever sits at `path`; a missing entry is not an error.
async fn remove_entry(path: &Path) -> Result<(), ConsolidateError> {
    let file_type = match fs::symlink_metadata(path).await {
        Ok(meta) => meta.file_type(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ConsolidateError::RemoveFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let result = if file_type.is_dir() {
        fs::remove_dir(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ConsolidateError::RemoveFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}
