//! Reconciliation engine.
//!
//! The [`Reconciler`] sequences the whole run: list the selected torrents,
//! validate path constraints up front, then per torrent scan the disk, match
//! every file slot, disambiguate with the user where needed, apply the
//! resulting rename/consolidate/skip actions, run the priority pipeline, and
//! recheck when anything changed.

mod options;
mod report;
mod runner;

use thiserror::Error;

pub use options::ReconcileOptions;
pub use report::{RunReport, TorrentReport};
pub use runner::Reconciler;

use crate::choice::ChoiceError;
use crate::torrent_client::TorrentClientError;

/// Errors that abort a reconciliation run.
///
/// Per-file problems never surface here; they are logged and counted in the
/// [`TorrentReport`]. What does surface is structural: unsatisfiable options,
/// an empty torrent selection, a collaborator failure at the torrent level, or
/// the interactive channel closing mid-decision.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No torrents found matching the selection")]
    NoTorrents,

    #[error(transparent)]
    Client(#[from] TorrentClientError),

    #[error(transparent)]
    Choice(#[from] ChoiceError),
}
