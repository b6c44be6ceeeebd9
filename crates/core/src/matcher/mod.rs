//! Matching and disambiguation.
//!
//! For each torrent file slot, [`find_candidates`] narrows the scanned disk
//! files to plausible matches (equal size, optionally equal extension, not
//! already claimed this pass). When more than one candidate survives,
//! [`resolve_ambiguity`] runs the disambiguation state machine: memoized
//! ignore rules first, then a single human decision through the
//! [`Chooser`](crate::choice::Chooser) collaborator.

mod candidates;
mod disambiguate;
mod types;

pub use candidates::find_candidates;
pub use disambiguate::resolve_ambiguity;
pub use types::{file_extension, MatchContext, Resolution};
