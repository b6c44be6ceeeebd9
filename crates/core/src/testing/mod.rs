//! Test doubles for the engine's collaborators.
//!
//! These are real implementations of the collaborator traits with
//! controllable behavior, used by unit tests and the integration tests.

mod mock_torrent_client;
mod scripted_chooser;

pub use mock_torrent_client::{MockClientEvent, MockTorrentClient};
pub use scripted_chooser::{ScriptedAnswer, ScriptedChooser};
