//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait covering the operations the
//! reconciliation engine needs (list, file manifest, rename, priority,
//! location, recheck, pause/resume) plus a qBittorrent Web API backend.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
