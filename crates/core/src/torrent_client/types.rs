//! Types for torrent client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("File {index} not found in torrent {hash}")]
    FileNotFound { hash: String, index: i64 },

    #[error("Target path already occupied: {0}")]
    Conflict(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Per-file download priority, using qBittorrent's wire values.
///
/// The Web API only distinguishes these four levels; anything unexpected
/// decodes to `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Do not download (wire value 0).
    DoNotDownload,
    /// Normal priority (wire value 1).
    Normal,
    /// High priority (wire value 6).
    High,
    /// Maximal priority (wire value 7).
    Maximal,
}

impl FilePriority {
    /// Decode a wire value from the Web API.
    pub fn from_wire(value: i64) -> Self {
        match value {
            0 => FilePriority::DoNotDownload,
            6 => FilePriority::High,
            7 => FilePriority::Maximal,
            _ => FilePriority::Normal,
        }
    }

    /// Encode to the wire value the Web API expects.
    pub fn as_wire(&self) -> i64 {
        match self {
            FilePriority::DoNotDownload => 0,
            FilePriority::Normal => 1,
            FilePriority::High => 6,
            FilePriority::Maximal => 7,
        }
    }
}

/// Information about a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Directory the torrent's data is saved under.
    pub save_path: String,
    /// Absolute path of the torrent's content (root file or folder).
    pub content_path: String,
}

/// One entry in a torrent's file manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFileEntry {
    /// Index of the file within the torrent.
    pub index: i64,
    /// Path relative to the torrent's save path, '/'-separated.
    pub relative_path: String,
    /// Size in bytes.
    pub size: u64,
    /// Current download priority.
    pub priority: FilePriority,
}

/// Filter for listing torrents.
#[derive(Debug, Clone, Default)]
pub struct TorrentFilter {
    /// Restrict to these info hashes (lowercase hex). `None` lists everything.
    pub hashes: Option<Vec<String>>,
}

impl TorrentFilter {
    /// Filter down to the given hashes, normalized to lowercase.
    pub fn for_hashes<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hashes: Some(
                hashes
                    .into_iter()
                    .map(|h| h.as_ref().to_lowercase())
                    .collect(),
            ),
        }
    }
}

/// Trait for torrent client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// List torrents, optionally restricted to specific hashes.
    async fn list_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// Fetch the full file manifest of a torrent.
    async fn files(&self, hash: &str) -> Result<Vec<TorrentFileEntry>, TorrentClientError>;

    /// Re-fetch a single file entry.
    ///
    /// The client's view can lag a just-issued priority write, so destructive
    /// decisions must read through this instead of trusting a cached manifest.
    async fn file(&self, hash: &str, index: i64) -> Result<TorrentFileEntry, TorrentClientError>;

    /// Rename a file slot to a new save-path-relative location.
    ///
    /// Fails with [`TorrentClientError::Conflict`] when the destination is
    /// already claimed by another slot.
    async fn rename_file(
        &self,
        hash: &str,
        index: i64,
        new_relative_path: &str,
    ) -> Result<(), TorrentClientError>;

    /// Set the download priority for a set of file slots.
    async fn set_file_priority(
        &self,
        hash: &str,
        indexes: &[i64],
        priority: FilePriority,
    ) -> Result<(), TorrentClientError>;

    /// Change the torrent's save location.
    async fn set_location(&self, hash: &str, location: &str) -> Result<(), TorrentClientError>;

    /// Re-verify on-disk data against the torrent's expected layout.
    async fn recheck(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Pause a torrent.
    async fn pause(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Resume a paused torrent.
    async fn resume(&self, hash: &str) -> Result<(), TorrentClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_wire_roundtrip() {
        for priority in [
            FilePriority::DoNotDownload,
            FilePriority::Normal,
            FilePriority::High,
            FilePriority::Maximal,
        ] {
            assert_eq!(FilePriority::from_wire(priority.as_wire()), priority);
        }
    }

    #[test]
    fn test_priority_unknown_wire_value_is_normal() {
        assert_eq!(FilePriority::from_wire(2), FilePriority::Normal);
        assert_eq!(FilePriority::from_wire(-1), FilePriority::Normal);
        assert_eq!(FilePriority::from_wire(42), FilePriority::Normal);
    }

    #[test]
    fn test_filter_for_hashes_lowercases() {
        let filter = TorrentFilter::for_hashes(["ABC123", "def456"]);
        assert_eq!(
            filter.hashes,
            Some(vec!["abc123".to_string(), "def456".to_string()])
        );
    }

    #[test]
    fn test_file_entry_serialization() {
        let entry = TorrentFileEntry {
            index: 3,
            relative_path: "Season 1/episode.mkv".to_string(),
            size: 1234,
            priority: FilePriority::Normal,
        };

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: TorrentFileEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.index, 3);
        assert_eq!(parsed.relative_path, "Season 1/episode.mkv");
        assert_eq!(parsed.size, 1234);
        assert_eq!(parsed.priority, FilePriority::Normal);
    }
}
