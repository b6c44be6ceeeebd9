//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    FilePriority, TorrentClient, TorrentClientError, TorrentFileEntry, TorrentFilter, TorrentInfo,
};

/// A mutation the mock observed, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockClientEvent {
    Renamed {
        hash: String,
        index: i64,
        new_path: String,
    },
    PrioritySet {
        hash: String,
        indexes: Vec<i64>,
        priority: FilePriority,
    },
    LocationSet {
        hash: String,
        location: String,
    },
    Rechecked(String),
    Paused(String),
    Resumed(String),
}

/// Internal state for a mock torrent.
#[derive(Debug, Clone)]
struct MockTorrentState {
    info: TorrentInfo,
    files: Vec<TorrentFileEntry>,
    paused: bool,
}

/// Mock implementation of the `TorrentClient` trait.
///
/// Provides controllable behavior for testing:
/// - Pre-populate torrents and their file manifests
/// - Record every mutation in order for assertions
/// - Declare relative paths that respond to rename with a conflict
/// - Silently drop priority writes, to exercise the re-fetch guard
/// - Inject a one-shot error
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    torrents: Arc<RwLock<HashMap<String, MockTorrentState>>>,
    events: Arc<RwLock<Vec<MockClientEvent>>>,
    conflict_paths: Arc<RwLock<HashSet<String>>>,
    ignore_priority_writes: Arc<RwLock<bool>>,
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a torrent with an explicit info block.
    pub async fn add_mock_torrent(&self, info: TorrentInfo, files: Vec<TorrentFileEntry>) {
        let hash = info.hash.clone();
        self.torrents.write().await.insert(
            hash,
            MockTorrentState {
                info,
                files,
                paused: false,
            },
        );
    }

    /// Pre-populate a torrent saved under `save_path` with the given manifest.
    pub async fn add_mock_torrent_with_files(
        &self,
        hash: &str,
        save_path: &Path,
        files: &[TorrentFileEntry],
    ) {
        let info = TorrentInfo {
            hash: hash.to_lowercase(),
            name: format!("Mock Torrent {}", hash),
            save_path: save_path.display().to_string(),
            content_path: save_path.join(hash).display().to_string(),
        };
        self.add_mock_torrent(info, files.to_vec()).await;
    }

    /// All observed mutations, in call order.
    pub async fn events(&self) -> Vec<MockClientEvent> {
        self.events.read().await.clone()
    }

    /// Current manifest of a torrent.
    pub async fn torrent_files(&self, hash: &str) -> Vec<TorrentFileEntry> {
        self.torrents
            .read()
            .await
            .get(hash)
            .map(|t| t.files.clone())
            .unwrap_or_default()
    }

    /// Whether the torrent is currently paused.
    pub async fn is_paused(&self, hash: &str) -> bool {
        self.torrents
            .read()
            .await
            .get(hash)
            .map(|t| t.paused)
            .unwrap_or(false)
    }

    /// Make renames to this relative path fail with a conflict.
    pub async fn set_conflict_path(&self, relative_path: &str) {
        self.conflict_paths
            .write()
            .await
            .insert(relative_path.to_string());
    }

    /// When set, priority writes return Ok but are not applied, simulating a
    /// client whose cached view lags the write.
    pub async fn ignore_priority_changes(&self, ignore: bool) {
        *self.ignore_priority_writes.write().await = ignore;
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, event: MockClientEvent) {
        self.events.write().await.push(event);
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let torrents = self.torrents.read().await;
        let mut result: Vec<TorrentInfo> = torrents
            .values()
            .filter(|t| match &filter.hashes {
                Some(hashes) => hashes.contains(&t.info.hash),
                None => true,
            })
            .map(|t| t.info.clone())
            .collect();

        result.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(result)
    }

    async fn files(&self, hash: &str) -> Result<Vec<TorrentFileEntry>, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.torrents
            .read()
            .await
            .get(hash)
            .map(|t| t.files.clone())
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn file(&self, hash: &str, index: i64) -> Result<TorrentFileEntry, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let torrents = self.torrents.read().await;
        let torrent = torrents
            .get(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        torrent
            .files
            .iter()
            .find(|f| f.index == index)
            .cloned()
            .ok_or(TorrentClientError::FileNotFound {
                hash: hash.to_string(),
                index,
            })
    }

    async fn rename_file(
        &self,
        hash: &str,
        index: i64,
        new_relative_path: &str,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if self.conflict_paths.read().await.contains(new_relative_path) {
            return Err(TorrentClientError::Conflict(new_relative_path.to_string()));
        }

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        let file = torrent
            .files
            .iter_mut()
            .find(|f| f.index == index)
            .ok_or(TorrentClientError::FileNotFound {
                hash: hash.to_string(),
                index,
            })?;
        file.relative_path = new_relative_path.to_string();
        drop(torrents);

        self.record(MockClientEvent::Renamed {
            hash: hash.to_string(),
            index,
            new_path: new_relative_path.to_string(),
        })
        .await;
        Ok(())
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        indexes: &[i64],
        priority: FilePriority,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if !*self.ignore_priority_writes.read().await {
            let mut torrents = self.torrents.write().await;
            let torrent = torrents
                .get_mut(hash)
                .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
            for file in torrent.files.iter_mut() {
                if indexes.contains(&file.index) {
                    file.priority = priority;
                }
            }
        }

        self.record(MockClientEvent::PrioritySet {
            hash: hash.to_string(),
            indexes: indexes.to_vec(),
            priority,
        })
        .await;
        Ok(())
    }

    async fn set_location(&self, hash: &str, location: &str) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        torrent.info.save_path = location.to_string();
        drop(torrents);

        self.record(MockClientEvent::LocationSet {
            hash: hash.to_string(),
            location: location.to_string(),
        })
        .await;
        Ok(())
    }

    async fn recheck(&self, hash: &str) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(MockClientEvent::Rechecked(hash.to_string())).await;
        Ok(())
    }

    async fn pause(&self, hash: &str) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(torrent) = self.torrents.write().await.get_mut(hash) {
            torrent.paused = true;
        }
        self.record(MockClientEvent::Paused(hash.to_string())).await;
        Ok(())
    }

    async fn resume(&self, hash: &str) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(torrent) = self.torrents.write().await.get_mut(hash) {
            torrent.paused = false;
        }
        self.record(MockClientEvent::Resumed(hash.to_string())).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(index: i64, relative_path: &str) -> TorrentFileEntry {
        TorrentFileEntry {
            index,
            relative_path: relative_path.to_string(),
            size: 100,
            priority: FilePriority::Normal,
        }
    }

    #[tokio::test]
    async fn test_rename_updates_manifest_and_records_event() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent_with_files("abc", &PathBuf::from("/d"), &[entry(0, "old.mkv")])
            .await;

        client.rename_file("abc", 0, "new/place.mkv").await.unwrap();

        let files = client.torrent_files("abc").await;
        assert_eq!(files[0].relative_path, "new/place.mkv");
        assert_eq!(
            client.events().await,
            vec![MockClientEvent::Renamed {
                hash: "abc".to_string(),
                index: 0,
                new_path: "new/place.mkv".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_conflict_path_rejects_rename() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent_with_files("abc", &PathBuf::from("/d"), &[entry(0, "old.mkv")])
            .await;
        client.set_conflict_path("taken.mkv").await;

        let result = client.rename_file("abc", 0, "taken.mkv").await;
        assert!(matches!(result, Err(TorrentClientError::Conflict(_))));

        // Manifest untouched.
        assert_eq!(client.torrent_files("abc").await[0].relative_path, "old.mkv");
    }

    #[tokio::test]
    async fn test_ignored_priority_write_returns_ok_but_does_not_apply() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent_with_files("abc", &PathBuf::from("/d"), &[entry(0, "a.mkv")])
            .await;
        client.ignore_priority_changes(true).await;

        client
            .set_file_priority("abc", &[0], FilePriority::DoNotDownload)
            .await
            .unwrap();

        let fresh = client.file("abc", 0).await.unwrap();
        assert_eq!(fresh.priority, FilePriority::Normal);
    }

    #[tokio::test]
    async fn test_list_filtering_and_order() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent_with_files("bbb", &PathBuf::from("/d"), &[])
            .await;
        client
            .add_mock_torrent_with_files("aaa", &PathBuf::from("/d"), &[])
            .await;

        let all = client.list_torrents(&TorrentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].hash, "aaa");

        let one = client
            .list_torrents(&TorrentFilter::for_hashes(["BBB"]))
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].hash, "bbb");
    }

    #[tokio::test]
    async fn test_error_injection_is_one_shot() {
        let client = MockTorrentClient::new();
        client
            .set_next_error(TorrentClientError::ConnectionFailed("test".into()))
            .await;

        assert!(client.list_torrents(&TorrentFilter::default()).await.is_err());
        assert!(client.list_torrents(&TorrentFilter::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_pause_resume_tracking() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent_with_files("abc", &PathBuf::from("/d"), &[])
            .await;

        client.pause("abc").await.unwrap();
        assert!(client.is_paused("abc").await);
        client.resume("abc").await.unwrap();
        assert!(!client.is_paused("abc").await);
    }
}
