//! qBittorrent torrent client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::ClientConfig;

use super::{
    FilePriority, TorrentClient, TorrentClientError, TorrentFileEntry, TorrentFilter, TorrentInfo,
};

/// qBittorrent Web API (v2) client.
pub struct QBittorrentClient {
    client: Client,
    config: ClientConfig,
    /// Session marker (refreshed on auth failure; the cookie jar holds the SID).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: ClientConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Base URL without trailing slash, defaulting to http when no scheme is given.
    fn base_url(&self) -> String {
        let host = self.config.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }

    /// Login and mark the session as established.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TorrentClientError::Timeout
                } else if e.is_connect() {
                    TorrentClientError::ConnectionFailed(e.to_string())
                } else {
                    TorrentClientError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Make an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                TorrentClientError::Timeout
            } else {
                TorrentClientError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 403 {
            // Session expired, retry after login
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| TorrentClientError::ApiError(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TorrentClientError::ApiError(format!(
                    "HTTP {}",
                    response.status()
                )));
            }

            return response
                .text()
                .await
                .map_err(|e| TorrentClientError::ApiError(e.to_string()));
        }

        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    /// Make an authenticated POST request with form data.
    ///
    /// HTTP 409 is surfaced as [`TorrentClientError::Conflict`]; renameFile
    /// uses it to signal an already-occupied destination path.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TorrentClientError::Timeout
                } else {
                    TorrentClientError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 403 {
            // Session expired, retry after login
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(|e| TorrentClientError::ApiError(e.to_string()))?;

            let status = response.status();
            if status.as_u16() == 409 {
                let body = response.text().await.unwrap_or_default();
                return Err(TorrentClientError::Conflict(body));
            }
            if !status.is_success() {
                return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
            }

            return response
                .text()
                .await
                .map_err(|e| TorrentClientError::ApiError(e.to_string()));
        }

        if status.as_u16() == 409 {
            let body = response.text().await.unwrap_or_default();
            return Err(TorrentClientError::Conflict(body));
        }

        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }
}

/// qBittorrent torrent info response (only the fields we consume).
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    save_path: String,
    content_path: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            save_path: self.save_path,
            content_path: self.content_path,
        }
    }
}

/// qBittorrent file manifest entry.
#[derive(Debug, Deserialize)]
struct QBTorrentFile {
    /// Present since API v2.8.2; older servers imply it by list position.
    index: Option<i64>,
    name: String,
    size: i64,
    priority: i64,
}

impl QBTorrentFile {
    fn into_entry(self, position: usize) -> TorrentFileEntry {
        TorrentFileEntry {
            index: self.index.unwrap_or(position as i64),
            relative_path: self.name,
            size: self.size.max(0) as u64,
            priority: FilePriority::from_wire(self.priority),
        }
    }
}

fn parse_files(body: &str) -> Result<Vec<TorrentFileEntry>, TorrentClientError> {
    let files: Vec<QBTorrentFile> = serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))?;

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(pos, f)| f.into_entry(pos))
        .collect())
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn list_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let mut endpoint = "/api/v2/torrents/info".to_string();
        if let Some(hashes) = &filter.hashes {
            endpoint.push_str(&format!(
                "?hashes={}",
                urlencoding::encode(&hashes.join("|"))
            ));
        }

        let response = self.get(&endpoint).await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse response: {}", e))
        })?;

        Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
    }

    async fn files(&self, hash: &str) -> Result<Vec<TorrentFileEntry>, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let endpoint = format!("/api/v2/torrents/files?hash={}", hash_lower);
        let response = self.get(&endpoint).await?;
        parse_files(&response)
    }

    async fn file(&self, hash: &str, index: i64) -> Result<TorrentFileEntry, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let endpoint = format!("/api/v2/torrents/files?hash={}&indexes={}", hash_lower, index);
        let response = self.get(&endpoint).await?;

        parse_files(&response)?
            .into_iter()
            .find(|f| f.index == index)
            .ok_or(TorrentClientError::FileNotFound {
                hash: hash_lower,
                index,
            })
    }

    async fn rename_file(
        &self,
        hash: &str,
        index: i64,
        new_relative_path: &str,
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        // renameFile addresses files by their current path, not by index.
        let current = self.file(&hash_lower, index).await?;

        self.post_form(
            "/api/v2/torrents/renameFile",
            &[
                ("hash", hash_lower.as_str()),
                ("oldPath", current.relative_path.as_str()),
                ("newPath", new_relative_path),
            ],
        )
        .await?;

        Ok(())
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        indexes: &[i64],
        priority: FilePriority,
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let ids = indexes
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let priority_str = priority.as_wire().to_string();

        self.post_form(
            "/api/v2/torrents/filePrio",
            &[
                ("hash", hash_lower.as_str()),
                ("id", ids.as_str()),
                ("priority", priority_str.as_str()),
            ],
        )
        .await?;

        Ok(())
    }

    async fn set_location(&self, hash: &str, location: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form(
            "/api/v2/torrents/setLocation",
            &[("hashes", hash_lower.as_str()), ("location", location)],
        )
        .await?;
        Ok(())
    }

    async fn recheck(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form("/api/v2/torrents/recheck", &[("hashes", &hash_lower)])
            .await?;
        Ok(())
    }

    async fn pause(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form("/api/v2/torrents/pause", &[("hashes", &hash_lower)])
            .await?;
        Ok(())
    }

    async fn resume(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form("/api/v2/torrents/resume", &[("hashes", &hash_lower)])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_files_with_explicit_index() {
        let body = r#"[
            {"index": 2, "name": "b/two.mkv", "size": 2000, "priority": 1},
            {"index": 5, "name": "b/five.srt", "size": 20, "priority": 0}
        ]"#;

        let files = parse_files(body).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].index, 2);
        assert_eq!(files[0].relative_path, "b/two.mkv");
        assert_eq!(files[1].index, 5);
        assert_eq!(files[1].priority, FilePriority::DoNotDownload);
    }

    #[test]
    fn test_parse_files_falls_back_to_position() {
        let body = r#"[
            {"name": "a.mkv", "size": 1000, "priority": 1},
            {"name": "b.mkv", "size": 1000, "priority": 7}
        ]"#;

        let files = parse_files(body).unwrap();
        assert_eq!(files[0].index, 0);
        assert_eq!(files[1].index, 1);
        assert_eq!(files[1].priority, FilePriority::Maximal);
    }

    #[test]
    fn test_parse_files_negative_size_clamped() {
        let body = r#"[{"name": "a.mkv", "size": -1, "priority": 1}]"#;
        let files = parse_files(body).unwrap();
        assert_eq!(files[0].size, 0);
    }

    #[test]
    fn test_parse_files_invalid_json() {
        assert!(parse_files("not json").is_err());
    }

    #[test]
    fn test_qb_torrent_info_conversion() {
        let qb = QBTorrentInfo {
            hash: "ABC123".to_string(),
            name: "Test".to_string(),
            save_path: "/downloads".to_string(),
            content_path: "/downloads/Test".to_string(),
        };

        let info = qb.into_torrent_info();
        assert_eq!(info.hash, "abc123"); // lowercase
        assert_eq!(info.save_path, "/downloads");
        assert_eq!(info.content_path, "/downloads/Test");
    }

    #[test]
    fn test_base_url_adds_scheme() {
        let client = QBittorrentClient::new(ClientConfig {
            host: "localhost:8080".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");

        let client = QBittorrentClient::new(ClientConfig {
            host: "https://seedbox.example/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "https://seedbox.example");
    }
}
