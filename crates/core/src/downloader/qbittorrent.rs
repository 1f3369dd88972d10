//! qBittorrent Web API downloader.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    AddRequest, AddResult, DownloadFile, DownloadItem, Downloader, DownloaderError, ItemStatus,
};
use crate::candidate::Protocol;
use crate::config::DownloaderConfig;

/// How often and how long to look for a torrent added by URL.
const TAG_LOOKUP_ATTEMPTS: u32 = 10;
const TAG_LOOKUP_DELAY: Duration = Duration::from_millis(500);

/// qBittorrent instance reached over its Web API.
pub struct QBittorrentDownloader {
    id: String,
    client: Client,
    base_url: String,
    username: String,
    password: String,
    category: Option<String>,
    /// Set after a successful login. The session cookie lives in the client's jar.
    logged_in: RwLock<bool>,
}

impl QBittorrentDownloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloaderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .cookie_store(true)
            .build()
            .map_err(|e| DownloaderError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            id: config.id.clone(),
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            category: config.category.clone(),
            logged_in: RwLock::new(false),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, endpoint)
    }

    async fn login(&self) -> Result<(), DownloaderError> {
        let response = self
            .client
            .post(self.url("auth/login"))
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() && body.trim() == "Ok." {
            debug!(downloader = %self.id, "qBittorrent login successful");
            *self.logged_in.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(DownloaderError::AuthenticationFailed(
                "invalid credentials".to_string(),
            ))
        } else {
            Err(DownloaderError::AuthenticationFailed(format!(
                "unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_logged_in(&self) -> Result<(), DownloaderError> {
        if *self.logged_in.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send a request, logging in again once if the session expired.
    async fn send(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, DownloaderError> {
        self.ensure_logged_in().await?;

        let response = build().send().await.map_err(map_request_error)?;
        let response = if response.status() == StatusCode::FORBIDDEN {
            warn!(downloader = %self.id, "qBittorrent session expired, re-authenticating");
            *self.logged_in.write().await = false;
            self.login().await?;
            build().send().await.map_err(map_request_error)?
        } else {
            response
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DownloaderError::NotFound(
                response.url().path().to_string(),
            ));
        }
        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE || status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloaderError::InvalidRequest(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(DownloaderError::Api(format!("HTTP {}", status)));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DownloaderError> {
        let url = self.url(endpoint);
        let response = self.send(|| self.client.get(&url).query(query)).await?;
        response
            .json()
            .await
            .map_err(|e| DownloaderError::Api(format!("failed to parse response: {}", e)))
    }

    async fn torrents(&self, query: &[(&str, &str)]) -> Result<Vec<QbTorrent>, DownloaderError> {
        self.get_json("torrents/info", query).await
    }

    /// Find the torrent carrying `tag`. qBittorrent adds URLs asynchronously,
    /// so this polls for a while before giving up.
    async fn find_by_tag(&self, tag: &str) -> Result<QbTorrent, DownloaderError> {
        for attempt in 0..TAG_LOOKUP_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(TAG_LOOKUP_DELAY).await;
            }
            if let Some(torrent) = self.torrents(&[("tag", tag)]).await?.into_iter().next() {
                return Ok(torrent);
            }
        }
        Err(DownloaderError::Api(format!(
            "torrent tagged {} was added but never appeared",
            tag
        )))
    }
}

#[async_trait]
impl Downloader for QBittorrentDownloader {
    fn id(&self) -> &str {
        &self.id
    }

    fn backend(&self) -> &str {
        "qbittorrent"
    }

    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn add(&self, request: AddRequest) -> Result<AddResult, DownloaderError> {
        if request.url.trim().is_empty() {
            return Err(DownloaderError::InvalidRequest(
                "magnet or torrent URL is required".to_string(),
            ));
        }

        let lookup_tag = format!("snaggle-{}", uuid::Uuid::new_v4().simple());
        let mut tags = request.tags.clone();
        tags.push(lookup_tag.clone());
        let tags = tags.join(",");

        let mut form: Vec<(&str, String)> = vec![("urls", request.url.clone()), ("tags", tags)];
        if let Some(path) = &request.save_path {
            form.push(("savepath", path.clone()));
        }
        if let Some(category) = request.category.as_ref().or(self.category.as_ref()) {
            form.push(("category", category.clone()));
        }
        if request.paused {
            form.push(("paused", "true".to_string()));
        }

        let url = self.url("torrents/add");
        let response = self.send(|| self.client.post(&url).form(&form)).await?;
        let body = response.text().await.unwrap_or_default();
        if body.trim() == "Fails." {
            return Err(DownloaderError::InvalidRequest(
                "qBittorrent rejected the torrent".to_string(),
            ));
        }

        if let Some(hash) = extract_hash_from_magnet(&request.url) {
            debug!(downloader = %self.id, hash = %hash, "Added magnet");
            return Ok(AddResult {
                external_id: hash,
                name: extract_name_from_magnet(&request.url),
            });
        }

        let torrent = self.find_by_tag(&lookup_tag).await?;
        debug!(downloader = %self.id, hash = %torrent.hash, "Added torrent by URL");
        Ok(AddResult {
            external_id: torrent.hash.to_lowercase(),
            name: Some(torrent.name),
        })
    }

    async fn get(&self, external_id: &str) -> Result<DownloadItem, DownloaderError> {
        let hash = external_id.to_lowercase();
        self.torrents(&[("hashes", hash.as_str())])
            .await?
            .into_iter()
            .next()
            .map(QbTorrent::into_item)
            .ok_or_else(|| DownloaderError::NotFound(external_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<DownloadItem>, DownloaderError> {
        let query: Vec<(&str, &str)> = match &self.category {
            Some(category) => vec![("category", category.as_str())],
            None => Vec::new(),
        };
        Ok(self
            .torrents(&query)
            .await?
            .into_iter()
            .map(QbTorrent::into_item)
            .collect())
    }

    async fn list_files(&self, external_id: &str) -> Result<Vec<DownloadFile>, DownloaderError> {
        let hash = external_id.to_lowercase();
        let files: Vec<QbFile> = self
            .get_json("torrents/files", &[("hash", hash.as_str())])
            .await?;
        Ok(files
            .into_iter()
            .map(|f| DownloadFile {
                path: f.name,
                size: u64::try_from(f.size).unwrap_or_default(),
                progress: f.progress,
            })
            .collect())
    }
}

fn map_request_error(e: reqwest::Error) -> DownloaderError {
    if e.is_timeout() {
        DownloaderError::Timeout
    } else if e.is_connect() {
        DownloaderError::ConnectionFailed(e.to_string())
    } else {
        DownloaderError::Api(e.to_string())
    }
}

/// Entry of `torrents/info`.
#[derive(Debug, Deserialize)]
struct QbTorrent {
    hash: String,
    name: String,
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    added_on: i64,
}

impl QbTorrent {
    fn into_item(self) -> DownloadItem {
        DownloadItem {
            external_id: self.hash.to_lowercase(),
            name: self.name,
            status: parse_qb_state(&self.state),
            progress: self.progress.clamp(0.0, 1.0),
            save_path: non_empty(self.save_path),
            content_path: non_empty(self.content_path),
            added_at: timestamp_to_datetime(self.added_on),
        }
    }
}

/// Entry of `torrents/files`.
#[derive(Debug, Deserialize)]
struct QbFile {
    name: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    progress: f64,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Map a qBittorrent torrent state onto [`ItemStatus`].
fn parse_qb_state(state: &str) -> ItemStatus {
    match state {
        "downloading" | "metaDL" | "stalledDL" | "checkingDL" | "forcedDL" | "allocating" => {
            ItemStatus::Downloading
        }
        "uploading" | "stalledUP" | "checkingUP" | "forcedUP" => ItemStatus::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => ItemStatus::Paused,
        "queuedDL" | "queuedUP" | "checkingResumeData" | "moving" => ItemStatus::Queued,
        "error" | "missingFiles" => ItemStatus::Errored,
        _ => ItemStatus::Unknown,
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

fn magnet_params(magnet: &str) -> impl Iterator<Item = (&str, &str)> {
    magnet
        .strip_prefix("magnet:?")
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
}

/// Info hash from `xt=urn:btih:<hash>`, lowercased.
fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    magnet_params(magnet)
        .filter(|(key, _)| *key == "xt")
        .find_map(|(_, value)| value.strip_prefix("urn:btih:"))
        .filter(|hash| !hash.is_empty())
        .map(str::to_lowercase)
}

/// Display name from `dn=`, with `+` and `%20` turned back into spaces.
fn extract_name_from_magnet(magnet: &str) -> Option<String> {
    magnet_params(magnet)
        .find(|(key, _)| *key == "dn")
        .map(|(_, value)| value.replace('+', " ").replace("%20", " "))
        .filter(|name| !name.is_empty())
}
