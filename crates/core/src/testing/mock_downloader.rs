//! Mock downloader for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::candidate::Protocol;
use crate::downloader::{
    AddRequest, AddResult, DownloadFile, DownloadItem, Downloader, DownloaderError, ItemStatus,
};

/// In-memory [`Downloader`] whose items are driven by the test.
///
/// ```rust,ignore
/// let downloader = MockDownloader::new("qbit");
/// let added = downloader.add(AddRequest::new("magnet:?xt=urn:btih:abc")).await?;
/// downloader.set_files("abc", vec![DownloadFile::new("Movie/movie.mkv", 4_000)]).await;
/// downloader.complete("abc", "/downloads", "/downloads/Movie").await;
/// ```
#[derive(Debug)]
pub struct MockDownloader {
    id: String,
    protocol: Protocol,
    added: Arc<RwLock<Vec<AddRequest>>>,
    items: Arc<RwLock<HashMap<String, DownloadItem>>>,
    files: Arc<RwLock<HashMap<String, Vec<DownloadFile>>>>,
    /// If set, the next operation fails with this error.
    next_error: Arc<RwLock<Option<DownloaderError>>>,
    lists_files: bool,
    counter: AtomicU32,
}

impl MockDownloader {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol: Protocol::Torrent,
            added: Arc::new(RwLock::new(Vec::new())),
            items: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            lists_files: true,
            counter: AtomicU32::new(0),
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Make `list_files` report [`DownloaderError::Unsupported`].
    pub fn without_file_listing(mut self) -> Self {
        self.lists_files = false;
        self
    }

    pub async fn added(&self) -> Vec<AddRequest> {
        self.added.read().await.clone()
    }

    pub async fn set_next_error(&self, error: DownloaderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Insert or replace an item directly.
    pub async fn insert_item(&self, item: DownloadItem) {
        self.items
            .write()
            .await
            .insert(item.external_id.clone(), item);
    }

    pub async fn set_status(&self, external_id: &str, status: ItemStatus) {
        if let Some(item) = self.items.write().await.get_mut(external_id) {
            item.status = status;
        }
    }

    pub async fn set_progress(&self, external_id: &str, progress: f64) {
        if let Some(item) = self.items.write().await.get_mut(external_id) {
            item.progress = progress.clamp(0.0, 1.0);
            item.status = ItemStatus::Downloading;
        }
    }

    /// Mark an item finished with its payload at `content_path`.
    pub async fn complete(&self, external_id: &str, save_path: &str, content_path: &str) {
        if let Some(item) = self.items.write().await.get_mut(external_id) {
            item.progress = 1.0;
            item.status = ItemStatus::Completed;
            item.save_path = Some(save_path.to_string());
            item.content_path = Some(content_path.to_string());
        }
    }

    pub async fn set_files(&self, external_id: &str, files: Vec<DownloadFile>) {
        self.files
            .write()
            .await
            .insert(external_id.to_string(), files);
    }

    async fn take_error(&self) -> Option<DownloaderError> {
        self.next_error.write().await.take()
    }

    fn extract_hash(url: &str) -> Option<String> {
        url.split(['?', '&'])
            .find_map(|part| part.strip_prefix("xt=urn:btih:"))
            .map(str::to_lowercase)
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn id(&self) -> &str {
        &self.id
    }

    fn backend(&self) -> &str {
        "mock"
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn add(&self, request: AddRequest) -> Result<AddResult, DownloaderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let hash = Self::extract_hash(&request.url).unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("mockhash{:08x}", n)
        });
        let name = format!("Mock Download {}", hash);

        self.items.write().await.insert(
            hash.clone(),
            DownloadItem {
                external_id: hash.clone(),
                name: name.clone(),
                status: ItemStatus::Queued,
                progress: 0.0,
                save_path: request.save_path.clone(),
                content_path: None,
                added_at: Some(Utc::now()),
            },
        );
        self.added.write().await.push(request);

        Ok(AddResult {
            external_id: hash,
            name: Some(name),
        })
    }

    async fn get(&self, external_id: &str) -> Result<DownloadItem, DownloaderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.items
            .read()
            .await
            .get(external_id)
            .cloned()
            .ok_or_else(|| DownloaderError::NotFound(external_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<DownloadItem>, DownloaderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let mut items: Vec<DownloadItem> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(items)
    }

    async fn list_files(&self, external_id: &str) -> Result<Vec<DownloadFile>, DownloaderError> {
        if !self.lists_files {
            return Err(DownloaderError::Unsupported("list_files"));
        }
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.files
            .read()
            .await
            .get(external_id)
            .cloned()
            .ok_or_else(|| DownloaderError::NotFound(external_id.to_string()))
    }
}
