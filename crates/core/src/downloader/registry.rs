//! Configured downloader instances by id.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{Downloader, DownloaderError, QBittorrentDownloader};
use crate::candidate::Protocol;
use crate::config::{DownloaderBackend, DownloaderConfig};

#[derive(Clone, Default)]
pub struct DownloaderRegistry {
    downloaders: HashMap<String, Arc<dyn Downloader>>,
    defaults: HashMap<Protocol, String>,
}

impl DownloaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured downloader.
    pub fn from_config(configs: &[DownloaderConfig]) -> Result<Self, DownloaderError> {
        let mut registry = Self::new();
        for config in configs {
            let downloader: Arc<dyn Downloader> = match config.backend {
                DownloaderBackend::Qbittorrent => Arc::new(QBittorrentDownloader::new(config)?),
            };
            info!(
                id = %config.id,
                backend = %config.backend.as_str(),
                url = %config.url,
                "Downloader configured"
            );
            registry.register_with_protocol(downloader, config.protocol, config.default);
        }
        Ok(registry)
    }

    /// Add an instance. The first default registered for a protocol wins.
    pub fn register(&mut self, downloader: Arc<dyn Downloader>, default: bool) {
        let protocol = downloader.protocol();
        self.register_with_protocol(downloader, protocol, default);
    }

    fn register_with_protocol(
        &mut self,
        downloader: Arc<dyn Downloader>,
        protocol: Protocol,
        default: bool,
    ) {
        let id = downloader.id().to_string();
        if default {
            self.defaults.entry(protocol).or_insert_with(|| id.clone());
        }
        self.downloaders.insert(id, downloader);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Downloader>> {
        self.downloaders.get(id).cloned()
    }

    /// The default downloader for a protocol, if one is configured.
    pub fn default_for(&self, protocol: Protocol) -> Option<Arc<dyn Downloader>> {
        self.defaults.get(&protocol).and_then(|id| self.get(id))
    }

    /// Sorted instance ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.downloaders.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.downloaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDownloader;

    fn qbit(id: &str, default: bool) -> DownloaderConfig {
        DownloaderConfig {
            id: id.to_string(),
            name: id.to_string(),
            backend: DownloaderBackend::Qbittorrent,
            url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            protocol: Protocol::Torrent,
            default,
            category: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_from_config() {
        let registry = DownloaderRegistry::from_config(&[qbit("b", false), qbit("a", true)]).unwrap();
        assert_eq!(registry.ids(), vec!["a", "b"]);
        assert_eq!(registry.get("b").unwrap().backend(), "qbittorrent");
        assert_eq!(registry.default_for(Protocol::Torrent).unwrap().id(), "a");
        assert!(registry.default_for(Protocol::Usenet).is_none());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_mock() {
        let mut registry = DownloaderRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(MockDownloader::new("mock")), true);
        registry.register(Arc::new(MockDownloader::new("other")), true);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.default_for(Protocol::Torrent).unwrap().id(), "mock");
    }
}
