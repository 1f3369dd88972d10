//! Acquisition backends.

mod qbittorrent;
mod registry;
mod types;

pub use qbittorrent::QBittorrentDownloader;
pub use registry::DownloaderRegistry;
pub use types::{
    AddRequest, AddResult, DownloadFile, DownloadItem, Downloader, DownloaderError, ItemStatus,
};
