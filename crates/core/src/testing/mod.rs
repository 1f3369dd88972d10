//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the external services the workers talk to, so the whole
//! job and import lifecycle can be exercised without a real downloader.
//!
//! # Example
//!
//! ```rust,ignore
//! use snaggle_core::testing::{fixtures, MockDownloader};
//!
//! let downloader = MockDownloader::new("qbit");
//! let result = fixtures::search_result(1, "guid-1", "Arrival.2016.1080p.BluRay.x264-GRP");
//! downloader.complete("hash", "/downloads", "/downloads/Arrival").await;
//! ```

mod mock_downloader;
mod mock_placer;

pub use mock_downloader::MockDownloader;
pub use mock_placer::{MockPlacer, RecordedPlacement};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::candidate::{MediaRef, MediaType, Protocol, SearchResult};
    use crate::config::{
        Config, DownloaderBackend, DownloaderConfig, LibraryConfig, NameTemplateConfig,
    };

    /// A torrent search result with a magnet link derived from `guid`.
    pub fn search_result(indexer_id: i64, guid: &str, title: &str) -> SearchResult {
        SearchResult {
            indexer_id,
            indexer_name: "mock-indexer".to_string(),
            guid: guid.to_string(),
            title: title.to_string(),
            download_url: format!("magnet:?xt=urn:btih:{}&dn={}", info_hash(guid), title),
            protocol: Protocol::Torrent,
            size: 4 * 1024 * 1024 * 1024,
            seeders: Some(50),
            leechers: Some(5),
            age: 3600,
            age_hours: 1.0,
            publish_date: None,
            categories: vec!["Movies".to_string()],
            grabs: 10,
        }
    }

    /// A stable 40-character hex hash for `seed`.
    pub fn info_hash(seed: &str) -> String {
        let mut hash = seed
            .bytes()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        hash.truncate(40);
        format!("{:0<40}", hash)
    }

    pub fn movie(title: &str, year: i32) -> MediaRef {
        MediaRef::movie(title, Some(year)).with_external_id(i64::from(year) * 10)
    }

    pub fn episode(title: &str, season: u32, episode: Option<u32>) -> MediaRef {
        MediaRef::series(title, None).with_episode(season, episode)
    }

    /// One downloader, movie and TV libraries under `library_root`, and a
    /// naming scheme for each.
    pub fn config(library_root: &Path) -> Config {
        Config {
            downloaders: vec![DownloaderConfig {
                id: "qbit".to_string(),
                name: "qBittorrent".to_string(),
                backend: DownloaderBackend::Qbittorrent,
                url: "http://localhost:8080".to_string(),
                username: None,
                password: None,
                protocol: Protocol::Torrent,
                default: true,
                category: None,
                timeout_secs: 30,
            }],
            libraries: vec![
                LibraryConfig {
                    id: "movies".to_string(),
                    name: "Movies".to_string(),
                    media_type: MediaType::Movie,
                    root_path: library_root.join("movies"),
                    default: true,
                },
                LibraryConfig {
                    id: "tv".to_string(),
                    name: "TV".to_string(),
                    media_type: MediaType::Series,
                    root_path: library_root.join("tv"),
                    default: true,
                },
            ],
            name_templates: vec![
                NameTemplateConfig {
                    id: "movie-default".to_string(),
                    name: "Movie".to_string(),
                    media_type: MediaType::Movie,
                    template: "{{ media.clean_title }} ({{ media.year }})".to_string(),
                    movie_dir_template: Some(
                        "{{ media.clean_title }} ({{ media.year }})".to_string(),
                    ),
                    series_show_template: None,
                    series_season_template: None,
                    default: true,
                },
                NameTemplateConfig {
                    id: "series-default".to_string(),
                    name: "Series".to_string(),
                    media_type: MediaType::Series,
                    template: "{{ media.clean_title }} - S{{ media.season:02 }}E{{ media.episode:02 }}"
                        .to_string(),
                    movie_dir_template: None,
                    series_show_template: Some("{{ media.clean_title }}".to_string()),
                    series_season_template: Some("Season {{ media.season:02 }}".to_string()),
                    default: true,
                },
            ],
            ..Config::default()
        }
    }

}
