//! Candidate data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::release::ParseResult;

// ============================================================================
// Protocol
// ============================================================================

/// Transfer protocol of a release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Torrent,
    Usenet,
    #[serde(other)]
    Unknown,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Torrent => "torrent",
            Protocol::Usenet => "usenet",
            Protocol::Unknown => "unknown",
        }
    }

    /// Parse a stored protocol name. Unrecognized names map to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "torrent" => Protocol::Torrent,
            "usenet" => Protocol::Usenet,
            _ => Protocol::Unknown,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Search records
// ============================================================================

/// Raw record returned by the search provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub indexer_id: i64,
    pub indexer_name: String,
    pub guid: String,
    pub title: String,
    pub download_url: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<i64>,
    /// Age in seconds.
    #[serde(default)]
    pub age: i64,
    #[serde(default)]
    pub age_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub grabs: i64,
}

/// Identity of a candidate: `(indexer_id, guid)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateKey {
    pub indexer_id: i64,
    pub guid: String,
}

impl CandidateKey {
    pub fn new(indexer_id: i64, guid: impl Into<String>) -> Self {
        Self {
            indexer_id,
            guid: guid.into(),
        }
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.indexer_id, self.guid)
    }
}

/// One search hit, normalized. Lives only in the candidate cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadCandidate {
    pub protocol: Protocol,
    pub title: String,
    pub link: String,
    pub indexer: String,
    pub indexer_id: i64,
    pub guid: String,
    pub seeders: i64,
    pub peers: i64,
    pub size: i64,
    pub age: i64,
    pub age_hours: f64,
    pub grabs: i64,
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
}

impl DownloadCandidate {
    pub fn key(&self) -> CandidateKey {
        CandidateKey::new(self.indexer_id, self.guid.clone())
    }
}

impl From<SearchResult> for DownloadCandidate {
    fn from(result: SearchResult) -> Self {
        Self {
            protocol: result.protocol,
            title: result.title,
            link: result.download_url,
            indexer: result.indexer_name,
            indexer_id: result.indexer_id,
            guid: result.guid,
            seeders: result.seeders.unwrap_or(0),
            peers: result.leechers.unwrap_or(0),
            size: result.size,
            age: result.age,
            age_hours: result.age_hours,
            grabs: result.grabs,
            categories: result.categories,
            publish_date: result.publish_date,
        }
    }
}

/// A cached candidate together with its classification, as returned by ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateView {
    #[serde(flatten)]
    pub candidate: DownloadCandidate,
    pub parsed: ParseResult,
}

// ============================================================================
// Media reference
// ============================================================================

/// Kind of library media.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The library item a candidate is being acquired for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub media_type: MediaType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// External metadata id (TMDB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
}

impl MediaRef {
    pub fn movie(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            media_type: MediaType::Movie,
            title: title.into(),
            year,
            external_id: None,
            season: None,
            episode: None,
            episode_title: None,
        }
    }

    pub fn series(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            media_type: MediaType::Series,
            ..Self::movie(title, year)
        }
    }

    pub fn with_external_id(mut self, id: i64) -> Self {
        self.external_id = Some(id);
        self
    }

    pub fn with_episode(mut self, season: u32, episode: Option<u32>) -> Self {
        self.season = Some(season);
        self.episode = episode;
        self
    }

    /// Stable catalog identity: the external id when known, else title and year.
    pub fn catalog_id(&self) -> String {
        match self.external_id {
            Some(id) => format!("{}:tmdb:{}", self.media_type, id),
            None => format!(
                "{}:{}:{}",
                self.media_type,
                self.title.to_lowercase(),
                self.year.map(|y| y.to_string()).unwrap_or_default()
            ),
        }
    }
}
