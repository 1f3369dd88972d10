use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::candidate::{MediaType, Protocol};
use crate::placer::PlacerConfig;
use crate::policy::PlanDefaults;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub candidates: CandidatesConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub placer: PlacerConfig,
    #[serde(default)]
    pub downloaders: Vec<DownloaderConfig>,
    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,
    #[serde(default)]
    pub name_templates: Vec<NameTemplateConfig>,
}

impl Config {
    pub fn library(&self, id: &str) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|l| l.id == id)
    }

    pub fn name_template(&self, id: &str) -> Option<&NameTemplateConfig> {
        self.name_templates.iter().find(|t| t.id == id)
    }

    /// Fallbacks for plan fields no policy decided on.
    pub fn plan_defaults(&self) -> PlanDefaults {
        let mut defaults = PlanDefaults::default();
        for d in self.downloaders.iter().filter(|d| d.default) {
            defaults.downloaders.insert(d.protocol, d.id.clone());
        }
        for l in self.libraries.iter().filter(|l| l.default) {
            defaults.libraries.insert(l.media_type, l.id.clone());
        }
        for t in self.name_templates.iter().filter(|t| t.default) {
            defaults.name_templates.insert(t.media_type, t.id.clone());
        }
        defaults
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("snaggle.db")
}

/// Candidate cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandidatesConfig {
    /// How long an ingested candidate stays enqueueable (default: 300)
    #[serde(default = "default_candidate_ttl")]
    pub ttl_secs: u64,
}

impl CandidatesConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CandidatesConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_candidate_ttl(),
        }
    }
}

fn default_candidate_ttl() -> u64 {
    300
}

/// Background worker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_job_poll_interval")]
    pub job_poll_interval_ms: u64,
    #[serde(default = "default_job_claim_limit")]
    pub job_claim_limit: usize,
    /// Lease held on a claimed job; an expired lease makes it claimable again.
    #[serde(default = "default_job_lease")]
    pub job_lease_secs: u64,
    #[serde(default = "default_import_poll_interval")]
    pub import_poll_interval_ms: u64,
    #[serde(default = "default_import_claim_limit")]
    pub import_claim_limit: usize,
    /// In-progress imports older than this return to pending at startup.
    /// 0 disables the reset.
    #[serde(default = "default_stale_import")]
    pub stale_import_secs: u64,
}

impl WorkersConfig {
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    pub fn job_lease(&self) -> Duration {
        Duration::from_secs(self.job_lease_secs)
    }

    pub fn import_poll_interval(&self) -> Duration {
        Duration::from_millis(self.import_poll_interval_ms)
    }

    pub fn stale_import_age(&self) -> Option<Duration> {
        (self.stale_import_secs > 0).then(|| Duration::from_secs(self.stale_import_secs))
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            job_poll_interval_ms: default_job_poll_interval(),
            job_claim_limit: default_job_claim_limit(),
            job_lease_secs: default_job_lease(),
            import_poll_interval_ms: default_import_poll_interval(),
            import_claim_limit: default_import_claim_limit(),
            stale_import_secs: default_stale_import(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_job_poll_interval() -> u64 {
    3000
}

fn default_job_claim_limit() -> usize {
    20
}

fn default_job_lease() -> u64 {
    300
}

fn default_import_poll_interval() -> u64 {
    2000
}

fn default_import_claim_limit() -> usize {
    10
}

fn default_stale_import() -> u64 {
    60 * 60
}

/// Available downloader backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloaderBackend {
    Qbittorrent,
    // Future: Sabnzbd, Transmission
}

impl DownloaderBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloaderBackend::Qbittorrent => "qbittorrent",
        }
    }
}

/// One configured downloader instance
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub backend: DownloaderBackend,
    /// Web UI base URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
    /// Used when no policy picks a downloader for this protocol
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub category: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// A library root that imports land in
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub media_type: MediaType,
    pub root_path: PathBuf,
    #[serde(default)]
    pub default: bool,
}

/// A destination naming scheme
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NameTemplateConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub media_type: MediaType,
    /// File name template, e.g. "{{ media.clean_title }} ({{ media.year }})"
    pub template: String,
    #[serde(default)]
    pub movie_dir_template: Option<String>,
    #[serde(default)]
    pub series_show_template: Option<String>,
    #[serde(default)]
    pub series_season_template: Option<String>,
    #[serde(default)]
    pub default: bool,
}

impl NameTemplateConfig {
    /// Directory templates and the file template joined into one relative path template.
    pub fn path_template(&self) -> String {
        let dirs: Vec<&Option<String>> = match self.media_type {
            MediaType::Movie => vec![&self.movie_dir_template],
            MediaType::Series => vec![&self.series_show_template, &self.series_season_template],
        };
        dirs.into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .chain(std::iter::once(self.template.trim()))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub candidates: CandidatesConfig,
    pub workers: WorkersConfig,
    pub placer: PlacerConfig,
    pub downloaders: Vec<SanitizedDownloaderConfig>,
    pub libraries: Vec<LibraryConfig>,
    pub name_templates: Vec<NameTemplateConfig>,
}

/// Sanitized downloader config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloaderConfig {
    pub id: String,
    pub name: String,
    pub backend: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
    pub protocol: Protocol,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub timeout_secs: u32,
}

impl From<&DownloaderConfig> for SanitizedDownloaderConfig {
    fn from(d: &DownloaderConfig) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            backend: d.backend.as_str().to_string(),
            url: d.url.clone(),
            username: d.username.clone(),
            password_configured: d.password.as_deref().is_some_and(|p| !p.is_empty()),
            protocol: d.protocol,
            default: d.default,
            category: d.category.clone(),
            timeout_secs: d.timeout_secs,
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            candidates: config.candidates.clone(),
            workers: config.workers.clone(),
            placer: config.placer.clone(),
            downloaders: config.downloaders.iter().map(Into::into).collect(),
            libraries: config.libraries.clone(),
            name_templates: config.name_templates.clone(),
        }
    }
}
