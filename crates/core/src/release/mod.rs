//! Release title classification.
//!
//! [`parse`] turns a free-text release title into a [`QualityInfo`] and a
//! [`ReleaseInfo`]. It is pure and total: unrecognized input yields
//! [`Quality::Unknown`] and no release metadata.

mod cascade;
mod edition;
mod group;
mod patterns;
mod quality;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub use cascade::{parse_resolution, quality_for_extension};
pub use edition::parse_edition;
pub use group::{is_deny_listed, parse_release_group, remove_file_extension};
pub use quality::{Quality, QualityInfo, Revision};

/// Errors from the release module.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("unknown quality: {0}")]
    UnknownQuality(String),
}

/// Release metadata that is not part of the quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReleaseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_group: Option<String>,
    /// Movie edition. Parsed for every title, meaningful for movies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
}

/// Output of [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParseResult {
    pub quality: QualityInfo,
    pub release: ReleaseInfo,
}

/// Classify a release title.
pub fn parse(title: &str) -> ParseResult {
    let normalized = title.replace('_', " ");
    let normalized = normalized.trim();

    let signals = cascade::Signals::new(title, normalized);
    let quality = QualityInfo {
        quality: cascade::classify(&signals),
        revision: parse_revision(normalized),
    };

    ParseResult {
        quality,
        release: ReleaseInfo {
            release_group: parse_release_group(title),
            edition: parse_edition(normalized),
        },
    }
}

fn parse_revision(normalized: &str) -> Revision {
    let mut revision = Revision::default();

    if let Some(caps) = patterns::VERSION.captures(normalized) {
        let version = caps
            .iter()
            .skip(1)
            .flatten()
            .find_map(|m| m.as_str().parse::<u32>().ok());
        if let Some(version) = version {
            revision.version = version;
        }
    }

    if patterns::PROPER.is_match(normalized) {
        revision.bump();
    }

    if patterns::REPACK.is_match(normalized) {
        revision.is_repack = true;
        revision.bump();
    }

    revision
}

impl FromStr for Quality {
    type Err = ReleaseError;

    /// Accepts display names (`WEBDL-1080p`), ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Quality; 22] = [
            Quality::Unknown,
            Quality::Sdtv,
            Quality::Dvd,
            Quality::WebDl1080p,
            Quality::Hdtv720p,
            Quality::WebDl720p,
            Quality::Bluray720p,
            Quality::Bluray1080p,
            Quality::WebDl480p,
            Quality::Hdtv1080p,
            Quality::RawHd,
            Quality::WebRip480p,
            Quality::Bluray480p,
            Quality::WebRip720p,
            Quality::WebRip1080p,
            Quality::Hdtv2160p,
            Quality::WebRip2160p,
            Quality::WebDl2160p,
            Quality::Bluray2160p,
            Quality::Bluray1080pRemux,
            Quality::Bluray2160pRemux,
            Quality::Bluray576p,
        ];

        let wanted = s.trim();
        ALL.into_iter()
            .find(|q| q.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReleaseError::UnknownQuality(s.to_string()))
    }
}
