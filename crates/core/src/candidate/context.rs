//! Evaluation context and the field registry.
//!
//! The context is the sole input to policy rules and destination templates.
//! Fields are addressed by namespaced paths such as `candidate.size` or
//! `quality.resolution`; [`context_fields`] lists every path.

use std::fmt;

use serde::Serialize;

use super::{CandidateError, DownloadCandidate, MediaRef, Protocol};
use crate::release::{self, ParseResult};
use crate::render::clean_title;

// ============================================================================
// Field values
// ============================================================================

/// A resolved field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Numeric view, used by ordering comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    fn text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }

    fn opt_text(value: Option<&str>) -> Self {
        value.map(Self::text).unwrap_or(FieldValue::Null)
    }

    fn opt_int(value: Option<i64>) -> Self {
        value.map(FieldValue::Int).unwrap_or(FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::List(v) => f.write_str(&v.join(",")),
        }
    }
}

// ============================================================================
// Field registry
// ============================================================================

/// How a field is presented to rule editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Enum,
    Boolean,
    Dynamic,
}

/// Runtime type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    StringList,
}

/// Metadata about one context path.
#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    pub path: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub enum_values: &'static [&'static str],
}

const fn field(
    path: &'static str,
    label: &'static str,
    kind: FieldKind,
    value_type: ValueType,
) -> FieldInfo {
    FieldInfo {
        path,
        label,
        kind,
        value_type,
        enum_values: &[],
    }
}

const fn enum_field(
    path: &'static str,
    label: &'static str,
    enum_values: &'static [&'static str],
) -> FieldInfo {
    FieldInfo {
        path,
        label,
        kind: FieldKind::Enum,
        value_type: ValueType::String,
        enum_values,
    }
}

use FieldKind as K;
use ValueType as V;

static FIELDS: &[FieldInfo] = &[
    // candidate.*
    field("candidate.size", "Size", K::Number, V::Int),
    field("candidate.title", "Candidate Title", K::Text, V::String),
    field("candidate.indexer", "Indexer", K::Dynamic, V::String),
    field("candidate.indexer_id", "Indexer ID", K::Number, V::Int),
    field("candidate.categories", "Categories", K::Dynamic, V::StringList),
    enum_field("candidate.protocol", "Protocol", &["torrent", "usenet"]),
    field("candidate.seeders", "Seeders", K::Number, V::Int),
    field("candidate.peers", "Peers", K::Number, V::Int),
    field("candidate.age", "Age (seconds)", K::Number, V::Int),
    field("candidate.age_hours", "Age (hours)", K::Number, V::Float),
    field("candidate.grabs", "Grabs", K::Number, V::Int),
    field("candidate.publish_date", "Publish Date", K::Text, V::String),
    field("candidate.link", "Link", K::Text, V::String),
    field("candidate.guid", "GUID", K::Text, V::String),
    // quality.*
    field("quality.full", "Full Quality", K::Text, V::String),
    enum_field(
        "quality.resolution",
        "Resolution",
        &["Unknown", "SD", "480p", "576p", "720p", "1080p", "2160p"],
    ),
    enum_field(
        "quality.source",
        "Source",
        &["Unknown", "SDTV", "DVD", "HDTV", "WEBRip", "WEB-DL", "BluRay", "Raw-HD"],
    ),
    field("quality.is_remux", "Is Remux", K::Boolean, V::Bool),
    field("quality.is_repack", "Is Repack", K::Boolean, V::Bool),
    field("quality.version", "Version", K::Number, V::Int),
    // release.*
    field("release.release_group", "Release Group", K::Text, V::String),
    field("release.edition", "Edition", K::Text, V::String),
    // media.*
    enum_field("media.type", "Media Type", &["movie", "series"]),
    field("media.title", "Media Title", K::Text, V::String),
    field("media.clean_title", "Clean Title", K::Text, V::String),
    field("media.year", "Year", K::Number, V::Int),
    field("media.tmdb_id", "TMDB ID", K::Number, V::Int),
    field("media.season", "Season", K::Number, V::Int),
    field("media.episode", "Episode", K::Number, V::Int),
    field("media.episode_title", "Episode Title", K::Text, V::String),
];

/// Every path available on an [`EvaluationContext`].
pub fn context_fields() -> &'static [FieldInfo] {
    FIELDS
}

/// Look up the registry entry for a path.
pub fn field_info(path: &str) -> Option<&'static FieldInfo> {
    FIELDS.iter().find(|f| f.path == path)
}

// ============================================================================
// Evaluation context
// ============================================================================

/// A candidate merged with its classification and optional media identity.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    pub candidate: DownloadCandidate,
    pub parsed: ParseResult,
    pub media: Option<MediaRef>,
}

impl EvaluationContext {
    /// Build a context, classifying the candidate title.
    pub fn new(candidate: DownloadCandidate) -> Self {
        let parsed = release::parse(&candidate.title);
        Self::with_parsed(candidate, parsed)
    }

    pub fn with_parsed(candidate: DownloadCandidate, parsed: ParseResult) -> Self {
        Self {
            candidate,
            parsed,
            media: None,
        }
    }

    /// Rebuild a context from what a job or task persisted: the release title,
    /// its protocol and the media it was grabbed for. Search metadata such as
    /// seeders or size is not kept and reads as zero.
    pub fn from_stored(title: &str, protocol: Protocol, media: MediaRef) -> Self {
        let candidate = DownloadCandidate {
            protocol,
            title: title.to_string(),
            link: String::new(),
            indexer: String::new(),
            indexer_id: 0,
            guid: String::new(),
            seeders: 0,
            peers: 0,
            size: 0,
            age: 0,
            age_hours: 0.0,
            grabs: 0,
            categories: Vec::new(),
            publish_date: None,
        };
        Self::new(candidate).with_media(media)
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    /// Resolve a field path. Missing optional values resolve to [`FieldValue::Null`].
    pub fn get_field(&self, path: &str) -> Result<FieldValue, CandidateError> {
        let (namespace, name) = path
            .split_once('.')
            .ok_or_else(|| CandidateError::InvalidFieldPath(path.to_string()))?;

        let value = match namespace {
            "candidate" => self.candidate_field(name),
            "quality" => self.quality_field(name),
            "release" => self.release_field(name),
            "media" => self.media_field(name),
            _ => None,
        };
        value.ok_or_else(|| CandidateError::UnknownField(path.to_string()))
    }

    fn candidate_field(&self, name: &str) -> Option<FieldValue> {
        let c = &self.candidate;
        Some(match name {
            "size" => FieldValue::Int(c.size),
            "title" => FieldValue::text(&c.title),
            "indexer" => FieldValue::text(&c.indexer),
            "indexer_id" => FieldValue::Int(c.indexer_id),
            "categories" => FieldValue::List(c.categories.clone()),
            "protocol" => FieldValue::text(c.protocol.as_str()),
            "seeders" => FieldValue::Int(c.seeders),
            "peers" => FieldValue::Int(c.peers),
            "age" => FieldValue::Int(c.age),
            "age_hours" => FieldValue::Float(c.age_hours),
            "grabs" => FieldValue::Int(c.grabs),
            "publish_date" => c
                .publish_date
                .map(|d| FieldValue::Text(d.to_rfc3339()))
                .unwrap_or(FieldValue::Null),
            "link" => FieldValue::text(&c.link),
            "guid" => FieldValue::text(&c.guid),
            _ => return None,
        })
    }

    fn quality_field(&self, name: &str) -> Option<FieldValue> {
        let q = &self.parsed.quality;
        Some(match name {
            "full" => FieldValue::text(q.full()),
            "resolution" => FieldValue::text(q.resolution()),
            "source" => FieldValue::text(q.source()),
            "is_remux" => FieldValue::Bool(q.is_remux()),
            "is_repack" => FieldValue::Bool(q.revision.is_repack),
            "version" => FieldValue::Int(i64::from(q.revision.version)),
            _ => return None,
        })
    }

    fn release_field(&self, name: &str) -> Option<FieldValue> {
        let r = &self.parsed.release;
        Some(match name {
            "release_group" => FieldValue::opt_text(r.release_group.as_deref()),
            "edition" => FieldValue::opt_text(r.edition.as_deref()),
            _ => return None,
        })
    }

    fn media_field(&self, name: &str) -> Option<FieldValue> {
        // Valid paths resolve to Null when no media is attached.
        field_info(&format!("media.{}", name))?;
        let Some(m) = &self.media else {
            return Some(FieldValue::Null);
        };
        Some(match name {
            "type" => FieldValue::text(m.media_type.as_str()),
            "title" => FieldValue::text(&m.title),
            "clean_title" => FieldValue::Text(clean_title(&m.title)),
            "year" => FieldValue::opt_int(m.year.map(i64::from)),
            "tmdb_id" => FieldValue::opt_int(m.external_id),
            "season" => FieldValue::opt_int(m.season.map(i64::from)),
            "episode" => FieldValue::opt_int(m.episode.map(i64::from)),
            "episode_title" => FieldValue::opt_text(m.episode_title.as_deref()),
            _ => return None,
        })
    }
}
