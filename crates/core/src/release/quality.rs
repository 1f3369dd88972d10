//! Quality taxonomy: source x resolution composites plus revision info.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A release quality, a composite of source and resolution.
///
/// Discriminants are stable identifiers and are what gets compared when
/// policies test `quality.id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Unknown = 0,
    Sdtv = 1,
    Dvd = 2,
    WebDl1080p = 3,
    Hdtv720p = 4,
    WebDl720p = 5,
    Bluray720p = 6,
    Bluray1080p = 7,
    WebDl480p = 8,
    Hdtv1080p = 9,
    RawHd = 10,
    WebRip480p = 12,
    Bluray480p = 13,
    WebRip720p = 14,
    WebRip1080p = 15,
    Hdtv2160p = 16,
    WebRip2160p = 17,
    WebDl2160p = 18,
    Bluray2160p = 19,
    Bluray1080pRemux = 20,
    Bluray2160pRemux = 21,
    Bluray576p = 22,
}

impl Quality {
    /// Stable numeric id.
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Full display name, e.g. `WEBDL-1080p` or `Bluray-2160p Remux`.
    pub fn name(self) -> &'static str {
        match self {
            Quality::Unknown => "Unknown",
            Quality::Sdtv => "SDTV",
            Quality::Dvd => "DVD",
            Quality::WebDl1080p => "WEBDL-1080p",
            Quality::Hdtv720p => "HDTV-720p",
            Quality::WebDl720p => "WEBDL-720p",
            Quality::Bluray720p => "Bluray-720p",
            Quality::Bluray1080p => "Bluray-1080p",
            Quality::WebDl480p => "WEBDL-480p",
            Quality::Hdtv1080p => "HDTV-1080p",
            Quality::RawHd => "Raw-HD",
            Quality::WebRip480p => "WEBRip-480p",
            Quality::Bluray480p => "Bluray-480p",
            Quality::WebRip720p => "WEBRip-720p",
            Quality::WebRip1080p => "WEBRip-1080p",
            Quality::Hdtv2160p => "HDTV-2160p",
            Quality::WebRip2160p => "WEBRip-2160p",
            Quality::WebDl2160p => "WEBDL-2160p",
            Quality::Bluray2160p => "Bluray-2160p",
            Quality::Bluray1080pRemux => "Bluray-1080p Remux",
            Quality::Bluray2160pRemux => "Bluray-2160p Remux",
            Quality::Bluray576p => "Bluray-576p",
        }
    }

    /// Source component (`WEB-DL`, `BluRay`, `HDTV`, ...).
    pub fn source(self) -> &'static str {
        match self {
            Quality::Sdtv => "SDTV",
            Quality::Dvd => "DVD",
            Quality::WebDl480p | Quality::WebDl720p | Quality::WebDl1080p | Quality::WebDl2160p => {
                "WEB-DL"
            }
            Quality::Hdtv720p | Quality::Hdtv1080p | Quality::Hdtv2160p => "HDTV",
            Quality::Bluray480p
            | Quality::Bluray576p
            | Quality::Bluray720p
            | Quality::Bluray1080p
            | Quality::Bluray2160p
            | Quality::Bluray1080pRemux
            | Quality::Bluray2160pRemux => "BluRay",
            Quality::WebRip480p
            | Quality::WebRip720p
            | Quality::WebRip1080p
            | Quality::WebRip2160p => "WEBRip",
            Quality::RawHd => "Raw-HD",
            Quality::Unknown => "Unknown",
        }
    }

    /// Resolution component. SD sources report `SD`.
    pub fn resolution(self) -> &'static str {
        match self {
            Quality::WebDl1080p
            | Quality::Bluray1080p
            | Quality::Hdtv1080p
            | Quality::WebRip1080p
            | Quality::Bluray1080pRemux
            | Quality::RawHd => "1080p",
            Quality::Hdtv720p | Quality::WebDl720p | Quality::Bluray720p | Quality::WebRip720p => {
                "720p"
            }
            Quality::WebDl480p | Quality::WebRip480p | Quality::Bluray480p => "480p",
            Quality::Hdtv2160p
            | Quality::WebRip2160p
            | Quality::WebDl2160p
            | Quality::Bluray2160p
            | Quality::Bluray2160pRemux => "2160p",
            Quality::Bluray576p => "576p",
            Quality::Sdtv | Quality::Dvd => "SD",
            Quality::Unknown => "Unknown",
        }
    }

    pub fn is_remux(self) -> bool {
        matches!(self, Quality::Bluray1080pRemux | Quality::Bluray2160pRemux)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Revision of a release: version number and repack flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Revision {
    /// 0 when no version marker was seen.
    pub version: u32,
    pub is_repack: bool,
}

impl Revision {
    /// PROPER/REPACK semantics: jump to v2, or step past an explicit version.
    pub(crate) fn bump(&mut self) {
        if self.version < 2 {
            self.version = 2;
        } else {
            self.version += 1;
        }
    }
}

/// Classified quality of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QualityInfo {
    pub quality: Quality,
    pub revision: Revision,
}

impl QualityInfo {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            revision: Revision::default(),
        }
    }

    /// Quality tag without revision, as used in name templates.
    pub fn full(&self) -> &'static str {
        self.quality.name()
    }

    pub fn source(&self) -> &'static str {
        self.quality.source()
    }

    pub fn resolution(&self) -> &'static str {
        self.quality.resolution()
    }

    pub fn is_remux(&self) -> bool {
        self.quality.is_remux()
    }
}

impl fmt::Display for QualityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.quality.name())?;
        if self.revision.version > 1 {
            write!(f, " v{}", self.revision.version)?;
        }
        if self.revision.is_repack {
            f.write_str(" [REPACK]")?;
        }
        Ok(())
    }
}
