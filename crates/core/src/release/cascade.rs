//! Quality cascade.
//!
//! The cascade is an ordered list of `(predicate, resolver)` rules. The first
//! rule whose predicate holds and whose resolver yields a quality wins. A
//! resolver returning `None` lets evaluation fall through to the next rule;
//! returning `Some(Quality::Unknown)` stops the cascade on purpose.

use tracing::trace;

use super::patterns as re;
use super::quality::Quality;

/// Everything the rules look at, computed once per title.
#[derive(Debug, Clone)]
pub(crate) struct Signals<'a> {
    /// Title exactly as given.
    pub raw: &'a str,
    /// Underscores replaced by spaces, trimmed.
    pub normalized: &'a str,
    /// Detected vertical resolution, 0 when none.
    pub resolution: u32,
    pub remux: bool,
    pub xvid: bool,
    pub divx: bool,
    pub x264: bool,
}

impl<'a> Signals<'a> {
    pub fn new(raw: &'a str, normalized: &'a str) -> Self {
        let mut signals = Self {
            raw,
            normalized,
            resolution: parse_resolution(normalized),
            remux: re::REMUX.is_match(normalized),
            xvid: false,
            divx: false,
            x264: false,
        };

        if let Some(caps) = re::CODEC.captures(normalized) {
            signals.xvid = caps.name("xvid").is_some();
            signals.divx = caps.name("divx").is_some();
            signals.x264 = caps.name("x264").is_some();
        }

        signals
    }
}

type Predicate = fn(&Signals<'_>) -> bool;
type Resolver = fn(&Signals<'_>) -> Option<Quality>;

pub(crate) struct Rule {
    pub name: &'static str,
    pub applies: Predicate,
    pub resolve: Resolver,
}

pub(crate) const CASCADE: &[Rule] = &[
    Rule { name: "raw_hd", applies: has_raw_hd, resolve: always_raw_hd },
    Rule { name: "bluray", applies: has_bluray, resolve: resolve_bluray },
    Rule { name: "web_dl", applies: has_web_dl, resolve: resolve_web_dl },
    Rule { name: "web_rip", applies: has_web_rip, resolve: resolve_web_rip },
    Rule { name: "hdtv", applies: has_hdtv, resolve: resolve_hdtv },
    Rule { name: "dvd", applies: has_dvd, resolve: always_dvd },
    Rule { name: "bd_rip", applies: has_bd_rip, resolve: resolve_bd_rip },
    Rule { name: "tv_capture", applies: has_tv_capture, resolve: resolve_tv_capture },
    Rule { name: "remux_resolution", applies: has_remux_and_resolution, resolve: resolve_remux_resolution },
    Rule { name: "anime_bluray", applies: has_anime_bluray, resolve: resolve_anime_bluray },
    Rule { name: "anime_web_dl", applies: has_anime_web_dl, resolve: resolve_anime_web_dl },
    Rule { name: "bare_resolution", applies: has_resolution, resolve: resolve_bare_resolution },
    Rule { name: "x264", applies: has_x264, resolve: always_sdtv },
    Rule { name: "bluray_literal", applies: always, resolve: resolve_bluray_literal },
    Rule { name: "spaced_tv", applies: always, resolve: resolve_spaced_tv },
    Rule { name: "extension", applies: always, resolve: resolve_extension },
];

/// Run the cascade over precomputed signals.
pub(crate) fn classify(signals: &Signals<'_>) -> Quality {
    for rule in CASCADE {
        if !(rule.applies)(signals) {
            continue;
        }
        if let Some(quality) = (rule.resolve)(signals) {
            trace!(rule = rule.name, quality = %quality, "Quality rule matched");
            return quality;
        }
    }
    Quality::Unknown
}

/// Vertical resolution detected in a title, 0 when none.
pub fn parse_resolution(name: &str) -> u32 {
    if let Some(caps) = re::RESOLUTION.captures(name) {
        let tiers = [
            ("r360", 360),
            ("r480", 480),
            ("r540", 540),
            ("r576", 576),
            ("r720", 720),
            ("r1080", 1080),
            ("r2160", 2160),
        ];
        for (group, value) in tiers {
            if caps.name(group).is_some() {
                return value;
            }
        }
    }

    if re::ALT_RESOLUTION.is_match(name) {
        return 2160;
    }

    0
}

/// Quality implied by a file extension alone.
pub fn quality_for_extension(name: &str) -> Quality {
    let Some(dot) = name.rfind('.') else {
        return Quality::Unknown;
    };
    if dot == name.len() - 1 {
        return Quality::Unknown;
    }

    match name[dot..].to_ascii_lowercase().as_str() {
        ".avi" | ".m4v" | ".3gp" | ".nsv" | ".ty" | ".strm" | ".rm" | ".rmvb" | ".m3u" | ".ifo"
        | ".mov" | ".qt" | ".divx" | ".xvid" | ".bivx" | ".nrg" | ".pva" | ".wmv" | ".asf"
        | ".asx" | ".ogm" | ".ogv" | ".m2v" | ".bin" | ".dat" | ".dvr-ms" | ".mpg" | ".mpeg"
        | ".mp4" | ".avc" | ".vp3" | ".svq3" | ".nuv" | ".viv" | ".dv" | ".fli" | ".flv"
        | ".wpl" => Quality::Sdtv,
        ".img" | ".iso" | ".vob" => Quality::Dvd,
        ".mkv" | ".ts" | ".wtv" => Quality::Hdtv720p,
        ".m2ts" => Quality::Bluray720p,
        _ => Quality::Unknown,
    }
}

// =============================================================================
// Predicates
// =============================================================================

fn always(_: &Signals<'_>) -> bool {
    true
}

fn has_raw_hd(s: &Signals<'_>) -> bool {
    re::RAWHD.is_match(s.normalized)
}

fn has_bluray(s: &Signals<'_>) -> bool {
    re::BLURAY.is_match(s.normalized)
}

fn has_web_dl(s: &Signals<'_>) -> bool {
    re::WEBDL.is_match(s.normalized) && !re::WEBRIP.is_match(s.normalized)
}

fn has_web_rip(s: &Signals<'_>) -> bool {
    re::WEBRIP.is_match(s.normalized)
}

fn has_hdtv(s: &Signals<'_>) -> bool {
    re::HDTV.is_match(s.normalized)
}

fn has_dvd(s: &Signals<'_>) -> bool {
    re::DVD.is_match(s.normalized)
}

fn has_bd_rip(s: &Signals<'_>) -> bool {
    re::BDRIP.is_match(s.normalized) || re::BRRIP.is_match(s.normalized)
}

fn has_tv_capture(s: &Signals<'_>) -> bool {
    let n = s.normalized;
    re::PDTV.is_match(n) || re::SDTV.is_match(n) || re::DSR.is_match(n) || re::TVRIP.is_match(n)
}

fn has_remux_and_resolution(s: &Signals<'_>) -> bool {
    s.remux && s.resolution != 0
}

fn has_anime_bluray(s: &Signals<'_>) -> bool {
    re::ANIME_BLURAY.is_match(s.normalized)
}

fn has_anime_web_dl(s: &Signals<'_>) -> bool {
    re::ANIME_WEBDL.is_match(s.normalized)
}

fn has_resolution(s: &Signals<'_>) -> bool {
    s.resolution != 0
}

fn has_x264(s: &Signals<'_>) -> bool {
    s.x264
}

// =============================================================================
// Resolvers
// =============================================================================

fn always_raw_hd(_: &Signals<'_>) -> Option<Quality> {
    Some(Quality::RawHd)
}

fn always_dvd(_: &Signals<'_>) -> Option<Quality> {
    Some(Quality::Dvd)
}

fn always_sdtv(_: &Signals<'_>) -> Option<Quality> {
    Some(Quality::Sdtv)
}

fn bluray_by_resolution(s: &Signals<'_>, low: Quality) -> Quality {
    match s.resolution {
        2160 if s.remux => Quality::Bluray2160pRemux,
        2160 => Quality::Bluray2160p,
        1080 if s.remux => Quality::Bluray1080pRemux,
        1080 => Quality::Bluray1080p,
        720 => Quality::Bluray720p,
        360 | 480 | 540 | 576 => low,
        _ if s.remux => Quality::Bluray1080pRemux,
        _ => Quality::Bluray720p,
    }
}

fn resolve_bluray(s: &Signals<'_>) -> Option<Quality> {
    if s.xvid || s.divx {
        return Some(Quality::Bluray480p);
    }
    if s.resolution == 576 {
        return Some(Quality::Bluray576p);
    }
    Some(bluray_by_resolution(s, Quality::Bluray480p))
}

fn resolve_web_dl(s: &Signals<'_>) -> Option<Quality> {
    Some(match s.resolution {
        2160 => Quality::WebDl2160p,
        1080 => Quality::WebDl1080p,
        720 => Quality::WebDl720p,
        _ if s.raw.contains("[WEBDL]") => Quality::WebDl720p,
        _ => Quality::WebDl480p,
    })
}

fn resolve_web_rip(s: &Signals<'_>) -> Option<Quality> {
    Some(match s.resolution {
        2160 => Quality::WebRip2160p,
        1080 => Quality::WebRip1080p,
        720 => Quality::WebRip720p,
        _ => Quality::WebRip480p,
    })
}

fn resolve_hdtv(s: &Signals<'_>) -> Option<Quality> {
    if re::MPEG2.is_match(s.normalized) {
        return Some(Quality::RawHd);
    }
    Some(match s.resolution {
        2160 => Quality::Hdtv2160p,
        1080 => Quality::Hdtv1080p,
        720 => Quality::Hdtv720p,
        _ if s.raw.contains("[HDTV]") => Quality::Hdtv720p,
        _ => Quality::Sdtv,
    })
}

fn resolve_bd_rip(s: &Signals<'_>) -> Option<Quality> {
    Some(match s.resolution {
        2160 => Quality::Bluray2160p,
        1080 => Quality::Bluray1080p,
        720 => Quality::Bluray720p,
        _ => Quality::Bluray480p,
    })
}

fn resolve_tv_capture(s: &Signals<'_>) -> Option<Quality> {
    Some(match s.resolution {
        1080 => Quality::Hdtv1080p,
        720 => Quality::Hdtv720p,
        _ if re::HIGH_DEF_PDTV.is_match(s.normalized) => Quality::Hdtv720p,
        _ => Quality::Sdtv,
    })
}

fn resolve_remux_resolution(s: &Signals<'_>) -> Option<Quality> {
    match s.resolution {
        480 => Some(Quality::Bluray480p),
        720 => Some(Quality::Bluray720p),
        1080 => Some(Quality::Bluray1080pRemux),
        2160 => Some(Quality::Bluray2160pRemux),
        _ => None,
    }
}

fn resolve_anime_bluray(s: &Signals<'_>) -> Option<Quality> {
    Some(bluray_by_resolution(s, Quality::Dvd))
}

fn resolve_anime_web_dl(s: &Signals<'_>) -> Option<Quality> {
    Some(match s.resolution {
        2160 => Quality::WebDl2160p,
        1080 => Quality::WebDl1080p,
        720 => Quality::WebDl720p,
        360 | 480 | 540 | 576 => Quality::WebDl480p,
        _ => Quality::WebDl720p,
    })
}

fn resolve_bare_resolution(s: &Signals<'_>) -> Option<Quality> {
    // 540p without a recognized source is never guessed.
    if s.resolution == 540 {
        return Some(Quality::Unknown);
    }

    let bluray_ext = quality_for_extension(s.raw) == Quality::Bluray720p;
    match s.resolution {
        2160 if bluray_ext && s.remux => Some(Quality::Bluray2160pRemux),
        2160 if bluray_ext => Some(Quality::Bluray2160p),
        2160 => Some(Quality::Hdtv2160p),
        1080 if bluray_ext && s.remux => Some(Quality::Bluray1080pRemux),
        1080 if bluray_ext => Some(Quality::Bluray1080p),
        1080 => Some(Quality::Hdtv1080p),
        720 if bluray_ext => Some(Quality::Bluray720p),
        720 => Some(Quality::Hdtv720p),
        360 | 480 | 576 if bluray_ext => Some(Quality::Bluray480p),
        360 | 480 | 576 => Some(Quality::Sdtv),
        _ => None,
    }
}

fn resolve_bluray_literal(s: &Signals<'_>) -> Option<Quality> {
    let lower = s.normalized.to_ascii_lowercase();
    if lower.contains("bluray720p") {
        Some(Quality::Bluray720p)
    } else if lower.contains("bluray1080p") {
        Some(Quality::Bluray1080p)
    } else if lower.contains("bluray2160p") {
        Some(Quality::Bluray2160p)
    } else {
        None
    }
}

fn resolve_spaced_tv(s: &Signals<'_>) -> Option<Quality> {
    let caps = re::OTHER_SOURCE.captures(s.normalized)?;
    if caps.name("hdtv").is_some() {
        Some(Quality::Hdtv720p)
    } else if caps.name("sdtv").is_some() {
        Some(Quality::Sdtv)
    } else {
        None
    }
}

fn resolve_extension(s: &Signals<'_>) -> Option<Quality> {
    Some(quality_for_extension(s.raw))
}
