//! Release group extraction.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::patterns as re;

/// Groups that do not follow the `-GROUP` convention, matched verbatim.
const EXACT_EXCEPTIONS: &[&str] = &[
    "KRaLiMaRKo",
    "E.N.D",
    "D-Z0N3",
    "Koten_Gars",
    "BluDragon",
    "ZØNEHD",
    "HQMUX",
    "VARYG",
    "YIFY",
    "YTS",
    "YTS.MX",
    "YTS.LT",
    "YTS.AG",
    "TMd",
    "Eml HDTeam",
    "LMain",
    "DarQ",
    "BEN THE MEN",
    "TAoE",
    "QxR",
    "Fight-BB",
    "KCRT",
    "Vialle",
    "126811",
];

/// Groups whose releases end with `GROUP)` or `GROUP]`.
const BRACKETED_EXCEPTIONS: &[&str] = &[
    "Silence",
    "afm72",
    "Panda",
    "Ghost",
    "MONOLITH",
    "Tigole",
    "Joy",
    "ImE",
    "UTR",
    "t3nzin",
    "Anime Time",
    "Project Angel",
    "Hakata Ramen",
    "HONE",
    "GiLG",
    "Vyndros",
    "SEV",
    "Garshasp",
    "Kappa",
    "Natty",
    "RCVR",
    "SAMPA",
    "YOGI",
    "r00t",
    "EDGE2020",
    "RZeroX",
    "FreetheFish",
    "Anna",
    "Bandi",
    "Qman",
    "theincognito",
    "HDO",
    "DusIctv",
    "DHD",
    "CtrlHD",
    "-ZR-",
    "ADC",
    "XZVN",
    "RH",
    "Kametsu",
];

/// Tokens that look like a group suffix but describe the encode.
const DENY_LIST: &[&str] = &[
    "480p", "576p", "720p", "1080p", "1440p", "2160p", "4320p", "WEB-DL", "WEBDL", "WEB-Rip",
    "WEBRip", "Blu-Ray", "BluRay", "DTS-HD", "DTS-X", "DTS-MA", "DTS-ES", "DTS", "HDTV", "SDTV",
    "PDTV", "DL", "Rip", "HD", "MA", "ES", "X", "bit", "REMUX", "AVC", "HEVC", "H264", "H265",
    "x264", "x265", "DD", "DDP", "AAC", "FLAC", "TrueHD", "Atmos", "HDR", "HDR10", "DV", "Dolby",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    ".mkv", ".mp4", ".avi", ".m4v", ".mov", ".wmv", ".flv", ".ts", ".m2ts", ".vob", ".iso",
    ".img", ".mpg", ".mpeg",
];

/// Exact exceptions, longest first so `YTS.LT` wins over `YTS`.
static EXACT_BY_LENGTH: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut sorted = EXACT_EXCEPTIONS.to_vec();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()));
    sorted
});

static BRACKETED_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    BRACKETED_EXCEPTIONS
        .iter()
        .map(|name| {
            let pattern = format!(r"(?i)[._ \[]{}(?:\)|\])", regex_lite::escape(name));
            let regex = Regex::new(&pattern).expect("exception pattern must compile");
            (*name, regex)
        })
        .collect()
});

/// Strip a trailing video extension, case-insensitively.
pub fn remove_file_extension(title: &str) -> &str {
    let lower = title.to_ascii_lowercase();
    for ext in VIDEO_EXTENSIONS {
        if lower.ends_with(ext) {
            return &title[..title.len() - ext.len()];
        }
    }
    title
}

/// Extract the release group from a raw title. `None` when no trustworthy group is found.
pub fn parse_release_group(title: &str) -> Option<String> {
    let title = remove_file_extension(title.trim());
    let title = re::WEBSITE_PREFIX.replace_all(title, "");
    let title = re::TORRENT_SUFFIX.replace_all(&title, "").into_owned();

    if let Some(caps) = re::ANIME_RELEASE_GROUP.captures(&title) {
        if let Some(group) = caps.get(1).filter(|m| !m.as_str().is_empty()) {
            return Some(group.as_str().trim().to_string());
        }
    }

    let title = re::CLEAN_RELEASE_GROUP.replace_all(&title, "").into_owned();

    // ASCII lowering keeps byte offsets aligned with the original.
    let lower = title.to_ascii_lowercase();
    for exception in EXACT_BY_LENGTH.iter() {
        let needle = exception.to_ascii_lowercase();
        if let Some(idx) = lower.rfind(&needle) {
            return Some(title[idx..idx + exception.len()].to_string());
        }
    }

    for (name, pattern) in BRACKETED_PATTERNS.iter() {
        if pattern.is_match(&title) {
            return Some((*name).to_string());
        }
    }

    let last = re::RELEASE_GROUP.captures_iter(&title).last()?;
    let (group, bracketed) = match (last.get(1), last.get(2)) {
        (Some(m), _) if !m.as_str().is_empty() => (m.as_str(), false),
        (_, Some(m)) if !m.as_str().is_empty() => (m.as_str(), true),
        _ => return None,
    };

    if is_rejected(group, bracketed) {
        return None;
    }
    Some(group.to_string())
}

fn is_rejected(group: &str, bracketed: bool) -> bool {
    if group.parse::<i64>().is_ok() {
        return true;
    }
    if re::INVALID_RELEASE_GROUP.is_match(group) {
        return true;
    }
    if is_deny_listed(group) {
        return true;
    }
    if re::DATE_LIKE.is_match(group) {
        return true;
    }
    if re::LANGUAGE_CODE.is_match(&group.to_ascii_uppercase()) {
        return true;
    }
    if re::BIT_DEPTH.is_match(&group.to_ascii_lowercase()) {
        return true;
    }
    // Channel layouts such as `[5.1]`.
    if re::AUDIO_CHANNELS.is_match(group) {
        return true;
    }
    // Two characters or fewer is too ambiguous unless bracketed.
    !bracketed && group.len() <= 2
}

/// True when a group candidate would be filtered as an encode descriptor.
pub fn is_deny_listed(group: &str) -> bool {
    DENY_LIST.iter().any(|d| d.eq_ignore_ascii_case(group))
}
