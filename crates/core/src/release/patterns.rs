//! Compiled title patterns. Every pattern is case-insensitive.

use once_cell::sync::Lazy;
use regex_lite::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("release pattern must compile")
}

// =============================================================================
// Resolution
// =============================================================================

pub(crate) static RESOLUTION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(?:(?P<r360>360p)|(?P<r480>480p|480i|640x480|848x480)|(?P<r540>540p)|(?P<r576>576p)|(?P<r720>720p|1280x720|960p)|(?P<r1080>1080p|1920x1080|1440p|FHD|1080i|4kto1080p)|(?P<r2160>2160p|3840x2160|4k[-_. ](?:UHD|HEVC|BD|H265)|(?:UHD|HEVC|BD|H265)[-_. ]4k))\b",
    )
});

pub(crate) static ALT_RESOLUTION: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:UHD)\b|\[4K\]"));

// =============================================================================
// Sources
// =============================================================================

pub(crate) static BLURAY: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(?:BluRay|Blu-Ray|HD-?DVD|BDMux)\b|\bBD[^a-z]"));

pub(crate) static WEBDL: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(?:WEB[-_. ]DL(?:mux)?|WEBDL|AmazonHD|AmazonSD|iTunesHD|MaxdomeHD|NetflixU?HD|WebHD|HBOMaxHD|DisneyHD|[. ]WEB[. ](?:[xh][ .]?26[45]|AVC|HEVC|DDP?5[. ]1)|[. ]WEB$|(?:720|1080|2160)p[-. ]WEB[-. ]|[-. ]WEB[-. ](?:720|1080|2160)p|\b\s/\sWEB\s/\s\b|(?:AMZN|NF|DP)[. -]WEB[. -])",
    )
});

pub(crate) static WEBRIP: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:WebRip|Web-Rip|WEBMux)\b"));
pub(crate) static HDTV: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bHDTV\b"));
pub(crate) static DVD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:DVD|DVDRip|NTSC|PAL|xvidvd)\b"));
pub(crate) static RAWHD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:RawHD|Raw[-_. ]HD)\b"));
pub(crate) static MPEG2: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bMPEG[-_. ]?2\b"));
pub(crate) static BDRIP: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:BDRip|BDLight)\b"));
pub(crate) static BRRIP: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bBRRip\b"));
pub(crate) static PDTV: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bPDTV\b"));
pub(crate) static DSR: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:WS[-_. ]DSR|DSR)\b"));
pub(crate) static TVRIP: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bTVRip\b"));
pub(crate) static SDTV: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bSDTV\b"));
pub(crate) static HIGH_DEF_PDTV: Lazy<Regex> = Lazy::new(|| compile(r"(?i)hr[-_. ]ws"));

pub(crate) static REMUX: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(?:[_. ]|\d{4}p-|\bHybrid-)(?:(?:BD|UHD)[-_. ]?)?Remux\b|(?:(?:BD|UHD)[-_. ]?)?Remux[_. ]\d{4}p",
    )
});

pub(crate) static ANIME_BLURAY: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)bd(?:720|1080|2160)|[-_. (\[]bd[-_. )\]]"));
pub(crate) static ANIME_WEBDL: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\[WEB\]|[\[(]WEB[ .]"));

pub(crate) static CODEC: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(?:(?P<x264>x264)|(?P<h264>h264)|(?P<xvidhd>XvidHD)|(?P<xvid>Xvid)|(?P<divx>divx))\b")
});

pub(crate) static OTHER_SOURCE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)(?P<hdtv>HD[-_. ]TV)|(?P<sdtv>SD[-_. ]TV)"));

// =============================================================================
// Revision
// =============================================================================

pub(crate) static PROPER: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bproper\b"));
pub(crate) static REPACK: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(?:repack\d?|rerip\d?)\b"));

/// Each alternative carries its own version capture; at most one participates.
pub(crate) static VERSION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\d[-._ ]?v(\d)[-._ ]|\[v(\d)\]|repack(\d)|rerip(\d)|(?:480|576|720|1080|2160)p[._ ]v(\d)",
    )
});

// =============================================================================
// Release group
// =============================================================================

/// Group 1 is a `-GROUP` suffix, group 2 a trailing `[GROUP]`.
pub(crate) static RELEASE_GROUP: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)-([a-z0-9]+(?:-[a-z0-9]+)?)(?:\b|[-._ ]|$)|[-._ ]\[([a-z0-9.]+)\]$")
});

pub(crate) static ANIME_RELEASE_GROUP: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)^\[([^\]]+)\](?:_|-|\s|\.)?"));

pub(crate) static INVALID_RELEASE_GROUP: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)^(?:[se]\d+|[0-9a-f]{8})$"));

pub(crate) static CLEAN_RELEASE_GROUP: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(?:-(?:RP|1|NZBGeek|Obfuscated|Obfuscation|Scrambled|sample|Pre|postbot|xpost|Rakuv[a-z0-9]*|WhiteRev|BUYMORE|AsRequested|AlternativeToRequested|GEROV|Z0iDS3N|Chamele0n|4P|4Planet|AlteZachen|RePACKPOST))+$",
    )
});

pub(crate) static WEBSITE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)^(?:(?:\[|\()\s*)?(?:www\.)?[-a-z0-9]{1,256}\.(?:[a-z]{2,6}\.[a-z]{2,6}|[a-z]{2,})(?:\s*(?:\]|\))|[ -]{2,})[ -]*",
    )
});

pub(crate) static TORRENT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\[(?:ettv|rartv|rarbg|cttv|publichd)(?:\.com)?\]$"));

pub(crate) static DATE_LIKE: Lazy<Regex> = Lazy::new(|| compile(r"^\d{1,4}-\d{1,2}$|^\d{1,2}$"));
pub(crate) static LANGUAGE_CODE: Lazy<Regex> =
    Lazy::new(|| compile(r"^(?:EN|ES|CAT|ENG|JAP|GER|FRA|FRE|ITA)$"));
pub(crate) static BIT_DEPTH: Lazy<Regex> = Lazy::new(|| compile(r"^\d{1,2}-bit$"));
pub(crate) static AUDIO_CHANNELS: Lazy<Regex> = Lazy::new(|| compile(r"^\d{1,2}\.\d$"));

// =============================================================================
// Edition
// =============================================================================

pub(crate) static EDITION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\(?\b((?:(?:Recut|Extended|Ultimate)[. ])?(?:Director.?s|Collector.?s|Theatrical|Ultimate|Extended|Despecialized|Special|Rouge|Final|Assembly|Imperial|Diamond|Signature|Hunter|Rekall|Uncensored|Remastered|Unrated|Uncut|IMAX|Fan[. ]?Edit|Restored|[23]in1|\d{2,3}(?:th)? Anniversary)[. ]?(?:Cut|Edition|Version)?(?:[. ](?:Extended|Uncensored|Remastered|Unrated|Uncut|Open[. ]?Matte|IMAX|Fan[. ]?Edit))?|(?:Open[. ]?Matte|4in1))\b\)?",
    )
});

pub(crate) static FOLLOWED_BY_YEAR: Lazy<Regex> = Lazy::new(|| compile(r"^[.\s]*(?:19|20)\d{2}"));
pub(crate) static DOT_JOINED_WORD: Lazy<Regex> = Lazy::new(|| compile(r"[a-zA-Z]+\.\s*$"));
