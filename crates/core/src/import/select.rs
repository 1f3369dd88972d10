//! Choosing which downloaded files to import.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::downloader::DownloadFile;

const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m2ts"];

/// `S01E02`, `s01e02-e03`, `S01E02E03`.
static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)s(\d+)e(\d+)(?:-?e?(\d+))?").expect("valid season/episode regex")
});

/// `1x02`.
static CROSS_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)x(\d+)").expect("valid NxMM regex"));

/// Multi-episode ranges wider than this are treated as two separate numbers.
const MAX_RANGE_SPAN: u32 = 10;

pub fn is_video_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

pub fn looks_like_sample(path: &str) -> bool {
    path.to_lowercase().contains("sample")
}

fn largest<'a>(files: impl Iterator<Item = &'a DownloadFile>) -> Option<&'a DownloadFile> {
    // Ties keep the first file listed.
    files.fold(None, |best: Option<&DownloadFile>, f| match best {
        Some(b) if b.size >= f.size => Some(b),
        _ => Some(f),
    })
}

/// The file a movie import should use: the largest non-sample video, else the
/// largest non-sample file, else whatever is there.
pub fn pick_main_file(files: &[DownloadFile]) -> Option<&DownloadFile> {
    let usable = |f: &&DownloadFile| f.size > 0 && !looks_like_sample(&f.path);

    largest(files.iter().filter(usable).filter(|f| is_video_path(&f.path)))
        .or_else(|| largest(files.iter().filter(usable)))
        .or_else(|| files.first())
}

/// Season and episode numbers named by a file name.
pub fn parse_episode_numbers(name: &str) -> Option<(u32, BTreeSet<u32>)> {
    if let Some(caps) = SEASON_EPISODE.captures(name) {
        let season = caps.get(1)?.as_str().parse().ok()?;
        let first: u32 = caps.get(2)?.as_str().parse().ok()?;
        let mut episodes = BTreeSet::from([first]);
        if let Some(second) = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok()) {
            if second > first && second - first < MAX_RANGE_SPAN {
                episodes.extend(first..=second);
            } else {
                episodes.insert(second);
            }
        }
        return Some((season, episodes));
    }

    let caps = CROSS_FORMAT.captures(name)?;
    let season = caps.get(1)?.as_str().parse().ok()?;
    let episode = caps.get(2)?.as_str().parse().ok()?;
    Some((season, BTreeSet::from([episode])))
}

/// Map episode numbers to the largest video file that covers them.
///
/// With `season` set, files from other seasons are ignored. With `episode` set,
/// only that episode is returned.
pub fn match_files_to_episodes(
    files: &[DownloadFile],
    season: Option<u32>,
    episode: Option<u32>,
) -> BTreeMap<u32, &DownloadFile> {
    let mut matched: BTreeMap<u32, &DownloadFile> = BTreeMap::new();

    for file in files {
        if !is_video_path(&file.path) || looks_like_sample(&file.path) {
            continue;
        }
        let name = Path::new(&file.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&file.path);
        let Some((file_season, episodes)) = parse_episode_numbers(name) else {
            continue;
        };
        if season.is_some_and(|s| s != file_season) {
            continue;
        }

        for ep in episodes {
            if episode.is_some_and(|wanted| wanted != ep) {
                continue;
            }
            match matched.get(&ep) {
                Some(existing) if existing.size >= file.size => {}
                _ => {
                    matched.insert(ep, file);
                }
            }
        }
    }

    matched
}

/// Give `dest` the source's extension unless it already ends with it.
pub fn ensure_extension(dest: &Path, source: &Path) -> PathBuf {
    let Some(ext) = source.extension().and_then(|e| e.to_str()) else {
        return dest.to_path_buf();
    };
    if ext.is_empty() {
        return dest.to_path_buf();
    }
    let has_ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|current| current.eq_ignore_ascii_case(ext));
    if has_ext {
        return dest.to_path_buf();
    }

    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, u64)]) -> Vec<DownloadFile> {
        entries
            .iter()
            .map(|(path, size)| DownloadFile::new(*path, *size))
            .collect()
    }

    #[test]
    fn test_pick_largest_video() {
        let list = files(&[
            ("Movie/movie.nfo", 1_000),
            ("Movie/Sample/movie-sample.mkv", 50_000_000),
            ("Movie/movie.mkv", 8_000_000_000),
            ("Movie/extras.mp4", 300_000_000),
        ]);
        assert_eq!(pick_main_file(&list).unwrap().path, "Movie/movie.mkv");
    }

    #[test]
    fn test_pick_falls_back_to_non_video() {
        let list = files(&[("a/sample.mkv", 10), ("a/movie.iso", 4_000), ("a/info.txt", 10)]);
        assert_eq!(pick_main_file(&list).unwrap().path, "a/movie.iso");

        let only_samples = files(&[("x/sample.mkv", 10), ("x/SAMPLE.avi", 20)]);
        assert_eq!(pick_main_file(&only_samples).unwrap().path, "x/sample.mkv");

        assert!(pick_main_file(&[]).is_none());
    }

    #[test]
    fn test_pick_ignores_empty_files() {
        let list = files(&[("a/movie.mkv", 0), ("a/notes.txt", 5)]);
        assert_eq!(pick_main_file(&list).unwrap().path, "a/notes.txt");
    }

    #[test]
    fn test_parse_episode_numbers() {
        let parse = |n: &str| {
            parse_episode_numbers(n).map(|(s, eps)| (s, eps.into_iter().collect::<Vec<_>>()))
        };
        assert_eq!(parse("Show.S01E02.720p.mkv"), Some((1, vec![2])));
        assert_eq!(parse("show.s02e03-e05.mkv"), Some((2, vec![3, 4, 5])));
        assert_eq!(parse("Show.S01E01E02.mkv"), Some((1, vec![1, 2])));
        assert_eq!(parse("Show.S01E01-E30.mkv"), Some((1, vec![1, 30])));
        assert_eq!(parse("Show 3x07 Title.avi"), Some((3, vec![7])));
        assert_eq!(parse("Movie.2012.mkv"), None);
    }

    #[test]
    fn test_match_episodes_keeps_largest() {
        let list = files(&[
            ("Show.S01/Show.S01E01.720p.mkv", 700),
            ("Show.S01/Show.S01E01.1080p.mkv", 1_400),
            ("Show.S01/Show.S01E02.mkv", 1_300),
            ("Show.S01/Show.S01E02.sample.mkv", 2_000),
            ("Show.S01/Show.S01E03.nfo", 10),
            ("Show.S01/Show.S02E01.mkv", 1_200),
        ]);

        let all = match_files_to_episodes(&list, Some(1), None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[&1].path, "Show.S01/Show.S01E01.1080p.mkv");
        assert_eq!(all[&2].path, "Show.S01/Show.S01E02.mkv");

        let one = match_files_to_episodes(&list, Some(1), Some(2));
        assert_eq!(one.keys().copied().collect::<Vec<_>>(), vec![2]);

        let any_season = match_files_to_episodes(&list, None, Some(1));
        assert_eq!(any_season.len(), 1);
        assert!(match_files_to_episodes(&list, Some(4), None).is_empty());
    }

    #[test]
    fn test_match_uses_file_name_only() {
        // The directory says S01E01, the file does not name an episode.
        let list = files(&[("Show.S01E01/show.mkv", 100)]);
        assert!(match_files_to_episodes(&list, Some(1), Some(1)).is_empty());
    }

    #[test]
    fn test_ensure_extension() {
        let src = Path::new("/dl/movie.MKV");
        assert_eq!(
            ensure_extension(Path::new("Film (2020)/Film (2020)"), src),
            PathBuf::from("Film (2020)/Film (2020).MKV")
        );
        assert_eq!(
            ensure_extension(Path::new("Film/Film.mkv"), src),
            PathBuf::from("Film/Film.mkv")
        );
        // A dot in the title is not an extension.
        assert_eq!(
            ensure_extension(Path::new("Mr. Robot - S01E01"), Path::new("a.mkv")),
            PathBuf::from("Mr. Robot - S01E01.mkv")
        );
        assert_eq!(
            ensure_extension(Path::new("Film"), Path::new("/dl/noext")),
            PathBuf::from("Film")
        );
    }
}
