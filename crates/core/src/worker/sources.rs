//! Mapping a finished download's files to import sources.

use std::path::Path;

use crate::candidate::{MediaRef, MediaType};
use crate::downloader::DownloadFile;
use crate::import::{match_files_to_episodes, parse_episode_numbers, pick_main_file};

/// Absolute path of a listed file. Relative paths are joined onto the save path,
/// falling back to the content path.
pub fn resolve_file_path(
    file_path: &str,
    save_path: Option<&str>,
    content_path: Option<&str>,
) -> Option<String> {
    let path = Path::new(file_path);
    if path.is_absolute() {
        return Some(file_path.to_string());
    }
    save_path
        .or(content_path)
        .filter(|base| !base.is_empty())
        .map(|base| Path::new(base).join(path).to_string_lossy().into_owned())
}

/// The files `media` should be imported from.
///
/// A movie yields its main file. A series yields one entry per matched episode,
/// each carrying the episode it covers.
pub fn select_sources<'a>(
    media: &MediaRef,
    files: &'a [DownloadFile],
) -> Vec<(MediaRef, &'a DownloadFile)> {
    match media.media_type {
        MediaType::Movie => pick_main_file(files)
            .map(|file| vec![(media.clone(), file)])
            .unwrap_or_default(),
        MediaType::Series => match_files_to_episodes(files, media.season, media.episode)
            .into_iter()
            .map(|(episode, file)| {
                let season = media
                    .season
                    .or_else(|| file_name(&file.path).and_then(parse_episode_numbers).map(|(s, _)| s))
                    .unwrap_or(1);
                let mut episode_media = media.clone().with_episode(season, Some(episode));
                if media.episode != Some(episode) {
                    episode_media.episode_title = None;
                }
                (episode_media, file)
            })
            .collect(),
    }
}

/// The single file `media` maps to, for re-resolving a stored source.
pub fn find_source<'a>(media: &MediaRef, files: &'a [DownloadFile]) -> Option<&'a DownloadFile> {
    match media.media_type {
        MediaType::Movie => pick_main_file(files),
        MediaType::Series => {
            let episode = media.episode?;
            match_files_to_episodes(files, media.season, Some(episode))
                .remove(&episode)
        }
    }
}

fn file_name(path: &str) -> Option<&str> {
    Path::new(path).file_name().and_then(|n| n.to_str())
}
