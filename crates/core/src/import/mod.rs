//! Import tasks: placing downloaded files into libraries.

mod catalog;
mod select;
mod service;
mod sqlite_store;
mod store;
mod types;

pub use catalog::{CatalogError, MediaCatalog, MediaFile, NewMediaFile, SqliteMediaCatalog};
pub use select::{
    ensure_extension, is_video_path, looks_like_sample, match_files_to_episodes,
    parse_episode_numbers, pick_main_file,
};
pub use service::ImportService;
pub use sqlite_store::SqliteImportTaskStore;
pub use store::{ImportError, ImportTaskStore};
pub use types::{ImportTask, NewImportTask, TaskFilter, TaskStatus, TaskUpdate};
pub use crate::placer::ImportMethod;
