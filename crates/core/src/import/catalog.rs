//! Library catalog: what ended up where.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db;
use crate::placer::ImportMethod;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),
}

/// A file recorded in a library after import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub library_id: String,
    /// Catalog identity of the media item.
    pub media_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Relative to the library root.
    pub rel_path: String,
    pub import_task_id: String,
    pub method: ImportMethod,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaFile {
    pub library_id: String,
    pub media_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub rel_path: String,
    pub import_task_id: String,
    pub method: ImportMethod,
    pub size_bytes: u64,
}

pub trait MediaCatalog: Send + Sync {
    /// Record a placed file. A file already recorded at the same path is replaced.
    fn record(&self, file: NewMediaFile) -> Result<MediaFile, CatalogError>;

    fn get_by_path(&self, library_id: &str, rel_path: &str)
        -> Result<Option<MediaFile>, CatalogError>;

    fn list_for_media(&self, media_id: &str) -> Result<Vec<MediaFile>, CatalogError>;
}

/// SQLite-backed catalog.
pub struct SqliteMediaCatalog {
    conn: Mutex<Connection>,
}

const FILE_COLUMNS: &str =
    "id, library_id, media_id, season, episode, rel_path, import_task_id, method, size_bytes, created_at";

impl SqliteMediaCatalog {
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = db::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = db::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_files (
                id TEXT PRIMARY KEY,
                library_id TEXT NOT NULL,
                media_id TEXT NOT NULL,
                season INTEGER,
                episode INTEGER,
                rel_path TEXT NOT NULL,
                import_task_id TEXT NOT NULL,
                method TEXT NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(library_id, rel_path)
            );

            CREATE INDEX IF NOT EXISTS idx_media_files_media ON media_files(media_id);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<MediaFile> {
        let method: String = row.get(7)?;
        let size: i64 = row.get(8)?;
        Ok(MediaFile {
            id: row.get(0)?,
            library_id: row.get(1)?,
            media_id: row.get(2)?,
            season: row.get(3)?,
            episode: row.get(4)?,
            rel_path: row.get(5)?,
            import_task_id: row.get(6)?,
            method: ImportMethod::parse(&method).unwrap_or(ImportMethod::Copy),
            size_bytes: u64::try_from(size).unwrap_or_default(),
            created_at: db::parse_ts(&row.get::<_, String>(9)?)?,
        })
    }
}

impl MediaCatalog for SqliteMediaCatalog {
    fn record(&self, file: NewMediaFile) -> Result<MediaFile, CatalogError> {
        let conn = self.lock()?;
        let size = i64::try_from(file.size_bytes).unwrap_or(i64::MAX);
        conn.query_row(
            &format!(
                "INSERT INTO media_files ({cols}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(library_id, rel_path) DO UPDATE SET
                    media_id = excluded.media_id,
                    season = excluded.season,
                    episode = excluded.episode,
                    import_task_id = excluded.import_task_id,
                    method = excluded.method,
                    size_bytes = excluded.size_bytes,
                    created_at = excluded.created_at
                 RETURNING {cols}",
                cols = FILE_COLUMNS
            ),
            params![
                uuid::Uuid::new_v4().to_string(),
                file.library_id,
                file.media_id,
                file.season,
                file.episode,
                file.rel_path,
                file.import_task_id,
                file.method.as_str(),
                size,
                db::format_ts(&Utc::now()),
            ],
            Self::row_to_file,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn get_by_path(
        &self,
        library_id: &str,
        rel_path: &str,
    ) -> Result<Option<MediaFile>, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM media_files WHERE library_id = ? AND rel_path = ?",
                FILE_COLUMNS
            ),
            params![library_id, rel_path],
            Self::row_to_file,
        )
        .optional()
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn list_for_media(&self, media_id: &str) -> Result<Vec<MediaFile>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM media_files WHERE media_id = ? ORDER BY season, episode, rel_path",
                FILE_COLUMNS
            ))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![media_id], Self::row_to_file)
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))
    }
}
