//! SQLite-backed download job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{DownloadJob, JobError, JobFilter, JobStatus, JobStore, JobUpdate, NewDownloadJob};
use crate::candidate::Protocol;
use crate::db;
use crate::worker::ErrorCategory;

const JOB_COLUMNS: &str = "id, status, indexer_id, guid, candidate_title, candidate_link, protocol, media_json, downloader_id, library_id, name_template_id, external_id, progress, save_path, content_path, import_source_path, attempt_count, max_attempts, next_run_at, claimed_until, last_error, error_category, created_at, updated_at, completed_at";

const TERMINAL: &str = "('imported', 'failed', 'cancelled')";

/// SQLite-backed download job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = db::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = db::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS download_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                indexer_id INTEGER NOT NULL,
                guid TEXT NOT NULL,
                candidate_title TEXT NOT NULL,
                candidate_link TEXT NOT NULL,
                protocol TEXT NOT NULL,
                media_json TEXT NOT NULL,
                downloader_id TEXT NOT NULL,
                library_id TEXT NOT NULL,
                name_template_id TEXT NOT NULL,
                external_id TEXT,
                progress REAL NOT NULL DEFAULT 0,
                save_path TEXT,
                content_path TEXT,
                import_source_path TEXT,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 0,
                next_run_at TEXT NOT NULL,
                claimed_until TEXT,
                last_error TEXT,
                error_category TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_download_jobs_runnable ON download_jobs(status, next_run_at);
            CREATE INDEX IF NOT EXISTS idx_download_jobs_candidate ON download_jobs(indexer_id, guid);
            CREATE INDEX IF NOT EXISTS idx_download_jobs_created_at ON download_jobs(created_at);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref downloader_id) = filter.downloader_id {
            conditions.push("downloader_id = ?");
            params.push(Box::new(downloader_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<DownloadJob> {
        let status: String = row.get(1)?;
        let protocol: String = row.get(6)?;
        let media_json: String = row.get(7)?;
        let error_category: Option<String> = row.get(21)?;

        Ok(DownloadJob {
            id: row.get(0)?,
            status: status
                .parse()
                .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?,
            indexer_id: row.get(2)?,
            guid: row.get(3)?,
            candidate_title: row.get(4)?,
            candidate_link: row.get(5)?,
            protocol: Protocol::parse(&protocol),
            media: db::from_json(&media_json)?,
            downloader_id: row.get(8)?,
            library_id: row.get(9)?,
            name_template_id: row.get(10)?,
            external_id: row.get(11)?,
            progress: row.get(12)?,
            save_path: row.get(13)?,
            content_path: row.get(14)?,
            import_source_path: row.get(15)?,
            attempt_count: row.get(16)?,
            max_attempts: row.get(17)?,
            next_run_at: db::parse_ts(&row.get::<_, String>(18)?)?,
            claimed_until: db::parse_opt_ts(row.get(19)?)?,
            last_error: row.get(20)?,
            error_category: error_category.as_deref().and_then(ErrorCategory::parse),
            created_at: db::parse_ts(&row.get::<_, String>(22)?)?,
            updated_at: db::parse_ts(&row.get::<_, String>(23)?)?,
            completed_at: db::parse_opt_ts(row.get(24)?)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<DownloadJob>, JobError> {
        conn.query_row(
            &format!("SELECT {} FROM download_jobs WHERE id = ?", JOB_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobError::Database(e.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create_unless_active(&self, job: NewDownloadJob) -> Result<(DownloadJob, bool), JobError> {
        let media_json =
            serde_json::to_string(&job.media).map_err(|e| JobError::Serialization(e.to_string()))?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM download_jobs WHERE indexer_id = ? AND guid = ? AND media_json = ? AND status NOT IN {} ORDER BY created_at ASC LIMIT 1",
                    JOB_COLUMNS, TERMINAL
                ),
                params![job.indexer_id, job.guid, media_json],
                Self::row_to_job,
            )
            .optional()
            .map_err(|e| JobError::Database(e.to_string()))?;

        if let Some(existing) = existing {
            return Ok((existing, false));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = db::format_ts(&Utc::now());
        tx.execute(
            "INSERT INTO download_jobs (id, status, indexer_id, guid, candidate_title, candidate_link, protocol, media_json, downloader_id, library_id, name_template_id, max_attempts, next_run_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                JobStatus::Pending.as_str(),
                job.indexer_id,
                job.guid,
                job.candidate_title,
                job.candidate_link,
                job.protocol.as_str(),
                media_json,
                job.downloader_id,
                job.library_id,
                job.name_template_id,
                job.max_attempts,
                now,
                now,
                now,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        let created = Self::fetch(&tx, &id)?.ok_or_else(|| JobError::NotFound(id.clone()))?;
        tx.commit().map_err(|e| JobError::Database(e.to_string()))?;
        Ok((created, true))
    }

    fn get(&self, id: &str) -> Result<Option<DownloadJob>, JobError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<DownloadJob>, JobError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM download_jobs {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM download_jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn claim_runnable(&self, limit: usize, lease: Duration) -> Result<Vec<DownloadJob>, JobError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero());
        let now_ts = db::format_ts(&now);
        let until_ts = db::format_ts(&(now + lease));

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut jobs = {
            let mut stmt = tx
                .prepare(&format!(
                    "UPDATE download_jobs SET claimed_until = ?1
                     WHERE id IN (
                        SELECT id FROM download_jobs
                        WHERE status NOT IN {}
                          AND next_run_at <= ?2
                          AND (claimed_until IS NULL OR claimed_until <= ?2)
                        ORDER BY next_run_at ASC, created_at ASC
                        LIMIT ?3
                     )
                     RETURNING {}",
                    TERMINAL, JOB_COLUMNS
                ))
                .map_err(|e| JobError::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params![until_ts, now_ts, limit as i64], Self::row_to_job)
                .map_err(|e| JobError::Database(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| JobError::Database(e.to_string()))?
        };
        tx.commit().map_err(|e| JobError::Database(e.to_string()))?;

        // RETURNING order is unspecified.
        jobs.sort_by(|a, b| {
            a.next_run_at
                .cmp(&b.next_run_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(jobs)
    }

    fn apply(
        &self,
        id: &str,
        expected: JobStatus,
        update: JobUpdate,
    ) -> Result<DownloadJob, JobError> {
        let refresh = update.status == expected;
        if (refresh && expected.is_terminal()) || (!refresh && !expected.can_transition_to(update.status)) {
            return Err(JobError::InvalidTransition {
                from: expected,
                to: update.status,
            });
        }

        let now = Utc::now();
        let completed_at = update.status.is_terminal().then(|| db::format_ts(&now));
        let (last_error, error_category) = match update.error {
            Some((message, category)) => (Some(message), Some(category.as_str())),
            None => (None, None),
        };

        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE download_jobs SET
                    status = ?,
                    external_id = COALESCE(?, external_id),
                    progress = COALESCE(?, progress),
                    save_path = COALESCE(?, save_path),
                    content_path = COALESCE(?, content_path),
                    import_source_path = COALESCE(?, import_source_path),
                    attempt_count = COALESCE(?, attempt_count),
                    next_run_at = COALESCE(?, next_run_at),
                    last_error = COALESCE(?, last_error),
                    error_category = COALESCE(?, error_category),
                    claimed_until = NULL,
                    updated_at = ?,
                    completed_at = COALESCE(?, completed_at)
                 WHERE id = ? AND status = ?",
                params![
                    update.status.as_str(),
                    update.external_id,
                    update.progress,
                    update.save_path,
                    update.content_path,
                    update.import_source_path,
                    update.attempt_count,
                    update.next_run_at.as_ref().map(db::format_ts),
                    last_error,
                    error_category,
                    db::format_ts(&now),
                    completed_at,
                    id,
                    expected.as_str(),
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        let job = Self::fetch(&conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if changed == 0 {
            return Err(JobError::Conflict {
                id: id.to_string(),
                expected,
                actual: job.status,
            });
        }
        Ok(job)
    }

    fn cancel(&self, id: &str) -> Result<(JobStatus, DownloadJob), JobError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let current = Self::fetch(&tx, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if current.status.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: current.status,
                to: JobStatus::Cancelled,
            });
        }

        let now = db::format_ts(&Utc::now());
        tx.execute(
            "UPDATE download_jobs SET status = ?, claimed_until = NULL, updated_at = ?, completed_at = ? WHERE id = ? AND status = ?",
            params![
                JobStatus::Cancelled.as_str(),
                now,
                now,
                id,
                current.status.as_str()
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        let cancelled = Self::fetch(&tx, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        tx.commit().map_err(|e| JobError::Database(e.to_string()))?;
        Ok((current.status, cancelled))
    }
}
