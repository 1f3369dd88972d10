//! SQLite-backed import task store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{
    ImportError, ImportTask, ImportTaskStore, NewImportTask, TaskFilter, TaskStatus, TaskUpdate,
};
use crate::db;
use crate::placer::ImportMethod;
use crate::worker::ErrorCategory;

const TASK_COLUMNS: &str = "id, status, download_job_id, previous_task_id, source_path, dest_path, import_method, media_json, library_id, name_template_id, candidate_title, attempt_count, max_attempts, next_run_at, last_error, error_category, created_at, updated_at, started_at, completed_at";

/// SQLite-backed import task store.
pub struct SqliteImportTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteImportTaskStore {
    /// Create a new SQLite task store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, ImportError> {
        let conn = db::open(path).map_err(|e| ImportError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, ImportError> {
        let conn = db::open_in_memory().map_err(|e| ImportError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ImportError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS import_tasks (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                download_job_id TEXT,
                previous_task_id TEXT,
                source_path TEXT NOT NULL,
                dest_path TEXT,
                import_method TEXT,
                media_json TEXT NOT NULL,
                library_id TEXT NOT NULL,
                name_template_id TEXT NOT NULL,
                candidate_title TEXT NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 0,
                next_run_at TEXT NOT NULL,
                last_error TEXT,
                error_category TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_import_tasks_runnable ON import_tasks(status, next_run_at);
            CREATE INDEX IF NOT EXISTS idx_import_tasks_job ON import_tasks(download_job_id);
            CREATE INDEX IF NOT EXISTS idx_import_tasks_previous ON import_tasks(previous_task_id);
            "#,
        )
        .map_err(|e| ImportError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ImportError> {
        self.conn
            .lock()
            .map_err(|_| ImportError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref job_id) = filter.download_job_id {
            conditions.push("download_job_id = ?");
            params.push(Box::new(job_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<ImportTask> {
        let status: String = row.get(1)?;
        let method: Option<String> = row.get(6)?;
        let media_json: String = row.get(7)?;
        let error_category: Option<String> = row.get(15)?;

        Ok(ImportTask {
            id: row.get(0)?,
            status: status.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into())
            })?,
            download_job_id: row.get(2)?,
            previous_task_id: row.get(3)?,
            source_path: row.get(4)?,
            dest_path: row.get(5)?,
            import_method: method.as_deref().and_then(ImportMethod::parse),
            media: db::from_json(&media_json)?,
            library_id: row.get(8)?,
            name_template_id: row.get(9)?,
            candidate_title: row.get(10)?,
            attempt_count: row.get(11)?,
            max_attempts: row.get(12)?,
            next_run_at: db::parse_ts(&row.get::<_, String>(13)?)?,
            last_error: row.get(14)?,
            error_category: error_category.as_deref().and_then(ErrorCategory::parse),
            created_at: db::parse_ts(&row.get::<_, String>(16)?)?,
            updated_at: db::parse_ts(&row.get::<_, String>(17)?)?,
            started_at: db::parse_opt_ts(row.get(18)?)?,
            completed_at: db::parse_opt_ts(row.get(19)?)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<ImportTask>, ImportError> {
        conn.query_row(
            &format!("SELECT {} FROM import_tasks WHERE id = ?", TASK_COLUMNS),
            params![id],
            Self::row_to_task,
        )
        .optional()
        .map_err(|e| ImportError::Database(e.to_string()))
    }

    fn query(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ImportTask>, ImportError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ImportError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_task)
            .map_err(|e| ImportError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| ImportError::Database(e.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        conn: &Connection,
        download_job_id: Option<&str>,
        previous_task_id: Option<&str>,
        source_path: &str,
        media_json: &str,
        library_id: &str,
        name_template_id: &str,
        candidate_title: &str,
        max_attempts: u32,
    ) -> Result<String, ImportError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = db::format_ts(&Utc::now());
        conn.execute(
            "INSERT INTO import_tasks (id, status, download_job_id, previous_task_id, source_path, media_json, library_id, name_template_id, candidate_title, max_attempts, next_run_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                TaskStatus::Pending.as_str(),
                download_job_id,
                previous_task_id,
                source_path,
                media_json,
                library_id,
                name_template_id,
                candidate_title,
                max_attempts,
                now,
                now,
                now,
            ],
        )
        .map_err(|e| ImportError::Database(e.to_string()))?;
        Ok(id)
    }
}

impl ImportTaskStore for SqliteImportTaskStore {
    fn create(&self, task: NewImportTask) -> Result<ImportTask, ImportError> {
        let media_json = serde_json::to_string(&task.media)
            .map_err(|e| ImportError::Serialization(e.to_string()))?;

        let conn = self.lock()?;
        let id = Self::insert(
            &conn,
            task.download_job_id.as_deref(),
            None,
            &task.source_path,
            &media_json,
            &task.library_id,
            &task.name_template_id,
            &task.candidate_title,
            task.max_attempts,
        )?;
        Self::fetch(&conn, &id)?.ok_or(ImportError::NotFound(id))
    }

    fn get(&self, id: &str) -> Result<Option<ImportTask>, ImportError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<ImportTask>, ImportError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM import_tasks {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            TASK_COLUMNS, where_clause
        );
        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        Self::query(&conn, &sql, param_refs.as_slice())
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, ImportError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM import_tasks {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| ImportError::Database(e.to_string()))
    }

    fn list_for_job(&self, job_id: &str) -> Result<Vec<ImportTask>, ImportError> {
        let conn = self.lock()?;
        Self::query(
            &conn,
            &format!(
                "SELECT {} FROM import_tasks WHERE download_job_id = ? ORDER BY created_at ASC, rowid ASC",
                TASK_COLUMNS
            ),
            params![job_id],
        )
    }

    fn claim_runnable(&self, limit: usize) -> Result<Vec<ImportTask>, ImportError> {
        let now = db::format_ts(&Utc::now());

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ImportError::Database(e.to_string()))?;

        let mut tasks = Self::query(
            &tx,
            &format!(
                "UPDATE import_tasks SET status = ?1, started_at = ?2, updated_at = ?2
                 WHERE id IN (
                    SELECT id FROM import_tasks
                    WHERE status = ?3 AND next_run_at <= ?2
                    ORDER BY next_run_at ASC, created_at ASC
                    LIMIT ?4
                 )
                 RETURNING {}",
                TASK_COLUMNS
            ),
            params![
                TaskStatus::InProgress.as_str(),
                now,
                TaskStatus::Pending.as_str(),
                limit as i64
            ],
        )?;
        tx.commit()
            .map_err(|e| ImportError::Database(e.to_string()))?;

        // RETURNING order is unspecified.
        tasks.sort_by(|a, b| {
            a.next_run_at
                .cmp(&b.next_run_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(tasks)
    }

    fn apply(
        &self,
        id: &str,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> Result<ImportTask, ImportError> {
        // Same-status updates rewrite fields without a transition.
        let refresh = update.status == expected;
        if (refresh && expected.is_terminal()) || (!refresh && !expected.can_transition_to(update.status)) {
            return Err(ImportError::InvalidTransition {
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
                "UPDATE import_tasks SET
                    status = ?,
                    source_path = COALESCE(?, source_path),
                    dest_path = COALESCE(?, dest_path),
                    import_method = COALESCE(?, import_method),
                    attempt_count = COALESCE(?, attempt_count),
                    next_run_at = COALESCE(?, next_run_at),
                    last_error = COALESCE(?, last_error),
                    error_category = COALESCE(?, error_category),
                    updated_at = ?,
                    completed_at = COALESCE(?, completed_at)
                 WHERE id = ? AND status = ?",
                params![
                    update.status.as_str(),
                    update.source_path,
                    update.dest_path,
                    update.import_method.map(|m| m.as_str()),
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
            .map_err(|e| ImportError::Database(e.to_string()))?;

        let task = Self::fetch(&conn, id)?.ok_or_else(|| ImportError::NotFound(id.to_string()))?;
        if changed == 0 {
            return Err(ImportError::Conflict {
                id: id.to_string(),
                expected,
                actual: task.status,
            });
        }
        Ok(task)
    }

    fn cancel(&self, id: &str) -> Result<(TaskStatus, ImportTask), ImportError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ImportError::Database(e.to_string()))?;

        let current =
            Self::fetch(&tx, id)?.ok_or_else(|| ImportError::NotFound(id.to_string()))?;
        if !current.status.can_transition_to(TaskStatus::Cancelled) {
            return Err(ImportError::InvalidTransition {
                from: current.status,
                to: TaskStatus::Cancelled,
            });
        }

        let now = db::format_ts(&Utc::now());
        tx.execute(
            "UPDATE import_tasks SET status = ?, updated_at = ?, completed_at = ? WHERE id = ? AND status = ?",
            params![
                TaskStatus::Cancelled.as_str(),
                now,
                now,
                id,
                current.status.as_str()
            ],
        )
        .map_err(|e| ImportError::Database(e.to_string()))?;

        let cancelled =
            Self::fetch(&tx, id)?.ok_or_else(|| ImportError::NotFound(id.to_string()))?;
        tx.commit()
            .map_err(|e| ImportError::Database(e.to_string()))?;
        Ok((current.status, cancelled))
    }

    fn cancel_pending_for_job(&self, job_id: &str) -> Result<Vec<ImportTask>, ImportError> {
        let now = db::format_ts(&Utc::now());
        let conn = self.lock()?;
        Self::query(
            &conn,
            &format!(
                "UPDATE import_tasks SET status = ?1, updated_at = ?2, completed_at = ?2
                 WHERE download_job_id = ?3 AND status = ?4
                 RETURNING {}",
                TASK_COLUMNS
            ),
            params![
                TaskStatus::Cancelled.as_str(),
                now,
                job_id,
                TaskStatus::Pending.as_str()
            ],
        )
    }

    fn reimport(&self, id: &str) -> Result<ImportTask, ImportError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ImportError::Database(e.to_string()))?;

        let original =
            Self::fetch(&tx, id)?.ok_or_else(|| ImportError::NotFound(id.to_string()))?;
        if !original.status.can_reimport() {
            return Err(ImportError::CannotReimport {
                id: id.to_string(),
                status: original.status,
            });
        }

        let media_json = serde_json::to_string(&original.media)
            .map_err(|e| ImportError::Serialization(e.to_string()))?;
        let new_id = Self::insert(
            &tx,
            original.download_job_id.as_deref(),
            Some(&original.id),
            &original.source_path,
            &media_json,
            &original.library_id,
            &original.name_template_id,
            &original.candidate_title,
            original.max_attempts,
        )?;

        let created = Self::fetch(&tx, &new_id)?.ok_or(ImportError::NotFound(new_id))?;
        tx.commit()
            .map_err(|e| ImportError::Database(e.to_string()))?;
        Ok(created)
    }

    fn history(&self, id: &str) -> Result<Vec<ImportTask>, ImportError> {
        let conn = self.lock()?;
        let chain = Self::query(
            &conn,
            &format!(
                "WITH RECURSIVE
                    ancestors(id, previous_task_id) AS (
                        SELECT id, previous_task_id FROM import_tasks WHERE id = ?1
                        UNION
                        SELECT t.id, t.previous_task_id FROM import_tasks t
                        JOIN ancestors a ON t.id = a.previous_task_id
                    ),
                    descendants(id) AS (
                        SELECT id FROM import_tasks WHERE id = ?1
                        UNION
                        SELECT t.id FROM import_tasks t
                        JOIN descendants d ON t.previous_task_id = d.id
                    )
                 SELECT {} FROM import_tasks
                 WHERE id IN (SELECT id FROM ancestors UNION SELECT id FROM descendants)
                 ORDER BY created_at DESC, rowid DESC",
                TASK_COLUMNS
            ),
            params![id],
        )?;
        if chain.is_empty() {
            return Err(ImportError::NotFound(id.to_string()));
        }
        Ok(chain)
    }

    fn reset_stale(&self, older_than: Duration) -> Result<usize, ImportError> {
        let now = Utc::now();
        let age = chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = db::format_ts(&(now - age));
        let conn = self.lock()?;
        conn.execute(
            "UPDATE import_tasks SET status = ?, updated_at = ? WHERE status = ? AND updated_at <= ?",
            params![
                TaskStatus::Pending.as_str(),
                db::format_ts(&now),
                TaskStatus::InProgress.as_str(),
                cutoff
            ],
        )
        .map_err(|e| ImportError::Database(e.to_string()))
    }
}
