//! SQLite-backed policy store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{Policy, PolicyError, PolicyInput, PolicyStore};
use crate::db;

const SELECT_POLICY: &str = "SELECT id, name, description, enabled, priority, rule_json, actions_json, created_at, updated_at FROM policies";
const ORDER_BY: &str = "ORDER BY priority ASC, created_at ASC, id ASC";

/// SQLite-backed policy store.
pub struct SqlitePolicyStore {
    conn: Mutex<Connection>,
}

impl SqlitePolicyStore {
    /// Create a new SQLite policy store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, PolicyError> {
        let conn = db::open(path).map_err(|e| PolicyError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite policy store (useful for testing).
    pub fn in_memory() -> Result<Self, PolicyError> {
        let conn = db::open_in_memory().map_err(|e| PolicyError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PolicyError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS policies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                enabled INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                rule_json TEXT NOT NULL,
                actions_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_policies_order ON policies(priority, created_at, id);
            "#,
        )
        .map_err(|e| PolicyError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PolicyError> {
        self.conn
            .lock()
            .map_err(|_| PolicyError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_policy(row: &rusqlite::Row) -> rusqlite::Result<Policy> {
        let rule_json: String = row.get(5)?;
        let actions_json: String = row.get(6)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        Ok(Policy {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            enabled: row.get(3)?,
            priority: row.get(4)?,
            rule: db::from_json(&rule_json)?,
            actions: db::from_json(&actions_json)?,
            created_at: db::parse_ts(&created_at)?,
            updated_at: db::parse_ts(&updated_at)?,
        })
    }

    fn query(conn: &Connection, sql: &str) -> Result<Vec<Policy>, PolicyError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| PolicyError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_policy)
            .map_err(|e| PolicyError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PolicyError::Database(e.to_string()))
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Policy>, PolicyError> {
        let result = conn.query_row(
            &format!("{} WHERE id = ?", SELECT_POLICY),
            params![id],
            Self::row_to_policy,
        );
        match result {
            Ok(policy) => Ok(Some(policy)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PolicyError::Database(e.to_string())),
        }
    }

    fn encode(input: &PolicyInput) -> Result<(String, String), PolicyError> {
        let rule = serde_json::to_string(&input.rule)
            .map_err(|e| PolicyError::Serialization(e.to_string()))?;
        let actions = serde_json::to_string(&input.actions)
            .map_err(|e| PolicyError::Serialization(e.to_string()))?;
        Ok((rule, actions))
    }
}

impl PolicyStore for SqlitePolicyStore {
    fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        let conn = self.lock()?;
        Self::query(&conn, &format!("{} {}", SELECT_POLICY, ORDER_BY))
    }

    fn list_enabled(&self) -> Result<Vec<Policy>, PolicyError> {
        let conn = self.lock()?;
        Self::query(
            &conn,
            &format!("{} WHERE enabled = 1 {}", SELECT_POLICY, ORDER_BY),
        )
    }

    fn get(&self, id: &str) -> Result<Option<Policy>, PolicyError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn create(&self, input: PolicyInput) -> Result<Policy, PolicyError> {
        input.validate()?;
        let (rule_json, actions_json) = Self::encode(&input)?;

        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO policies (id, name, description, enabled, priority, rule_json, actions_json, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                input.name,
                input.description,
                input.enabled,
                input.priority,
                rule_json,
                actions_json,
                db::format_ts(&now),
                db::format_ts(&now),
            ],
        )
        .map_err(|e| PolicyError::Database(e.to_string()))?;

        Self::fetch(&conn, &id)?.ok_or(PolicyError::NotFound(id))
    }

    fn update(&self, id: &str, input: PolicyInput) -> Result<Policy, PolicyError> {
        input.validate()?;
        let (rule_json, actions_json) = Self::encode(&input)?;

        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE policies SET name = ?, description = ?, enabled = ?, priority = ?, rule_json = ?, actions_json = ?, updated_at = ? WHERE id = ?",
                params![
                    input.name,
                    input.description,
                    input.enabled,
                    input.priority,
                    rule_json,
                    actions_json,
                    db::format_ts(&Utc::now()),
                    id,
                ],
            )
            .map_err(|e| PolicyError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(PolicyError::NotFound(id.to_string()));
        }
        Self::fetch(&conn, id)?.ok_or_else(|| PolicyError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<Policy, PolicyError> {
        let conn = self.lock()?;
        let policy = Self::fetch(&conn, id)?.ok_or_else(|| PolicyError::NotFound(id.to_string()))?;
        conn.execute("DELETE FROM policies WHERE id = ?", params![id])
            .map_err(|e| PolicyError::Database(e.to_string()))?;
        Ok(policy)
    }
}
