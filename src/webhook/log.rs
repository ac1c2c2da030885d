//! Append-only webhook audit log backed by SQLite.
//!
//! Records every authenticated webhook event, queryable paginated per
//! tenant, newest first.

use crate::error::ApiError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

#[derive(Clone, Debug, Serialize)]
pub struct WebhookLogEntry {
    pub id: i64,
    pub event: String,
    pub payload: serde_json::Value,
    #[serde(rename = "memberId")]
    pub member_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// # Schema
/// ```sql
/// CREATE TABLE webhook_logs (
///     id INTEGER PRIMARY KEY,
///     event TEXT NOT NULL,
///     payload TEXT NOT NULL,       -- JSON as received
///     member_id TEXT NOT NULL,
///     created_at TEXT NOT NULL     -- ISO 8601
/// );
/// ```
pub struct WebhookLogStore {
    conn: Mutex<Connection>,
}

impl WebhookLogStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::init(Connection::open(db_path).context("Failed to open webhook log database")?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("Failed to open in-memory database")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS webhook_logs (
                id INTEGER PRIMARY KEY,
                event TEXT NOT NULL,
                payload TEXT NOT NULL,
                member_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create webhook_logs table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_webhook_member ON webhook_logs(member_id, id)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn append(
        &self,
        event: &str,
        payload_json: &str,
        member_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO webhook_logs (event, payload, member_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![event, payload_json, member_id, created_at.to_rfc3339()],
            )
            .map_err(|e| ApiError::Internal(format!("Failed to append audit record: {}", e)))?;
        Ok(())
    }

    /// Returns one page of records, newest first. `member_id = None` lists
    /// across all tenants.
    pub fn list(
        &self,
        member_id: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Vec<WebhookLogEntry>, ApiError> {
        let offset = page.saturating_sub(1) as i64 * limit as i64;
        let conn = self.conn.lock().unwrap();

        let (sql, bind_member) = match member_id {
            Some(_) => (
                "SELECT id, event, payload, member_id, created_at FROM webhook_logs
                 WHERE member_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
                true,
            ),
            None => (
                "SELECT id, event, payload, member_id, created_at FROM webhook_logs
                 ORDER BY id DESC LIMIT ?1 OFFSET ?2",
                false,
            ),
        };

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ApiError::Internal(format!("Failed to prepare query: {}", e)))?;

        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<WebhookLogEntry> {
            let payload_text: String = row.get(2)?;
            Ok(WebhookLogEntry {
                id: row.get(0)?,
                event: row.get(1)?,
                payload: serde_json::from_str(&payload_text)
                    .unwrap_or(serde_json::Value::String(payload_text)),
                member_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        };

        let rows = if bind_member {
            stmt.query_map(params![member_id.unwrap(), limit as i64, offset], map_row)
        } else {
            stmt.query_map(params![limit as i64, offset], map_row)
        }
        .map_err(|e| ApiError::Internal(format!("Failed to query audit log: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ApiError::Internal(format!("Failed to read audit rows: {}", e)))
    }
}
