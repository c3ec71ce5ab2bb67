//! libSQL backend — async `StateStore` implementation.
//!
//! Two tables: `kv` for single-value records and `kv_items` for bounded
//! lists. Expiry is an integer unix-millisecond deadline; reads filter on
//! it and a periodic sweep reclaims the rows. The conditional operations
//! are single SQL statements whose affected-row count is the result —
//! there is no read-then-write anywhere in this file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StoreError;
use crate::store::traits::StateStore;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_kv_expires ON kv(expires_at);

    CREATE TABLE IF NOT EXISTS kv_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        expires_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_kv_items_key ON kv_items(key, id);
"#;

/// libSQL state store.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create store directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "State store opened");
        Ok(store)
    }

    /// Create an in-memory store (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory store: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Open(format!("Failed to initialize schema: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry deadline as a libsql value (NULL when no TTL).
fn deadline(ttl: Option<Duration>) -> libsql::Value {
    match ttl {
        Some(t) => libsql::Value::Integer(now_millis() + t.as_millis() as i64),
        None => libsql::Value::Null,
    }
}

/// Map a libsql error, classifying lock contention as transient.
fn map_err(op: &str, e: libsql::Error) -> StoreError {
    let text = e.to_string();
    if text.contains("locked") || text.contains("busy") {
        StoreError::Busy(format!("{op}: {text}"))
    } else {
        StoreError::Query(format!("{op}: {text}"))
    }
}

#[async_trait]
impl StateStore for LibSqlStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM kv WHERE key = ?1
                 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, now_millis()],
            )
            .await
            .map_err(|e| map_err("get", e))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row.get(0).map_err(|e| map_err("get row", e))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(map_err("get", e)),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     expires_at = excluded.expires_at",
                params![key, value, deadline(ttl)],
            )
            .await
            .map_err(|e| map_err("put", e))?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        // A dead row must not block the claim, so the conflict arm takes
        // over rows whose deadline has passed. Affected-count 0 means a
        // live record already holds the key.
        let affected = self
            .conn()
            .execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     expires_at = excluded.expires_at
                 WHERE kv.expires_at IS NOT NULL AND kv.expires_at <= ?4",
                params![key, value, deadline(ttl), now_millis()],
            )
            .await
            .map_err(|e| map_err("put_if_absent", e))?;
        Ok(affected == 1)
    }

    async fn extend_ttl_if(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE kv SET expires_at = ?1
                 WHERE key = ?2 AND value = ?3
                 AND (expires_at IS NULL OR expires_at > ?4)",
                params![deadline(Some(ttl)), key, expected, now_millis()],
            )
            .await
            .map_err(|e| map_err("extend_ttl_if", e))?;
        Ok(affected == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .await
            .map_err(|e| map_err("delete", e))?;
        Ok(())
    }

    async fn delete_if(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM kv WHERE key = ?1 AND value = ?2",
                params![key, expected],
            )
            .await
            .map_err(|e| map_err("delete_if", e))?;
        Ok(affected == 1)
    }

    async fn list_push(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kv_items (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, deadline(ttl)],
        )
        .await
        .map_err(|e| map_err("list_push", e))?;

        // Sliding window: drop the oldest rows beyond the cap.
        conn.execute(
            "DELETE FROM kv_items WHERE key = ?1 AND id NOT IN (
                 SELECT id FROM kv_items WHERE key = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![key, max_len as i64],
        )
        .await
        .map_err(|e| map_err("list_push trim", e))?;
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM kv_items WHERE key = ?1
                 AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY id ASC",
                params![key, now_millis()],
            )
            .await
            .map_err(|e| map_err("list_range", e))?;

        let mut values = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let value: String = row.get(0).map_err(|e| map_err("list_range row", e))?;
            values.push(value);
        }
        Ok(values)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{prefix}%");
        let mut rows = self
            .conn()
            .query(
                "SELECT key FROM kv WHERE key LIKE ?1
                 AND (expires_at IS NULL OR expires_at > ?2)
                 UNION
                 SELECT DISTINCT key FROM kv_items WHERE key LIKE ?1
                 AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY key",
                params![pattern, now_millis()],
            )
            .await
            .map_err(|e| map_err("scan_keys", e))?;

        let mut keys = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let key: String = row.get(0).map_err(|e| map_err("scan_keys row", e))?;
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let pattern = format!("{prefix}%");
        let conn = self.conn();
        let from_kv = conn
            .execute("DELETE FROM kv WHERE key LIKE ?1", params![pattern.clone()])
            .await
            .map_err(|e| map_err("delete_prefix kv", e))?;
        let from_items = conn
            .execute("DELETE FROM kv_items WHERE key LIKE ?1", params![pattern])
            .await
            .map_err(|e| map_err("delete_prefix kv_items", e))?;
        Ok((from_kv + from_items) as usize)
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = now_millis();
        let conn = self.conn();
        let from_kv = conn
            .execute(
                "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now],
            )
            .await
            .map_err(|e| map_err("purge_expired kv", e))?;
        let from_items = conn
            .execute(
                "DELETE FROM kv_items WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now],
            )
            .await
            .map_err(|e| map_err("purge_expired kv_items", e))?;
        Ok((from_kv + from_items) as usize)
    }
}
