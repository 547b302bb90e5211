//! Settings persistence using SQLite

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::{SettingsStore, StoreChange, CHANGE_CHANNEL_CAPACITY, DEFAULT_AREA};
use crate::settings::StoreSnapshot;
use crate::{Error, Result};

/// SQLite-based settings store
///
/// Values are kept as JSON text, one row per key and area.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    area: String,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    pub fn open<P: AsRef<Path>>(db_path: P, area: impl Into<String>) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?, area.into())
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_AREA.to_string())
    }

    fn from_connection(conn: Connection, area: String) -> Result<Self> {
        Self::init_tables(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            area,
            changes,
        })
    }

    /// Initialize database tables
    fn init_tables(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                area TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (area, key)
            )",
            [],
        )?;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| Error::StoreUnavailable("settings connection poisoned".to_string()))?;
        f(&mut conn).map_err(|e| match e {
            Error::Database(db) => Error::StoreUnavailable(db.to_string()),
            other => other,
        })
    }

    fn read_key(conn: &Connection, area: &str, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE area = ?1 AND key = ?2",
                params![area, key],
                |row| row.get(0),
            )
            .optional()?;
        // A corrupted row reads as absent; defaults take over for that key.
        Ok(raw.and_then(|text| serde_json::from_str(&text).ok()))
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    fn area(&self) -> &str {
        &self.area
    }

    async fn get(&self, keys: &[&str]) -> Result<StoreSnapshot> {
        self.with_conn(|conn| {
            let mut snapshot = StoreSnapshot::new();
            for key in keys {
                if let Some(value) = Self::read_key(conn, &self.area, key)? {
                    snapshot.insert(key.to_string(), value);
                }
            }
            Ok(snapshot)
        })
    }

    async fn get_all(&self) -> Result<StoreSnapshot> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings WHERE area = ?1")?;
            let rows = stmt.query_map(params![self.area], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut snapshot = StoreSnapshot::new();
            for row in rows {
                let (key, text) = row?;
                if let Ok(value) = serde_json::from_str(&text) {
                    snapshot.insert(key, value);
                }
            }
            Ok(snapshot)
        })
    }

    async fn set(&self, values: StoreSnapshot) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = values.keys().cloned().collect();
        let now = Utc::now().to_rfc3339();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for (key, value) in &values {
                tx.execute(
                    "INSERT OR REPLACE INTO settings (area, key, value, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![self.area, key, serde_json::to_string(value)?, now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;

        debug!(area = %self.area, ?keys, "settings persisted");
        let _ = self.changes.send(StoreChange {
            area: self.area.clone(),
            keys,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
