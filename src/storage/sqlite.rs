use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use super::{migrations, KeyValueStore, StoreEvent, Versioned, EVENT_CAPACITY};
use crate::error::{BurpError, BurpResult};

/// Key/value store in a SQLite database file.
///
/// Several processes may share one file; compare-and-set runs inside an
/// immediate transaction so the version check and the write are atomic.
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
    events: broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it
    pub async fn open(path: &Path) -> BurpResult<Self> {
        info!("Opening key/value store: {}", path.display());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    /// Private in-memory database, for tests and throwaway sessions
    pub fn open_in_memory() -> BurpResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> BurpResult<Self> {
        connection.busy_timeout(Duration::from_secs(5))?;
        migrations::run_migrations(&connection)?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            events,
        })
    }

    fn notify(&self, event: StoreEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

fn current_version(conn: &Connection, key: &str) -> BurpResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT version FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn upsert(conn: &Connection, key: &str, value: &Value, version: i64) -> BurpResult<()> {
    conn.execute(
        "INSERT INTO kv_store (key, value, version, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            version = excluded.version,
            updated_at = excluded.updated_at",
        params![key, value, version, chrono::Utc::now().timestamp()],
    )?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> BurpResult<Option<Versioned<Value>>> {
        let conn = self.connection.lock().await;
        let row = conn
            .query_row(
                "SELECT value, version FROM kv_store WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, Value>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(value, version)| Versioned { value, version }))
    }

    async fn set(&self, key: &str, value: Value) -> BurpResult<i64> {
        let version = {
            let mut conn = self.connection.lock().await;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let version = current_version(&tx, key)?.unwrap_or(0) + 1;
            upsert(&tx, key, &value, version)?;
            tx.commit()?;
            version
        };

        debug!("Stored {} at version {}", key, version);
        self.notify(StoreEvent::Set {
            key: key.to_string(),
            version,
        });
        Ok(version)
    }

    async fn compare_and_set(&self, key: &str, value: Value, expected: Option<i64>) -> BurpResult<i64> {
        let version = {
            let mut conn = self.connection.lock().await;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let found = current_version(&tx, key)?;
            if found != expected {
                return Err(BurpError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }

            let version = found.unwrap_or(0) + 1;
            upsert(&tx, key, &value, version)?;
            tx.commit()?;
            version
        };

        debug!("Stored {} at version {} (checked)", key, version);
        self.notify(StoreEvent::Set {
            key: key.to_string(),
            version,
        });
        Ok(version)
    }

    async fn remove(&self, key: &str) -> BurpResult<bool> {
        let removed = {
            let conn = self.connection.lock().await;
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])? > 0
        };

        if removed {
            debug!("Removed {}", key);
            self.notify(StoreEvent::Removed { key: key.to_string() });
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
