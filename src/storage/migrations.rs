use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

use crate::error::{BurpError, BurpResult};

/// Database schema version
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Run all necessary database migrations.
///
/// Everything happens under one immediate transaction, so a second process
/// opening the same fresh file waits and then finds the schema applied.
pub fn run_migrations(conn: &Connection) -> BurpResult<()> {
    info!("Running database migrations");

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current_version = get_schema_version(&tx)?;
    info!("Current schema version: {}", current_version);

    for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(&tx, version)?;
        update_schema_version(&tx, version)?;
    }
    tx.commit()?;

    info!("Database migrations completed");
    Ok(())
}

/// Get current schema version
pub fn get_schema_version(conn: &Connection) -> BurpResult<i32> {
    let mut stmt = conn.prepare("SELECT COALESCE(MAX(version), 0) FROM schema_version")?;
    let version: i32 = stmt.query_row([], |row| row.get(0))?;
    Ok(version)
}

fn update_schema_version(conn: &Connection, version: i32) -> BurpResult<()> {
    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![version, chrono::Utc::now().timestamp()],
    )?;
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> BurpResult<()> {
    match version {
        1 => apply_migration_v1(conn),
        _ => Err(BurpError::storage(format!("Unknown migration version: {}", version))),
    }
}

/// Migration v1: versioned key/value table
fn apply_migration_v1(conn: &Connection) -> BurpResult<()> {
    info!("Applying migration v1: key/value store");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            version INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_kv_store_updated_at ON kv_store (updated_at)", [])?;

    info!("Migration v1 completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv_store'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_concurrent_first_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let conn = Connection::open(&path).unwrap();
                    conn.busy_timeout(std::time::Duration::from_secs(5)).unwrap();
                    barrier.wait();
                    run_migrations(&conn)
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let conn = Connection::open(&path).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 1);
    }
}
