//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, V1_STATEMENTS)?;
    }
    if version < 2 {
        apply(conn, 2, V2_STATEMENTS)?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get::<_, i32>(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

/// Version 1: subjects and attendance records
const V1_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS subjects (
        subject_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        group_name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    // No foreign key on subject_id: pulled records may reference subjects
    // that were never registered on this device.
    "CREATE TABLE IF NOT EXISTS check_records (
        id TEXT PRIMARY KEY,
        subject_id TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('in', 'out')),
        timestamp INTEGER NOT NULL,
        sync_status TEXT NOT NULL DEFAULT 'pending' CHECK (sync_status IN ('pending', 'synced'))
    )",
    "CREATE INDEX IF NOT EXISTS idx_check_records_subject ON check_records(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_check_records_timestamp ON check_records(timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_check_records_status ON check_records(sync_status)",
];

/// Version 2: last-writer-wins conflict log
const V2_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sync_conflicts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id TEXT NOT NULL,
        local_timestamp INTEGER NOT NULL,
        remote_timestamp INTEGER NOT NULL,
        resolution TEXT NOT NULL,
        resolved_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_record_id ON sync_conflicts(record_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)",
];

fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute(stmt, [])?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(table_exists(&conn, "check_records"));
        assert!(table_exists(&conn, "subjects"));
        assert!(table_exists(&conn, "sync_conflicts"));
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_fresh_database_reports_version_zero() {
        let conn = setup();
        assert_eq!(get_version(&conn).unwrap(), 0);
    }
}
