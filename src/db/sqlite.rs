use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use super::StoreError;

/// Open a fact-store snapshot read-only. The engine never writes to it.
pub fn open_snapshot(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    tracing::debug!(path = %path.display(), "Opened fact-store snapshot");
    Ok(conn)
}

/// Open an in-memory database with the schema applied (for tests and seeds).
pub fn open_memory_database() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Apply the fact-store schema to a writable connection. Used when seeding
/// demo databases and test fixtures; production snapshots arrive pre-built.
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(include_str!("../../resources/schema/001_oncology.sql"))
        .map_err(|e| StoreError::SchemaInit(e.to_string()))?;
    Ok(())
}

/// Count tables in the database (for verification)
pub fn count_tables(conn: &Connection) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}
