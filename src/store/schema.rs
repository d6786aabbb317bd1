//! Store schema definition and versioning.

use rusqlite::Connection;

use crate::error::Result;

/// Current store version. Bumped when the schema changes shape; a store
/// reporting a higher version than this refuses to open.
pub const STORE_VERSION: i32 = 1;

/// The complete SQL schema for a profile collection.
///
/// Timestamps are INTEGER Unix milliseconds. Field values are joined with
/// the ASCII unit separator (0x1f); field *names* live on the note type as
/// a JSON array so order survives round-trips.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Store Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS store_versions (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Note types: named field layouts
CREATE TABLE IF NOT EXISTS notetypes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    fields TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Notes: field values joined by unit separator, space-separated sorted tags
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY,
    notetype_id INTEGER NOT NULL REFERENCES notetypes(id),
    fields TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_notetype ON notes(notetype_id);
CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at DESC);
";

/// Apply the schema and stamp the current version.
///
/// Idempotent: safe to call on every writable open.
///
/// # Errors
///
/// Returns an error if schema execution fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT OR IGNORE INTO store_versions (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![STORE_VERSION, now],
    )?;

    Ok(())
}

/// Read the store's version, or `None` if the database has no version
/// table (not a crossdeck store, or empty).
///
/// # Errors
///
/// Returns an error on underlying database failures other than a missing
/// table.
pub fn store_version(conn: &Connection) -> Result<Option<i32>> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'store_versions')",
        [],
        |row| row.get(0),
    )?;

    if !has_table {
        return Ok(None);
    }

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM store_versions",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}
