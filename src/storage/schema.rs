//! Database schema definition

use rusqlite::Connection;

/// Schema version, stored in `user_version`; bump on incompatible changes
const SCHEMA_VERSION: i32 = 1;

/// Creates all tables and indexes if they do not exist
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            config_hash TEXT NOT NULL,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES runs(id),
            source TEXT NOT NULL,
            url TEXT NOT NULL,
            status_code INTEGER,
            content_type TEXT,
            body TEXT,
            error_message TEXT,
            fetched_at TEXT NOT NULL,
            UNIQUE(run_id, url)
        );

        CREATE INDEX IF NOT EXISTS idx_pages_source ON pages(source);
        CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
        CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
    ",
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(())
}
