//! SQLite-backed page store

use crate::storage::schema::initialize_schema;
use crate::storage::{PageRecord, PageRow, RunRecord, RunStatus, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite page store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Run Management =====

    pub fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .map_err(|_| StorageError::RunNotFound(run_id))?;

        Ok(run)
    }

    pub fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Page Management =====

    /// Records one fetch attempt, successful or failed
    ///
    /// Replaces any earlier row for the same URL within the same run, so a
    /// run never logs a URL twice.
    pub fn insert_page(&mut self, page: &PageRow) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pages
             (run_id, source, url, status_code, content_type, body, error_message, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                page.run_id,
                page.source,
                page.url,
                page.status_code,
                page.content_type,
                page.body,
                page.error,
                page.fetched_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, source, url, status_code, content_type, body, error_message, fetched_at
             FROM pages WHERE url = ?1 ORDER BY id DESC LIMIT 1",
        )?;

        let page = stmt
            .query_row(params![url], Self::read_page_row)
            .optional()?;

        Ok(page)
    }

    /// Returns the successfully fetched pages of one source, for extraction
    ///
    /// When a URL was fetched in more than one run (resumed crawls), only the
    /// most recent body is returned.
    pub fn pages_for_source(&self, source: &str) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, source, url, status_code, content_type, body, error_message, fetched_at
             FROM pages
             WHERE id IN (
                 SELECT MAX(id) FROM pages
                 WHERE source = ?1 AND error_message IS NULL AND body IS NOT NULL
                 GROUP BY url
             )
             ORDER BY url",
        )?;

        let pages = stmt
            .query_map(params![source], Self::read_page_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn read_page_row(row: &rusqlite::Row<'_>) -> Result<PageRecord, rusqlite::Error> {
        Ok(PageRecord {
            id: row.get(0)?,
            run_id: row.get(1)?,
            source: row.get(2)?,
            url: row.get(3)?,
            status_code: row.get(4)?,
            content_type: row.get(5)?,
            body: row.get(6)?,
            error: row.get(7)?,
            fetched_at: row.get(8)?,
        })
    }

    // ===== Statistics =====

    pub fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_failed_pages(&self, source: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE source = ?1 AND error_message IS NOT NULL",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
