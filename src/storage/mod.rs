//! Persistent page store
//!
//! Every fetched page streams into SQLite the moment its fetch completes, so
//! page bodies never accumulate in crawler memory. Each invocation of the tool
//! is recorded as a run; pages reference the run that fetched them, which is
//! what makes resumed crawls auditable after the fact.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use thiserror::Error;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("run {0} not found")]
    RunNotFound(i64),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "interrupted" => Some(RunStatus::Interrupted),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One run of the tool
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// A page as written by the crawler
///
/// Failed fetches are stored too, with `body` empty and `error` set; the
/// pages table doubles as the fetch log.
#[derive(Debug, Clone)]
pub struct PageRow {
    pub run_id: i64,
    pub source: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub error: Option<String>,
    pub fetched_at: String,
}

/// A stored page as read back for extraction
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub run_id: i64,
    pub source: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub error: Option<String>,
    pub fetched_at: String,
}
