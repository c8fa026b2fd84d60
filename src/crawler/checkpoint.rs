//! Checkpoint persistence for resumable crawl jobs
//!
//! A checkpoint is a JSON snapshot of the frontier plus job metadata, written
//! with write-temp-then-rename semantics: a crash mid-write leaves the
//! previous valid checkpoint untouched. Checkpoint I/O failures are fatal to
//! the job, since resumability is a correctness guarantee the system cannot
//! silently abandon.

use crate::crawler::frontier::FrontierSnapshot;
use crate::WeldError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current checkpoint file format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serialized snapshot of a crawl job's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Format version, checked on load
    pub version: u32,

    /// Name of the source this job belongs to
    pub source: String,

    /// SHA-256 of the configuration the job started with
    pub config_hash: String,

    /// Frontier state at snapshot time
    pub frontier: FrontierSnapshot,

    /// When the checkpoint was written
    pub saved_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn new(source: &str, config_hash: &str, frontier: FrontierSnapshot) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            source: source.to_string(),
            config_hash: config_hash.to_string(),
            frontier,
            saved_at: Utc::now(),
        }
    }
}

/// Returns the checkpoint file path for a source
pub fn checkpoint_path(checkpoint_dir: &Path, source: &str) -> PathBuf {
    checkpoint_dir.join(format!("{}.checkpoint.json", source))
}

/// Writes a checkpoint atomically
///
/// The record is serialized to a sibling `.tmp` file first and then renamed
/// over the target, so the target path always holds a complete record.
pub fn save_checkpoint(path: &Path, record: &CheckpointRecord) -> Result<(), WeldError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WeldError::Checkpoint {
            path: path.to_path_buf(),
            message: format!("failed to create checkpoint dir: {}", e),
        })?;
    }

    let encoded = serde_json::to_vec_pretty(record).map_err(|e| WeldError::Checkpoint {
        path: path.to_path_buf(),
        message: format!("failed to serialize checkpoint: {}", e),
    })?;

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, encoded).map_err(|e| WeldError::Checkpoint {
        path: path.to_path_buf(),
        message: format!("failed to write temporary file: {}", e),
    })?;
    fs::rename(&tmp_path, path).map_err(|e| WeldError::Checkpoint {
        path: path.to_path_buf(),
        message: format!("failed to rename temporary file: {}", e),
    })?;

    tracing::debug!(path = %path.display(), pages = record.frontier.pages_fetched, "checkpoint saved");
    Ok(())
}

/// Loads a checkpoint if one exists at the given path
///
/// Returns `Ok(None)` when the file is absent. A present-but-unreadable
/// checkpoint is an error: silently restarting would violate resume-equivalence.
pub fn load_checkpoint(path: &Path) -> Result<Option<CheckpointRecord>, WeldError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(WeldError::Checkpoint {
                path: path.to_path_buf(),
                message: format!("failed to read checkpoint: {}", e),
            })
        }
    };

    let record: CheckpointRecord =
        serde_json::from_str(&content).map_err(|e| WeldError::Checkpoint {
            path: path.to_path_buf(),
            message: format!("failed to parse checkpoint: {}", e),
        })?;

    if record.version != CHECKPOINT_VERSION {
        return Err(WeldError::Checkpoint {
            path: path.to_path_buf(),
            message: format!(
                "unsupported checkpoint version {} (expected {})",
                record.version, CHECKPOINT_VERSION
            ),
        });
    }

    Ok(Some(record))
}
