//! Docweld: a documentation corpus welder
//!
//! This crate crawls documentation sites, extracts API signatures from both
//! documentation pages and source code, detects disagreements between the two,
//! and merges everything into a single annotated corpus.

pub mod config;
pub mod conflict;
pub mod crawler;
pub mod extract;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for docweld operations
#[derive(Debug, Error)]
pub enum WeldError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error at {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Extraction error in {source_name}: {message}")]
    Extract {
        source_name: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Crawl job failed: {0}")]
    JobFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown source kind: {0}")]
    UnknownSourceKind(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for docweld operations
pub type Result<T> = std::result::Result<T, WeldError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use conflict::{Conflict, ConflictReport, ConflictType, Severity};
pub use extract::{Provenance, SignatureRecord};
pub use merge::MergedCorpus;
pub use crate::url::normalize_url;
