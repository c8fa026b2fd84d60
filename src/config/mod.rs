//! Configuration module for docweld
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docweld::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docweld.toml")).unwrap();
//! println!("Corpus: {}", config.corpus.name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CorpusConfig, CrawlConfig, FieldPreference, MergeConfig, SourceConfig, SourceKind,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
