use serde::Deserialize;

/// Main configuration structure for docweld
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

/// Corpus output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusConfig {
    /// Human-readable corpus name
    pub name: String,

    /// Path the merged corpus JSON is written to
    #[serde(rename = "output-path")]
    pub output_path: String,

    /// Directory that holds per-source checkpoint files
    #[serde(rename = "checkpoint-dir")]
    pub checkpoint_dir: String,

    /// Path to the SQLite page store
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Delay each worker sleeps between its own requests (seconds)
    #[serde(rename = "delay-seconds")]
    pub delay_seconds: f64,

    /// Number of concurrent fetch workers (1-10)
    pub workers: u32,

    /// Maximum pages to fetch per source; 0 means unlimited
    #[serde(rename = "page-cap", default)]
    pub page_cap: u64,

    /// Write a checkpoint every this many fetched pages
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Maximum length of the pending URL queue
    #[serde(rename = "frontier-limit", default = "default_frontier_limit")]
    pub frontier_limit: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_checkpoint_interval() -> u64 {
    25
}

fn default_frontier_limit() -> usize {
    10_000
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Which provenance wins a field during merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldPreference {
    Code,
    Docs,
}

/// Field-level merge policy
///
/// Structural fields are parameter lists and return types; prose fields are
/// descriptions. The defaults follow the usual drift pattern: code is the
/// authority on shape, docs are the authority on wording.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_structural")]
    pub structural: FieldPreference,

    #[serde(default = "default_prose")]
    pub prose: FieldPreference,
}

fn default_structural() -> FieldPreference {
    FieldPreference::Code
}

fn default_prose() -> FieldPreference {
    FieldPreference::Docs
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            structural: default_structural(),
            prose: default_prose(),
        }
    }
}

/// The kind of a configured source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A documentation website, crawled over HTTP
    Web,
    /// A source-code tree on the local filesystem
    Code,
}

/// One configured documentation or code source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source name, used in logs and provenance locators
    pub name: String,

    /// Whether this source is crawled or read from disk
    pub kind: SourceKind,

    /// Base URL that bounds the crawl scope (web sources)
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Explicit seed URLs; defaults to the base URL when empty
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Root directory of the code tree (code sources)
    pub root: Option<String>,
}
