//! Concurrent documentation crawler
//!
//! Four pieces cooperate to walk one documentation site:
//!
//! - [`frontier`]: the shared URL queue and visited set, one lock, no
//!   duplicate dispatch
//! - [`fetcher`]: the retry-free HTTP client and link extraction
//! - [`scheduler`]: the worker pool, retry policy, and job lifecycle
//! - [`checkpoint`]: atomic progress snapshots for resumable runs

pub mod checkpoint;
pub mod fetcher;
pub mod frontier;
pub mod scheduler;

pub use checkpoint::{checkpoint_path, load_checkpoint, save_checkpoint, CheckpointRecord};
pub use fetcher::{build_http_client, extract_links, fetch_page, FetchError, FetchedPage};
pub use frontier::{EnqueueOutcome, Frontier, FrontierSnapshot, VisitOutcome};
pub use scheduler::{CancelHandle, CrawlJob, JobError, JobReport, JobState, Scheduler};
