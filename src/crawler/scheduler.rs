//! Crawl scheduler: the worker pool that drives a job
//!
//! The scheduler owns all concurrency coordination for one crawl job. A fixed
//! pool of workers repeatedly draws a URL from the frontier, fetches it,
//! enqueues in-scope links, streams the page to storage, and records the
//! visit. Rate limiting is per worker, not global: each worker sleeps the
//! configured delay between its own requests, so effective throughput is
//! `workers / delay` requests per second. That per-worker semantics is a
//! deliberate, documented choice, not an emergent property.

use crate::config::CrawlConfig;
use crate::crawler::checkpoint::{
    checkpoint_path, load_checkpoint, save_checkpoint, CheckpointRecord,
};
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchError};
use crate::crawler::frontier::Frontier;
use crate::storage::{PageRow, SqliteStore};
use crate::url::{in_scope, normalize_url};
use crate::WeldError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// How many times a transient fetch failure is retried before the page is
/// recorded as failed. The fetch client itself never retries.
const MAX_FETCH_RETRIES: u32 = 1;

/// Backoff before a retry attempt
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// How long an idle worker waits before re-checking the frontier
const IDLE_POLL: Duration = Duration::from_millis(25);

/// Lifecycle of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One entry in the per-job error log
#[derive(Debug, Clone)]
pub struct JobError {
    pub url: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Summary of a finished crawl job
#[derive(Debug)]
pub struct JobReport {
    pub state: JobState,
    pub pages_fetched: u64,
    pub visited: usize,
    pub dropped_links: u64,
    /// Per-page errors collected during the run; inspected at completion,
    /// never silently swallowed inside a worker
    pub errors: Vec<JobError>,
    /// Last checkpoint location, reported so a failed job can resume
    pub checkpoint: PathBuf,
}

/// Handle for cancelling a running job from outside
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
    external: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Signals all workers to stop after their current fetch
    pub fn cancel(&self) {
        self.external.store(true, Ordering::SeqCst);
        let _ = self.tx.send(true);
    }
}

/// Identity and limits of one crawl job; immutable once the run starts
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub source: String,
    pub base_url: Url,
    pub seeds: Vec<Url>,
    pub config_hash: String,
}

impl CrawlJob {
    pub fn new(source: &str, base_url: Url, seeds: Vec<Url>, config_hash: &str) -> Self {
        let seeds = if seeds.is_empty() {
            vec![base_url.clone()]
        } else {
            seeds
        };
        Self {
            source: source.to_string(),
            base_url,
            seeds,
            config_hash: config_hash.to_string(),
        }
    }
}

/// Shared context handed to every worker
struct WorkerCtx {
    client: Client,
    job: CrawlJob,
    frontier: Frontier,
    store: Arc<Mutex<SqliteStore>>,
    run_id: i64,
    delay: Duration,
    timeout: Duration,
    checkpoint_interval: u64,
    checkpoint_file: PathBuf,
    /// Serializes checkpoint writes; they share one destination file
    checkpoint_write: Mutex<()>,
    errors: Mutex<Vec<JobError>>,
    fatal: Mutex<Option<String>>,
    cancel_tx: watch::Sender<bool>,
}

impl WorkerCtx {
    fn record_error(&self, url: &str, message: String) {
        self.errors.lock().unwrap().push(JobError {
            url: url.to_string(),
            message,
            at: Utc::now(),
        });
    }

    /// Marks the job as fatally failed and tells every worker to stop
    fn record_fatal(&self, message: String) {
        let mut fatal = self.fatal.lock().unwrap();
        if fatal.is_none() {
            *fatal = Some(message);
        }
        let _ = self.cancel_tx.send(true);
    }

    fn write_checkpoint(&self) -> Result<(), WeldError> {
        // One writer at a time; the frontier stays unlocked during the I/O so
        // dispatch is blocked for no longer than the write itself.
        let _guard = self.checkpoint_write.lock().unwrap();
        let record = CheckpointRecord::new(
            &self.job.source,
            &self.job.config_hash,
            self.frontier.snapshot(),
        );
        save_checkpoint(&self.checkpoint_file, &record)
    }
}

/// Worker-pool scheduler for one crawl job
pub struct Scheduler {
    ctx: Arc<WorkerCtx>,
    workers: u32,
    state: JobState,
    cancel_rx: watch::Receiver<bool>,
    external_cancel: Arc<AtomicBool>,
}

impl Scheduler {
    /// Creates a scheduler, resuming from a checkpoint when one exists
    ///
    /// With `fresh` set, any existing checkpoint is ignored. Otherwise a
    /// checkpoint for this source is loaded and its frontier restored; a
    /// checkpoint written under a different config hash is refused.
    pub fn new(
        job: CrawlJob,
        crawl: &CrawlConfig,
        store: Arc<Mutex<SqliteStore>>,
        run_id: i64,
        checkpoint_dir: &Path,
        fresh: bool,
    ) -> Result<Self, WeldError> {
        let checkpoint_file = checkpoint_path(checkpoint_dir, &job.source);

        let frontier = if fresh {
            None
        } else {
            match load_checkpoint(&checkpoint_file)? {
                Some(record) if record.config_hash != job.config_hash => {
                    return Err(WeldError::Checkpoint {
                        path: checkpoint_file,
                        message: format!(
                            "checkpoint for source '{}' was written under a different \
                             configuration; rerun with --fresh to discard it",
                            job.source
                        ),
                    });
                }
                Some(record) => {
                    tracing::info!(
                        source = %job.source,
                        pages = record.frontier.pages_fetched,
                        pending = record.frontier.pending.len(),
                        "resuming from checkpoint"
                    );
                    Some(Frontier::from_snapshot(
                        record.frontier,
                        crawl.frontier_limit,
                        crawl.page_cap,
                    ))
                }
                None => None,
            }
        };

        let frontier =
            frontier.unwrap_or_else(|| Frontier::new(crawl.frontier_limit, crawl.page_cap));

        for seed in &job.seeds {
            frontier.enqueue(seed.as_str());
        }

        let user_agent = format!("docweld/{}", env!("CARGO_PKG_VERSION"));
        let client = build_http_client(&user_agent)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);

        let ctx = Arc::new(WorkerCtx {
            client,
            job,
            frontier,
            store,
            run_id,
            delay: Duration::from_secs_f64(crawl.delay_seconds),
            timeout: Duration::from_secs(crawl.timeout_seconds),
            checkpoint_interval: crawl.checkpoint_interval,
            checkpoint_file,
            checkpoint_write: Mutex::new(()),
            errors: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
            cancel_tx,
        });

        Ok(Self {
            ctx,
            workers: crawl.workers,
            state: JobState::Idle,
            cancel_rx,
            external_cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns a handle that can cancel this job from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::new(self.ctx.cancel_tx.clone()),
            external: Arc::clone(&self.external_cancel),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Runs the job to completion
    ///
    /// Spawns the worker pool and waits for it to drain. Per-page fetch
    /// failures are recorded and skipped; the job only fails on unrecoverable
    /// errors (checkpoint I/O, worker panic). A final checkpoint is written on
    /// every exit path so even a cancelled job can resume.
    pub async fn run(&mut self) -> Result<JobReport, WeldError> {
        self.state = JobState::Running;
        let started = std::time::Instant::now();

        tracing::info!(
            source = %self.ctx.job.source,
            workers = self.workers,
            delay_ms = self.ctx.delay.as_millis() as u64,
            "starting crawl job"
        );

        let mut tasks: JoinSet<Result<(), WeldError>> = JoinSet::new();
        for worker_id in 0..self.workers {
            let ctx = Arc::clone(&self.ctx);
            let cancel = self.cancel_rx.clone();
            tasks.spawn(worker_loop(ctx, cancel, worker_id));
        }

        let mut worker_panicked = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    // Worker surfaced a fatal error; it already signalled the
                    // others via record_fatal.
                    tracing::error!(error = %e, "worker reported fatal error");
                }
                Err(join_error) => {
                    // A panicking worker must never vanish silently: tear the
                    // pool down and fail the job.
                    worker_panicked = true;
                    self.ctx
                        .record_fatal(format!("worker task panicked: {}", join_error));
                }
            }
        }

        // Graceful-shutdown checkpoint, also after cancellation
        if let Err(e) = self.ctx.write_checkpoint() {
            self.ctx.record_fatal(format!("final checkpoint failed: {}", e));
        }

        let fatal = self.ctx.fatal.lock().unwrap().clone();
        self.state = if fatal.is_some() || worker_panicked {
            JobState::Failed
        } else if self.external_cancel.load(Ordering::SeqCst) {
            JobState::Cancelled
        } else {
            JobState::Completed
        };

        let errors = self.ctx.errors.lock().unwrap().clone();
        let report = JobReport {
            state: self.state,
            pages_fetched: self.ctx.frontier.pages_fetched(),
            visited: self.ctx.frontier.visited_count(),
            dropped_links: self.ctx.frontier.dropped_count(),
            errors,
            checkpoint: self.ctx.checkpoint_file.clone(),
        };

        tracing::info!(
            source = %self.ctx.job.source,
            state = ?report.state,
            pages = report.pages_fetched,
            errors = report.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crawl job finished"
        );

        if let Some(message) = fatal {
            return Err(WeldError::JobFailed(format!(
                "{} (last checkpoint: {})",
                message,
                report.checkpoint.display()
            )));
        }

        Ok(report)
    }
}

/// One worker's fetch loop
///
/// Each iteration: draw a URL, fetch it (with the scheduler's retry policy),
/// store the page, enqueue discovered in-scope links, mark the visit, and
/// sleep the per-worker delay. The cancellation signal is observed between
/// fetch attempts; an observed cancel skips link discovery and exits.
async fn worker_loop(
    ctx: Arc<WorkerCtx>,
    cancel: watch::Receiver<bool>,
    worker_id: u32,
) -> Result<(), WeldError> {
    loop {
        if *cancel.borrow() {
            tracing::debug!(worker_id, "cancellation observed, exiting");
            return Ok(());
        }

        let url_str = match ctx.frontier.next_batch(1).into_iter().next() {
            Some(url) => url,
            None => {
                if ctx.frontier.is_idle() || ctx.frontier.cap_reached() {
                    return Ok(());
                }
                // Another worker is mid-fetch and may still discover links
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }
        };

        if let Err(e) = process_url(&ctx, &cancel, &url_str).await {
            // Unrecoverable (checkpoint I/O); stop the whole pool
            ctx.record_fatal(e.to_string());
            // The URL was still attempted; count the visit so the frontier
            // snapshot stays consistent.
            ctx.frontier.mark_visited(&url_str, 0);
            return Err(e);
        }

        let outcome = ctx.frontier.mark_visited(&url_str, ctx.checkpoint_interval);
        if outcome.checkpoint_due {
            if let Err(e) = ctx.write_checkpoint() {
                ctx.record_fatal(e.to_string());
                return Err(e);
            }
        }

        // Per-worker rate limit
        if !ctx.delay.is_zero() {
            tokio::time::sleep(ctx.delay).await;
        }
    }
}

/// Fetches one URL and handles its outcome; returns Err only for fatal errors
async fn process_url(
    ctx: &Arc<WorkerCtx>,
    cancel: &watch::Receiver<bool>,
    url_str: &str,
) -> Result<(), WeldError> {
    let url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(e) => {
            ctx.record_error(url_str, format!("invalid URL in frontier: {}", e));
            return Ok(());
        }
    };

    match fetch_with_retry(ctx, &url).await {
        Ok(page) => {
            {
                let mut store = ctx.store.lock().unwrap();
                store.insert_page(&PageRow {
                    run_id: ctx.run_id,
                    source: ctx.job.source.clone(),
                    url: url_str.to_string(),
                    status_code: Some(page.status),
                    content_type: Some(page.content_type.clone()),
                    body: Some(page.body.clone()),
                    error: None,
                    fetched_at: page.fetched_at.to_rfc3339(),
                })?;
            }

            // Cancellation must not start new discovery
            if *cancel.borrow() {
                return Ok(());
            }

            for link in &page.links {
                let normalized = match normalize_url(link) {
                    Ok(normalized) => normalized,
                    Err(e) => {
                        tracing::debug!(link, error = %e, "skipping unnormalizable link");
                        continue;
                    }
                };

                if in_scope(&normalized, &ctx.job.base_url) {
                    ctx.frontier.enqueue(normalized.as_str());
                }
            }
        }
        Err(fetch_error) => {
            tracing::warn!(url = url_str, error = %fetch_error, "page fetch failed, skipping");
            ctx.record_error(url_str, fetch_error.to_string());

            let mut store = ctx.store.lock().unwrap();
            store.insert_page(&PageRow {
                run_id: ctx.run_id,
                source: ctx.job.source.clone(),
                url: url_str.to_string(),
                status_code: match fetch_error {
                    FetchError::HttpStatus(code) => Some(code),
                    _ => None,
                },
                content_type: None,
                body: None,
                error: Some(fetch_error.to_string()),
                fetched_at: Utc::now().to_rfc3339(),
            })?;
        }
    }

    Ok(())
}

/// Applies the scheduler's retry policy around the retry-free fetch client
async fn fetch_with_retry(
    ctx: &Arc<WorkerCtx>,
    url: &Url,
) -> Result<crate::crawler::FetchedPage, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_page(&ctx.client, url, ctx.timeout).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < MAX_FETCH_RETRIES => {
                attempt += 1;
                tracing::debug!(url = %url, error = %e, attempt, "transient fetch error, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_crawl_config() -> CrawlConfig {
        CrawlConfig {
            delay_seconds: 0.0,
            workers: 2,
            page_cap: 0,
            checkpoint_interval: 100,
            frontier_limit: 1000,
            timeout_seconds: 5,
        }
    }

    fn test_store() -> Arc<Mutex<SqliteStore>> {
        Arc::new(Mutex::new(SqliteStore::new_in_memory().unwrap()))
    }

    async fn mount_page(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/html"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_job_completes_and_counts_match() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(
            &server,
            "/",
            format!(
                r#"<html><body><a href="{0}/a">A</a><a href="{0}/b">B</a></body></html>"#,
                base
            ),
        )
        .await;
        mount_page(&server, "/a", "<html><body>leaf a</body></html>".to_string()).await;
        mount_page(&server, "/b", "<html><body>leaf b</body></html>".to_string()).await;

        let checkpoint_dir = tempfile::TempDir::new().unwrap();
        let base_url = normalize_url(&base).unwrap();
        let job = CrawlJob::new("docs", base_url, vec![], "hash");

        let store = test_store();
        let run_id = store.lock().unwrap().create_run("hash").unwrap();

        let mut scheduler = Scheduler::new(
            job,
            &test_crawl_config(),
            store,
            run_id,
            checkpoint_dir.path(),
            true,
        )
        .unwrap();

        let report = scheduler.run().await.unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.visited as u64, report.pages_fetched);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_worker_sleeps_delay_between_fetches() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(
            &server,
            "/",
            format!(
                r#"<html><body><a href="{0}/a">A</a><a href="{0}/b">B</a></body></html>"#,
                base
            ),
        )
        .await;
        mount_page(&server, "/a", "<html><body>leaf a</body></html>".to_string()).await;
        mount_page(&server, "/b", "<html><body>leaf b</body></html>".to_string()).await;

        let config = CrawlConfig {
            delay_seconds: 0.05,
            workers: 1,
            ..test_crawl_config()
        };

        let checkpoint_dir = tempfile::TempDir::new().unwrap();
        let base_url = normalize_url(&base).unwrap();
        let job = CrawlJob::new("docs", base_url, vec![], "hash");

        let store = test_store();
        let run_id = store.lock().unwrap().create_run("hash").unwrap();

        let mut scheduler =
            Scheduler::new(job, &config, store, run_id, checkpoint_dir.path(), true).unwrap();

        let started = std::time::Instant::now();
        let report = scheduler.run().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.pages_fetched, 3);
        // One sleep per processed page; a lower bound of two delays proves
        // the worker is actually pacing rather than fetching back-to-back.
        assert!(
            elapsed >= Duration::from_millis(100),
            "3 pages at 50ms delay finished in {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_failed_pages_recorded_not_fatal() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(
            &server,
            "/",
            format!(r#"<html><body><a href="{}/missing">M</a></body></html>"#, base),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let checkpoint_dir = tempfile::TempDir::new().unwrap();
        let base_url = normalize_url(&base).unwrap();
        let job = CrawlJob::new("docs", base_url, vec![], "hash");

        let store = test_store();
        let run_id = store.lock().unwrap().create_run("hash").unwrap();

        let mut scheduler = Scheduler::new(
            job,
            &test_crawl_config(),
            Arc::clone(&store),
            run_id,
            checkpoint_dir.path(),
            true,
        )
        .unwrap();

        let report = scheduler.run().await.unwrap();

        // The 404 is skipped, not fatal; both pages count as visited
        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("404"));
    }

    #[tokio::test]
    async fn test_page_cap_stops_job() {
        let server = MockServer::start().await;
        let base = server.uri();

        // Every page links onward; the cap must cut the walk short
        for i in 0..10 {
            let route = if i == 0 { "/".to_string() } else { format!("/p{}", i) };
            mount_page(
                &server,
                &route,
                format!(r#"<html><body><a href="{}/p{}">next</a></body></html>"#, base, i + 1),
            )
            .await;
        }

        let checkpoint_dir = tempfile::TempDir::new().unwrap();
        let base_url = normalize_url(&base).unwrap();
        let job = CrawlJob::new("docs", base_url, vec![], "hash");

        let mut config = test_crawl_config();
        config.page_cap = 3;

        let store = test_store();
        let run_id = store.lock().unwrap().create_run("hash").unwrap();

        let mut scheduler =
            Scheduler::new(job, &config, store, run_id, checkpoint_dir.path(), true).unwrap();
        let report = scheduler.run().await.unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.pages_fetched, 3);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_resumable_checkpoint() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(
            &server,
            "/",
            format!(
                r#"<html><body><a href="{0}/a">A</a><a href="{0}/b">B</a></body></html>"#,
                base
            ),
        )
        .await;
        mount_page(&server, "/a", "<html></html>".to_string()).await;
        mount_page(&server, "/b", "<html></html>".to_string()).await;

        let checkpoint_dir = tempfile::TempDir::new().unwrap();
        let base_url = normalize_url(&base).unwrap();
        let job = CrawlJob::new("docs", base_url, vec![], "hash");

        let store = test_store();
        let run_id = store.lock().unwrap().create_run("hash").unwrap();

        let mut scheduler = Scheduler::new(
            job,
            &test_crawl_config(),
            store,
            run_id,
            checkpoint_dir.path(),
            true,
        )
        .unwrap();

        // Cancel before the job starts; workers observe it immediately
        scheduler.cancel_handle().cancel();
        let report = scheduler.run().await.unwrap();

        assert_eq!(report.state, JobState::Cancelled);

        // The final checkpoint still exists and parses
        let record = load_checkpoint(&report.checkpoint).unwrap().unwrap();
        assert_eq!(record.source, "docs");
    }

    #[tokio::test]
    async fn test_checkpoint_hash_mismatch_refused() {
        let checkpoint_dir = tempfile::TempDir::new().unwrap();
        let file = checkpoint_path(checkpoint_dir.path(), "docs");
        let record = CheckpointRecord::new(
            "docs",
            "old-hash",
            crate::crawler::frontier::FrontierSnapshot {
                visited: vec![],
                pending: vec![],
                pages_fetched: 0,
            },
        );
        save_checkpoint(&file, &record).unwrap();

        let base_url = Url::parse("https://docs.example.com/").unwrap();
        let job = CrawlJob::new("docs", base_url, vec![], "new-hash");
        let store = test_store();

        let result = Scheduler::new(
            job,
            &test_crawl_config(),
            store,
            1,
            checkpoint_dir.path(),
            false,
        );

        assert!(matches!(result, Err(WeldError::Checkpoint { .. })));
    }
}
