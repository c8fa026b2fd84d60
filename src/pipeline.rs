//! End-to-end pipeline: crawl, extract, detect, merge
//!
//! Runs every configured source in declaration order, turns each into a
//! [`SourceBatch`], and folds the batches into one [`MergedCorpus`]. Web
//! sources go crawl-then-extract over their stored pages; code sources go
//! straight to tree extraction. The pipeline owns run bookkeeping in the
//! database so a resumed invocation is auditable later.

use crate::config::{Config, SourceConfig, SourceKind};
use crate::crawler::{CrawlJob, JobReport, JobState, Scheduler};
use crate::extract::{self, docs};
use crate::merge::{self, MergedCorpus, MergedPage, SourceBatch};
use crate::storage::{RunStatus, SqliteStore};
use crate::url::normalize_url;
use crate::{WeldError, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// What one full pipeline invocation produced
pub struct PipelineOutcome {
    pub corpus: MergedCorpus,
    pub jobs: Vec<(String, JobReport)>,
    pub run_id: i64,
    pub interrupted: bool,
}

/// Runs the whole pipeline for one configuration
///
/// With `fresh` set, existing checkpoints are ignored and every web source
/// crawls from its seeds. Ctrl-C cancels the active crawl job; whatever was
/// gathered before the interrupt still merges into the corpus.
pub async fn run(config: &Config, config_hash: &str, fresh: bool) -> Result<PipelineOutcome> {
    let store = Arc::new(Mutex::new(SqliteStore::new(Path::new(
        &config.corpus.database_path,
    ))?));
    let run_id = store.lock().unwrap().create_run(config_hash)?;

    let mut batches = Vec::new();
    let mut jobs = Vec::new();
    let mut interrupted = false;

    let result = async {
        for source in &config.sources {
            match source.kind {
                SourceKind::Web => {
                    let report = crawl_source(
                        source,
                        config,
                        config_hash,
                        Arc::clone(&store),
                        run_id,
                        fresh,
                    )
                    .await?;

                    if report.state == JobState::Cancelled {
                        interrupted = true;
                    }
                    jobs.push((source.name.clone(), report));
                    batches.push(extract_web_batch(source, &store)?);

                    if interrupted {
                        tracing::warn!(
                            source = %source.name,
                            "crawl cancelled; skipping remaining sources"
                        );
                        break;
                    }
                }
                SourceKind::Code => {
                    batches.push(extract_code_batch(source)?);
                }
            }
        }
        Ok::<(), WeldError>(())
    }
    .await;

    if let Err(e) = result {
        store
            .lock()
            .unwrap()
            .finish_run(run_id, RunStatus::Failed)?;
        tracing::error!(error = %e, run_id, "pipeline run failed");
        return Err(e);
    }

    let corpus = merge::merge_sources(&config.corpus.name, &config.merge, &batches, Utc::now());

    let status = if interrupted {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    store.lock().unwrap().finish_run(run_id, status)?;

    Ok(PipelineOutcome {
        corpus,
        jobs,
        run_id,
        interrupted,
    })
}

/// Crawls one web source, with Ctrl-C wired to job cancellation
async fn crawl_source(
    source: &SourceConfig,
    config: &Config,
    config_hash: &str,
    store: Arc<Mutex<SqliteStore>>,
    run_id: i64,
    fresh: bool,
) -> Result<JobReport> {
    let base_url = source
        .base_url
        .as_deref()
        .ok_or_else(|| WeldError::JobFailed(format!("source '{}' has no base-url", source.name)))?;
    let base_url = normalize_url(base_url)?;

    let mut seeds = Vec::new();
    for seed in &source.seeds {
        seeds.push(normalize_url(seed)?);
    }

    let job = CrawlJob::new(&source.name, base_url, seeds, config_hash);
    let mut scheduler = Scheduler::new(
        job,
        &config.crawl,
        store,
        run_id,
        Path::new(&config.corpus.checkpoint_dir),
        fresh,
    )?;

    let cancel = scheduler.cancel_handle();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling crawl");
            cancel.cancel();
        }
    });

    let report = scheduler.run().await;
    signal_task.abort();
    report
}

/// Reads a web source's stored pages and extracts doc signatures from them
fn extract_web_batch(
    source: &SourceConfig,
    store: &Arc<Mutex<SqliteStore>>,
) -> Result<SourceBatch> {
    let pages = store.lock().unwrap().pages_for_source(&source.name)?;

    let mut merged_pages = Vec::new();
    let mut doc_signatures = Vec::new();

    for page in &pages {
        merged_pages.push(MergedPage {
            source: page.source.clone(),
            url: page.url.clone(),
            fetched_at: page.fetched_at.clone(),
        });

        let body = match &page.body {
            Some(body) => body,
            None => continue,
        };
        let is_html = page
            .content_type
            .as_deref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(true);
        if is_html {
            doc_signatures.extend(docs::extract_page(body, &page.url));
        }
    }

    tracing::info!(
        source = %source.name,
        pages = merged_pages.len(),
        signatures = doc_signatures.len(),
        "documentation extraction finished"
    );

    Ok(SourceBatch {
        source: source.name.clone(),
        pages: merged_pages,
        docs: doc_signatures,
        code: Vec::new(),
    })
}

/// Walks a code source's tree and extracts code signatures
fn extract_code_batch(source: &SourceConfig) -> Result<SourceBatch> {
    let root = source
        .root
        .as_deref()
        .ok_or_else(|| WeldError::Extract {
            source_name: source.name.clone(),
            message: "code source has no root directory".to_string(),
        })?;

    let records = extract::extract_from_tree(Path::new(root)).map_err(|e| WeldError::Extract {
        source_name: source.name.clone(),
        message: e.to_string(),
    })?;

    tracing::info!(
        source = %source.name,
        root,
        signatures = records.len(),
        "code extraction finished"
    );

    Ok(SourceBatch {
        source: source.name.clone(),
        pages: Vec::new(),
        docs: Vec::new(),
        code: records,
    })
}
