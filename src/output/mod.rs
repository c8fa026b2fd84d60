//! Corpus artifact writing and run reporting
//!
//! This module writes the merged corpus to its JSON artifact and prints
//! human-readable summaries of a finished run.

use crate::crawler::JobReport;
use crate::merge::MergedCorpus;
use crate::WeldError;
use std::fs;
use std::path::Path;

/// Writes the merged corpus JSON artifact
///
/// Uses the same write-temp-then-rename discipline as checkpoints so a crash
/// mid-write never leaves a truncated artifact behind.
///
/// # Arguments
///
/// * `path` - Destination of the corpus JSON file
/// * `corpus` - The merged corpus to serialize
pub fn write_corpus(path: &Path, corpus: &MergedCorpus) -> Result<(), WeldError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(corpus)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json)?;
    fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), bytes = json.len(), "corpus artifact written");
    Ok(())
}

/// Prints a per-source crawl summary to stdout
pub fn print_job_reports(jobs: &[(String, JobReport)]) {
    if jobs.is_empty() {
        return;
    }

    println!("=== Crawl Summary ===\n");
    for (source, report) in jobs {
        println!("Source '{}':", source);
        println!("  State: {:?}", report.state);
        println!("  Pages fetched: {}", report.pages_fetched);
        println!("  URLs visited: {}", report.visited);
        if report.dropped_links > 0 {
            println!("  Links dropped at frontier bound: {}", report.dropped_links);
        }
        println!("  Fetch errors: {}", report.errors.len());
        for error in report.errors.iter().take(10) {
            println!("    {} - {}", error.url, error.message);
        }
        if report.errors.len() > 10 {
            println!("    ... and {} more", report.errors.len() - 10);
        }
        println!("  Checkpoint: {}", report.checkpoint.display());
        println!();
    }
}

/// Prints the corpus and conflict summary to stdout
pub fn print_corpus_summary(corpus: &MergedCorpus) {
    println!("=== Corpus Summary ===\n");
    println!("Corpus '{}':", corpus.name);
    println!("  Pages: {}", corpus.summary.pages);
    println!("  Entities: {}", corpus.summary.entities);
    println!("  Conflicts: {}", corpus.summary.conflicts);

    if !corpus.summary.conflicts_by_type.is_empty() {
        println!("\nConflicts by type:");
        for (kind, count) in &corpus.summary.conflicts_by_type {
            println!("  {}: {}", kind, count);
        }
    }

    if !corpus.summary.conflicts_by_severity.is_empty() {
        println!("\nConflicts by severity:");
        for (severity, count) in &corpus.summary.conflicts_by_severity {
            println!("  {}: {}", severity, count);
        }
    }
    println!();
}

/// Prints every individual conflict, grouped by severity
pub fn print_conflict_report(corpus: &MergedCorpus) {
    let mut conflicts: Vec<_> = corpus
        .entries
        .iter()
        .filter_map(|entry| match entry {
            crate::merge::MergedEntry::Entity { conflicts, .. } if !conflicts.is_empty() => {
                Some(conflicts)
            }
            _ => None,
        })
        .flatten()
        .collect();

    if conflicts.is_empty() {
        println!("No conflicts detected.");
        return;
    }

    conflicts.sort_by_key(|c| (c.severity, c.entity.clone()));

    println!("=== Conflict Report ===\n");
    for conflict in conflicts {
        println!("[{}] {} ({})", conflict.severity, conflict.entity, conflict.kind);
        println!("  {}", conflict.difference);
        println!("  Suggestion: {}", conflict.suggestion);
        println!();
    }
}
