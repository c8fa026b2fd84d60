//! Docweld main entry point
//!
//! This is the command-line interface for the docweld corpus builder.

use clap::Parser;
use docweld::config::{load_config_with_hash, Config, SourceKind};
use docweld::output;
use docweld::pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Docweld: a documentation corpus welder
///
/// Docweld crawls documentation sites, extracts function signatures from
/// both documentation pages and source trees, detects where the two
/// disagree, and merges everything into one corpus artifact.
#[derive(Parser, Debug)]
#[command(name = "docweld")]
#[command(version)]
#[command(about = "Builds a merged documentation corpus with conflict detection", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume interrupted crawls from their checkpoints (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start fresh, ignoring existing checkpoints
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would run without crawling
    #[arg(long, conflicts_with = "report")]
    dry_run: bool,

    /// Print every detected conflict after the run
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_run(&config, &config_hash, cli.fresh, cli.report, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docweld=info,warn"),
            1 => EnvFilter::new("docweld=debug,info"),
            2 => EnvFilter::new("docweld=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the run plan
fn handle_dry_run(config: &Config) {
    println!("=== Docweld Dry Run ===\n");

    println!("Corpus:");
    println!("  Name: {}", config.corpus.name);
    println!("  Output: {}", config.corpus.output_path);
    println!("  Checkpoints: {}", config.corpus.checkpoint_dir);
    println!("  Database: {}", config.corpus.database_path);

    println!("\nCrawl:");
    println!("  Workers: {}", config.crawl.workers);
    println!("  Delay: {}s per worker", config.crawl.delay_seconds);
    if config.crawl.delay_seconds > 0.0 {
        println!(
            "  Effective rate: {:.1} requests/second",
            config.crawl.workers as f64 / config.crawl.delay_seconds
        );
    }
    if config.crawl.page_cap > 0 {
        println!("  Page cap: {}", config.crawl.page_cap);
    } else {
        println!("  Page cap: unlimited");
    }
    println!("  Checkpoint every: {} pages", config.crawl.checkpoint_interval);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        match source.kind {
            SourceKind::Web => {
                println!(
                    "  - {} (web) base: {}",
                    source.name,
                    source.base_url.as_deref().unwrap_or("?")
                );
                for seed in &source.seeds {
                    println!("    * {}", seed);
                }
            }
            SourceKind::Code => {
                println!(
                    "  - {} (code) root: {}",
                    source.name,
                    source.root.as_deref().unwrap_or("?")
                );
            }
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main pipeline run
async fn handle_run(
    config: &Config,
    config_hash: &str,
    fresh: bool,
    report: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring existing checkpoints)");
    } else {
        tracing::info!("Starting run (will resume from checkpoints if present)");
    }

    let outcome = match pipeline::run(config, config_hash, fresh).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    output::write_corpus(
        std::path::Path::new(&config.corpus.output_path),
        &outcome.corpus,
    )?;

    if !quiet {
        output::print_job_reports(&outcome.jobs);
        output::print_corpus_summary(&outcome.corpus);
        if report {
            output::print_conflict_report(&outcome.corpus);
        }
    }

    if outcome.interrupted {
        tracing::warn!(
            "Run was interrupted; rerun without --fresh to resume from checkpoints"
        );
    } else {
        tracing::info!("Run completed successfully");
    }

    Ok(())
}
