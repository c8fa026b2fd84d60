use crate::config::types::{Config, CrawlConfig, SourceConfig, SourceKind};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Configuration errors fail fast, before any crawling begins.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_corpus_config(config)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if !(1..=10).contains(&config.workers) {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 10, got {}",
            config.workers
        )));
    }

    if !config.delay_seconds.is_finite() || config.delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay-seconds must be a finite value >= 0, got {}",
            config.delay_seconds
        )));
    }

    if config.checkpoint_interval == 0 {
        return Err(ConfigError::Validation(
            "checkpoint-interval must be >= 1".to_string(),
        ));
    }

    if config.frontier_limit == 0 {
        return Err(ConfigError::Validation(
            "frontier-limit must be >= 1".to_string(),
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "timeout-seconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates corpus output paths
fn validate_corpus_config(config: &Config) -> Result<(), ConfigError> {
    if config.corpus.name.is_empty() {
        return Err(ConfigError::Validation(
            "corpus name cannot be empty".to_string(),
        ));
    }

    if config.corpus.output_path.is_empty() {
        return Err(ConfigError::Validation(
            "output-path cannot be empty".to_string(),
        ));
    }

    if config.corpus.checkpoint_dir.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-dir cannot be empty".to_string(),
        ));
    }

    if config.corpus.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] entry is required".to_string(),
        ));
    }

    for source in sources {
        if source.name.is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        match source.kind {
            SourceKind::Web => validate_web_source(source)?,
            SourceKind::Code => validate_code_source(source)?,
        }
    }

    Ok(())
}

/// Validates a web source: base URL required, seeds must parse and share it
fn validate_web_source(source: &SourceConfig) -> Result<(), ConfigError> {
    let base = source.base_url.as_deref().ok_or_else(|| {
        ConfigError::Validation(format!(
            "web source '{}' requires a base-url",
            source.name
        ))
    })?;

    let base_url = Url::parse(base)
        .map_err(|e| ConfigError::InvalidUrl(format!("base-url '{}': {}", base, e)))?;

    if base_url.scheme() != "http" && base_url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            base
        )));
    }

    for seed in &source.seeds {
        let seed_url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("seed '{}': {}", seed, e)))?;

        if seed_url.host_str() != base_url.host_str() {
            return Err(ConfigError::Validation(format!(
                "seed '{}' is outside the base-url host for source '{}'",
                seed, source.name
            )));
        }
    }

    Ok(())
}

/// Validates a code source: root directory required
fn validate_code_source(source: &SourceConfig) -> Result<(), ConfigError> {
    match source.root.as_deref() {
        Some(root) if !root.is_empty() => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "code source '{}' requires a root directory",
            source.name
        ))),
    }
}
