use crate::config::types::{Config, CrawlerConfig, SchedulerConfig, SourceEntry};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_advisory_endpoint(config.advisory.endpoint.as_deref())?;

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_jobs_per_source < 1 {
        return Err(ConfigError::Validation(
            "max_jobs_per_source must be >= 1".to_string(),
        ));
    }

    if config.settle_min_ms > config.settle_max_ms {
        return Err(ConfigError::Validation(format!(
            "settle_min_ms ({}) must not exceed settle_max_ms ({})",
            config.settle_min_ms, config.settle_max_ms
        )));
    }

    if config.pagination_seeds > 20 {
        return Err(ConfigError::Validation(format!(
            "pagination_seeds must be <= 20, got {}",
            config.pagination_seeds
        )));
    }

    if config.navigation_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout_ms must be >= 1000ms, got {}ms",
            config.navigation_timeout_ms
        )));
    }

    for domain in &config.spa_domains {
        if domain.is_empty() || !domain.contains('.') {
            return Err(ConfigError::Validation(format!(
                "spa_domains entry '{}' is not a domain",
                domain
            )));
        }
    }

    Ok(())
}

/// Validates scheduler configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.parallel_sources < 1 || config.parallel_sources > 16 {
        return Err(ConfigError::Validation(format!(
            "parallel_sources must be between 1 and 16, got {}",
            config.parallel_sources
        )));
    }

    if config.human_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "human_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.advisory_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "advisory_timeout_ms must be >= 100ms, got {}ms",
            config.advisory_timeout_ms
        )));
    }

    Ok(())
}

fn validate_advisory_endpoint(endpoint: Option<&str>) -> Result<(), ConfigError> {
    if let Some(endpoint) = endpoint {
        Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid advisory endpoint: {}", e)))?;
    }
    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut slugs = HashSet::new();

    for entry in sources {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        validate_slug(&entry.slug)?;

        if !slugs.insert(entry.slug.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source slug '{}'",
                entry.slug
            )));
        }

        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid source URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Source URL '{}' must use HTTP or HTTPS",
                entry.url
            )));
        }
    }

    Ok(())
}

/// Slugs are lowercase alphanumerics and hyphens
fn validate_slug(slug: &str) -> Result<(), ConfigError> {
    if slug.is_empty() {
        return Err(ConfigError::Validation(
            "source slug cannot be empty".to_string(),
        ));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "source slug must contain only lowercase alphanumerics and hyphens, got '{}'",
            slug
        )));
    }

    Ok(())
}
