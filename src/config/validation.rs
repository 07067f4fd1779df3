use crate::config::types::{Config, CrawlerConfig, RenderConfig, SourceSpec, StorageConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Upper bound on render handles in the detail pool
const MAX_DETAIL_CONCURRENCY: u32 = 16;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_render_config(&config.render)?;
    validate_engine_mode(&config.crawler, &config.render)?;
    validate_storage_config(&config.storage)?;
    validate_sources(&config.sources)?;
    if let Some(categories) = &config.categories {
        validate_categories(categories)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.detail_concurrency < 1 || config.detail_concurrency > MAX_DETAIL_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "detail_concurrency must be between 1 and {}, got {}",
            MAX_DETAIL_CONCURRENCY, config.detail_concurrency
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.min_title_length < 1 {
        return Err(ConfigError::Validation(
            "min_title_length must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates render configuration
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if let Some(endpoint) = &config.browserless_url {
        validate_http_url(endpoint, "browserless_url")?;
    }

    Ok(())
}

/// Checks that the engine can honor the headless flag
///
/// Only the Chrome engine has a window to show or a pointer to move, so
/// visible mode needs it, and it needs the `browser` build feature.
fn validate_engine_mode(
    crawler: &CrawlerConfig,
    render: &RenderConfig,
) -> Result<(), ConfigError> {
    if render.browser && !cfg!(feature = "browser") {
        return Err(ConfigError::Validation(
            "render.browser requires a build with the `browser` feature".to_string(),
        ));
    }

    if render.browser && render.browserless_url.is_some() {
        return Err(ConfigError::Validation(
            "render.browser and render.browserless_url are mutually exclusive".to_string(),
        ));
    }

    if !crawler.headless && !render.browser {
        return Err(ConfigError::Validation(
            "headless = false needs a visible engine; set render.browser = true".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.sqlite_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "sqlite_path cannot be empty".to_string(),
            ));
        }
    }

    if let Some(endpoint) = &config.rest_url {
        validate_http_url(endpoint, "rest_url")?;
    }

    if config.table.is_empty()
        || !config
            .table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "table must be a non-empty identifier, got '{}'",
            config.table
        )));
    }

    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceSpec]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[source]] entry is required".to_string(),
        ));
    }

    let mut tags = HashSet::new();
    for source in sources {
        validate_http_url(&source.url, "source url")?;

        if source.tag.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' must have a non-empty tag",
                source.url
            )));
        }

        if !tags.insert(source.tag.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source tag '{}'",
                source.tag
            )));
        }
    }

    Ok(())
}

/// Validates the category keyword table
fn validate_categories(
    categories: &std::collections::BTreeMap<String, Vec<String>>,
) -> Result<(), ConfigError> {
    for (label, keywords) in categories {
        if label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Category labels cannot be empty".to_string(),
            ));
        }

        if keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Category '{}' must have at least one non-empty keyword",
                label
            )));
        }
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL
fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
