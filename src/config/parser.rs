use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Each run records this hash so stored runs can be traced back to the
/// configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkipPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
max-pages = 5
detail-concurrency = 2
min-delay-ms = 100
max-delay-ms = 200
skip-policy = "duration-and-actors"

[storage]
sqlite-path = "./harvest.db"

[[source]]
url = "https://catalog.example.com/new"
tag = "new"

[[source]]
url = "https://catalog.example.com/genres/drama?sort=recent"
tag = "drama"
detail-path-marker = "/v/"

[categories]
Drama = ["drama", "剧情"]
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_pages, 5);
        assert_eq!(config.crawler.detail_concurrency, 2);
        assert!(config.crawler.headless);
        assert_eq!(config.crawler.skip_policy, SkipPolicy::DurationAndActors);
        assert_eq!(config.crawler.navigation_timeout_secs, 60);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].detail_path_marker.as_deref(), Some("/v/"));
        assert_eq!(config.storage.sqlite_path.as_deref(), Some("./harvest.db"));
        assert_eq!(config.storage.table, "videos");
        assert_eq!(config.categories.unwrap()["Drama"].len(), 2);
    }

    #[test]
    fn test_defaults_apply() {
        let config = parse_config(
            r#"
[crawler]

[[source]]
url = "https://catalog.example.com/new"
tag = "new"
"#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_pages, 30);
        assert_eq!(config.crawler.detail_concurrency, 3);
        assert!(config.crawler.headless);
        assert_eq!(config.crawler.skip_policy, SkipPolicy::Duration);
        assert!(config.categories.is_none());
        assert!(config.render.browserless_url.is_none());
        assert_eq!(config.storage.rest_key_env, "SUPABASE_KEY");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
detail-concurrency = 0

[[source]]
url = "https://catalog.example.com/new"
tag = "new"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_visible_mode_without_chrome_engine_rejected() {
        let result = parse_config(
            r#"
[crawler]
headless = false

[[source]]
url = "https://catalog.example.com/new"
tag = "new"
"#,
        );

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
