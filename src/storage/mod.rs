//! Storage module for persisting harvested records
//!
//! This module handles every write the crawler makes, including:
//! - Batch reads of stored metadata ahead of the skip decision
//! - Idempotent upserts keyed by external ID
//! - Active/inactive flags for the link liveness sweep
//! - Run bookkeeping
//!
//! Backends: local SQLite, a hosted REST table, and a dry-run store that only
//! logs what it would write.

mod dry_run;
mod rest;
mod schema;
mod sqlite;
mod traits;

pub use dry_run::DryRunStore;
pub use rest::RestStore;
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StoreError, StoreResult};

use crate::config::StorageConfig;
use crate::crawler::CrawlSummary;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Record selected for a liveness check
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ActiveRecord {
    pub external_id: String,
    pub source_url: String,
}

/// A record as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub external_id: String,
    pub title: String,
    pub cover_url: String,
    pub source_url: String,
    pub source_tag: String,
    pub duration: Option<String>,
    pub release_date: Option<String>,
    pub actors: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub is_active: bool,
}

/// Aggregate counts over stored records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub active: u64,
    pub with_duration: u64,
    pub by_source: BTreeMap<String, u64>,
}

/// Bookkeeping for one crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub summary: CrawlSummary,
}

/// Opens the store the configuration asks for
///
/// Falls back to a [`DryRunStore`] when `dry_run` is set or when no usable
/// backend is configured (for example, the REST key is missing from the
/// environment and no SQLite path is set).
pub fn open_store(
    config: &StorageConfig,
    dry_run: bool,
) -> Result<Arc<dyn RecordStore>, StoreError> {
    if dry_run {
        tracing::info!("Dry run requested; records will only be logged");
        return Ok(Arc::new(DryRunStore::new()));
    }

    if let Some(rest_url) = &config.rest_url {
        match std::env::var(&config.rest_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                tracing::info!("Using REST store at {} (table {})", rest_url, config.table);
                return Ok(Arc::new(RestStore::new(rest_url, &key, &config.table)?));
            }
            _ => {
                tracing::warn!(
                    "REST store configured but ${} is not set",
                    config.rest_key_env
                );
            }
        }
    }

    if let Some(path) = &config.sqlite_path {
        tracing::info!("Using SQLite store at {}", path);
        return Ok(Arc::new(SqliteStore::new(Path::new(path))?));
    }

    tracing::warn!("No store credentials found; running in dry-run mode");
    Ok(Arc::new(DryRunStore::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_dry_run_flag() {
        let config = StorageConfig {
            sqlite_path: Some("/nonexistent/dir/harvest.db".to_string()),
            ..StorageConfig::default()
        };
        let store = open_store(&config, true).unwrap();
        assert!(store.is_dry_run());
    }

    #[test]
    fn test_open_store_without_backend_degrades_to_dry_run() {
        let config = StorageConfig {
            rest_url: Some("https://project.example.com/rest/v1".to_string()),
            rest_key_env: "CATALOG_HARVEST_TEST_UNSET_KEY".to_string(),
            ..StorageConfig::default()
        };
        let store = open_store(&config, false).unwrap();
        assert!(store.is_dry_run());
    }

    #[test]
    fn test_open_store_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            sqlite_path: Some(dir.path().join("harvest.db").display().to_string()),
            ..StorageConfig::default()
        };
        let store = open_store(&config, false).unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(!store.is_dry_run());
    }
}
