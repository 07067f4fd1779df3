//! Storage traits and error types
//!
//! This module defines the capability the crawler needs from a record store
//! and the errors a store can report.

use crate::record::{CategorizedRecord, ExistingMetadata};
use crate::storage::{ActiveRecord, RunRecord, StoreStats};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed for {external_id}: {message}")]
    Write {
        external_id: String,
        message: String,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation not supported by the {0} store")]
    Unsupported(&'static str),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed record store
///
/// Records are identified by their external ID; `upsert` inserts or updates
/// in place, so writing the same record twice leaves the same state as
/// writing it once.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads the stored metadata for every known ID in `ids`
    ///
    /// IDs without a stored record are simply absent from the result.
    async fn batch_get(&self, ids: &[String]) -> StoreResult<HashMap<String, ExistingMetadata>>;

    /// Inserts or updates a record keyed by its external ID
    async fn upsert(&self, record: CategorizedRecord) -> StoreResult<()>;

    /// Oldest active records, up to `limit`
    async fn list_active(&self, limit: usize) -> StoreResult<Vec<ActiveRecord>>;

    /// Flags a record as active or inactive
    async fn set_active(&self, external_id: &str, active: bool) -> StoreResult<()>;

    /// Aggregate counts over stored records
    async fn stats(&self) -> StoreResult<StoreStats> {
        Err(StoreError::Unsupported(self.name()))
    }

    /// Persists bookkeeping for a finished run
    async fn record_run(&self, _run: &RunRecord) -> StoreResult<()> {
        Ok(())
    }

    /// True when writes are only logged
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Short store name for logs
    fn name(&self) -> &'static str;
}
