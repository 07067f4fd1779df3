//! Store used when no credentials are available
//!
//! Reads return nothing, so every stub is treated as new, and writes are
//! logged instead of persisted.

use crate::record::{CategorizedRecord, ExistingMetadata};
use crate::storage::traits::{RecordStore, StoreResult};
use crate::storage::ActiveRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of records logged at info level before switching to debug
const PREVIEW_RECORDS: usize = 3;

#[derive(Debug, Default)]
pub struct DryRunStore {
    logged: AtomicUsize,
}

impl DryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that would have been written so far
    pub fn logged(&self) -> usize {
        self.logged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for DryRunStore {
    async fn batch_get(&self, _ids: &[String]) -> StoreResult<HashMap<String, ExistingMetadata>> {
        Ok(HashMap::new())
    }

    async fn upsert(&self, record: CategorizedRecord) -> StoreResult<()> {
        let seen = self.logged.fetch_add(1, Ordering::Relaxed);
        let categories = record
            .enrichment
            .as_ref()
            .map(|e| e.categories.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();

        if seen < PREVIEW_RECORDS {
            tracing::info!(
                "[dry run] {} | {} [{}]",
                record.stub.external_id,
                record.stub.title,
                categories
            );
        } else {
            tracing::debug!(
                "[dry run] {} | {} [{}]",
                record.stub.external_id,
                record.stub.title,
                categories
            );
        }
        Ok(())
    }

    async fn list_active(&self, _limit: usize) -> StoreResult<Vec<ActiveRecord>> {
        Ok(Vec::new())
    }

    async fn set_active(&self, external_id: &str, active: bool) -> StoreResult<()> {
        tracing::info!("[dry run] would set {} active={}", external_id, active);
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
