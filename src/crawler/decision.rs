//! Incremental skip decision
//!
//! Before any detail page is fetched, the stored metadata of a batch is read
//! once and every stub is sorted into "already complete" or "needs a deep
//! scrape". The split itself is a pure function of the snapshot.

use crate::config::SkipPolicy;
use crate::record::{ExistingMetadata, StubRecord};
use crate::storage::RecordStore;
use std::collections::HashMap;

/// Stored metadata keyed by external ID, read once per batch
pub type MetadataSnapshot = HashMap<String, ExistingMetadata>;

/// Stubs split by whether their detail page must be fetched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub skip: Vec<StubRecord>,
    pub needs_deep_scrape: Vec<StubRecord>,
}

/// Splits stubs according to the stored snapshot
pub fn partition(
    stubs: Vec<StubRecord>,
    snapshot: &MetadataSnapshot,
    policy: SkipPolicy,
) -> Partition {
    let mut result = Partition::default();

    for stub in stubs {
        let complete = snapshot
            .get(&stub.external_id)
            .is_some_and(|existing| is_complete(existing, policy));

        if complete {
            tracing::debug!("Skipping deep scrape for {}", stub.external_id);
            result.skip.push(stub);
        } else {
            result.needs_deep_scrape.push(stub);
        }
    }

    result
}

fn is_complete(existing: &ExistingMetadata, policy: SkipPolicy) -> bool {
    match policy {
        SkipPolicy::Duration => existing.has_duration(),
        SkipPolicy::DurationAndActors => existing.has_duration() && existing.has_actors(),
    }
}

/// Reads the snapshot for a batch
///
/// A failed read yields an empty snapshot, so every stub gets deep-scraped
/// rather than silently skipped.
pub async fn load_snapshot(store: &dyn RecordStore, stubs: &[StubRecord]) -> MetadataSnapshot {
    let ids: Vec<String> = stubs.iter().map(|s| s.external_id.clone()).collect();
    if ids.is_empty() {
        return MetadataSnapshot::new();
    }

    match store.batch_get(&ids).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(
                "Could not read stored metadata for {} items, deep-scraping all: {}",
                ids.len(),
                e
            );
            MetadataSnapshot::new()
        }
    }
}
