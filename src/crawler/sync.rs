//! Merging enrichment into records and handing them to the store

use crate::categorize::Categorizer;
use crate::record::{CategorizedRecord, DetailRecord, StubRecord};
use crate::storage::RecordStore;

/// Outcome of syncing one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub upserted: usize,
    pub failed: usize,
}

/// Builds the persisted record for a freshly scraped item
pub fn enrich(
    stub: StubRecord,
    detail: DetailRecord,
    categorizer: &Categorizer,
    source_tag: &str,
) -> CategorizedRecord {
    let categories = categorizer.categorize(&stub.title, &detail.tag_list());
    CategorizedRecord::enriched(stub, detail, categories, source_tag)
}

/// Upserts every record, one at a time
///
/// A failed upsert is logged and counted; the rest of the batch still goes
/// through. The next pass re-upserts anything that was lost.
pub async fn sync_records(store: &dyn RecordStore, records: Vec<CategorizedRecord>) -> SyncReport {
    let mut report = SyncReport::default();

    for record in records {
        let external_id = record.external_id().to_string();
        match store.upsert(record).await {
            Ok(()) => report.upserted += 1,
            Err(e) => {
                tracing::warn!("Upsert failed for {}: {}", external_id, e);
                report.failed += 1;
            }
        }
    }

    report
}
