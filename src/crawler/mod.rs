//! Crawler module for incremental catalog harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Pagination over each source's listing pages
//! - Challenge page detection and backoff
//! - The skip / deep-scrape decision against stored metadata
//! - A bounded pool of render handles for detail pages
//! - Categorization and upsert of each batch
//! - A liveness sweep over stored records

mod block;
mod coordinator;
mod decision;
mod liveness;
mod pacing;
mod pool;
mod summary;
mod sync;

pub use block::{BackoffPolicy, BlockDetector, ListingAction, PageVerdict};
pub use coordinator::{page_url, Coordinator};
pub use decision::{load_snapshot, partition, MetadataSnapshot, Partition};
pub use liveness::{check_links, LivenessReport};
pub use pacing::Pacer;
pub use pool::{DetailOutcome, PooledRenderer, RenderPool};
pub use summary::CrawlSummary;
pub use sync::{enrich, sync_records, SyncReport};

use crate::config::Config;
use crate::storage::RecordStore;
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete harvest
///
/// Builds render handles from the configuration, crawls every source, and
/// returns the run's counters.
pub async fn harvest(
    config: Config,
    config_hash: String,
    store: Arc<dyn RecordStore>,
) -> Result<CrawlSummary, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash, store)?;
    Ok(coordinator.run().await)
}
