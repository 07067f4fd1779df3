//! Per-run counters

use serde::Serialize;

/// Counters accumulated over one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Sources configured for the run
    pub sources: usize,
    /// Sources given up on after a challenge page
    pub sources_abandoned: usize,
    /// Listing pages that rendered usable content
    pub pages_visited: usize,
    /// Listing pages skipped after navigation errors
    pub page_failures: usize,
    /// Listing pages that came back as challenge pages
    pub blocked_pages: usize,
    pub stubs_seen: usize,
    pub skipped: usize,
    pub deep_scraped: usize,
    pub detail_failures: usize,
    pub detail_blocked: usize,
    pub upserted: usize,
    pub upsert_failures: usize,
}

impl CrawlSummary {
    /// Detail fetches that produced metadata
    pub fn details_fetched(&self) -> usize {
        self.deep_scraped
            .saturating_sub(self.detail_failures + self.detail_blocked)
    }

    /// True when nothing went wrong anywhere in the run
    pub fn is_clean(&self) -> bool {
        self.sources_abandoned == 0
            && self.page_failures == 0
            && self.blocked_pages == 0
            && self.detail_failures == 0
            && self.detail_blocked == 0
            && self.upsert_failures == 0
    }
}
