//! Extraction of records from rendered documents
//!
//! This module turns documents into records:
//! - Listing pages into deduplicated [`StubRecord`]s
//! - Detail pages into [`DetailRecord`]s
//! - Thumbnail URLs into their high-resolution variants
//!
//! Site-specific selectors live behind [`ExtractionStrategy`], so a source with
//! a different layout gets its own strategy without touching the crawler.

mod cover;
mod detail;
mod listing;

pub use cover::upgrade_cover_url;
pub use detail::{extract_detail, parse_duration};
pub use listing::{detail_id, extract_stubs};

use crate::crawler::BlockDetector;
use crate::record::{DetailRecord, StubRecord};
use crate::render::Document;

/// Per-source extraction logic
pub trait ExtractionStrategy: Send + Sync {
    /// Extracts item stubs from a listing page
    fn extract_listing(&self, document: &Document) -> Vec<StubRecord>;

    /// Extracts metadata from a detail page
    ///
    /// Returns `None` when the document is a challenge page rather than content.
    fn extract_detail(&self, document: &Document) -> Option<DetailRecord>;
}

/// Strategy for catalogs laid out as a grid of linked thumbnail cards
#[derive(Debug, Clone)]
pub struct CardGridStrategy {
    detail_path_marker: Option<String>,
    min_title_length: usize,
    detector: BlockDetector,
}

impl CardGridStrategy {
    pub fn new(detail_path_marker: Option<String>, min_title_length: usize) -> Self {
        Self {
            detail_path_marker,
            min_title_length,
            detector: BlockDetector::default(),
        }
    }
}

impl ExtractionStrategy for CardGridStrategy {
    fn extract_listing(&self, document: &Document) -> Vec<StubRecord> {
        extract_stubs(
            document,
            self.detail_path_marker.as_deref(),
            self.min_title_length,
        )
    }

    fn extract_detail(&self, document: &Document) -> Option<DetailRecord> {
        if self.detector.classify(document).is_blocked() {
            return None;
        }
        Some(extract_detail(document))
    }
}
