//! Record shapes that flow from listing pages to the store
//!
//! A [`StubRecord`] is built fresh from every listing page, a [`DetailRecord`]
//! comes from a detail page when one is fetched, and a [`CategorizedRecord`]
//! is the merged value handed to the store by value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel persisted when a field could not be extracted
pub const UNKNOWN: &str = "Unknown";

/// Minimal identity of a catalog item, as seen on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubRecord {
    /// Trailing path segment of the canonical detail URL
    pub external_id: String,
    pub title: String,
    pub cover_url: String,
    pub source_url: String,
}

/// Metadata scraped from a detail page
///
/// `None` means the field could not be found. `Some` of an empty set means
/// the field was present but listed nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub duration: Option<String>,
    pub release_date: Option<String>,
    pub actors: Option<BTreeSet<String>>,
    pub tags: Option<BTreeSet<String>>,
}

impl DetailRecord {
    /// Returns true when no strategy produced any field
    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.release_date.is_none()
            && self.actors.is_none()
            && self.tags.is_none()
    }

    /// Tags as a flat list, empty when unknown
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_ref()
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Enrichment computed during this pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub detail: DetailRecord,
    pub categories: BTreeSet<String>,
}

/// Final persisted shape of an item
///
/// `enrichment` is `None` for items whose stored metadata was already complete;
/// the store then refreshes only the listing fields and leaves the detail
/// columns untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedRecord {
    pub stub: StubRecord,
    pub enrichment: Option<Enrichment>,
    pub source_tag: String,
    pub is_active: bool,
}

impl CategorizedRecord {
    /// Record for an item that was not deep-scraped this pass
    pub fn listing_only(stub: StubRecord, source_tag: &str) -> Self {
        Self {
            stub,
            enrichment: None,
            source_tag: source_tag.to_string(),
            is_active: true,
        }
    }

    /// Record carrying freshly scraped metadata and categories
    pub fn enriched(
        stub: StubRecord,
        detail: DetailRecord,
        categories: BTreeSet<String>,
        source_tag: &str,
    ) -> Self {
        Self {
            stub,
            enrichment: Some(Enrichment { detail, categories }),
            source_tag: source_tag.to_string(),
            is_active: true,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.stub.external_id
    }

    /// Duration as persisted, with the sentinel standing in for a miss
    pub fn persisted_duration(&self) -> Option<String> {
        self.enrichment.as_ref().map(|e| {
            e.detail
                .duration
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string())
        })
    }
}

/// Stored metadata for an item, as read back before the skip decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExistingMetadata {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub actors: Option<Vec<String>>,
}

impl ExistingMetadata {
    /// True when a real duration is stored (not empty, not the sentinel)
    pub fn has_duration(&self) -> bool {
        self.duration
            .as_deref()
            .map(str::trim)
            .is_some_and(|d| !d.is_empty() && !d.eq_ignore_ascii_case(UNKNOWN))
    }

    /// True when at least one actor is stored
    pub fn has_actors(&self) -> bool {
        self.actors
            .as_ref()
            .is_some_and(|actors| actors.iter().any(|a| !a.trim().is_empty()))
    }
}
