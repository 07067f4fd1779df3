//! Crawler coordinator - main harvest orchestration logic
//!
//! For each configured source the coordinator walks listing pages 1..N:
//! - navigates with randomized pacing and a per-navigation timeout
//! - checks the page against challenge signatures and backs off when blocked
//! - extracts stubs and stops the source at the first empty page
//! - splits the batch into skip / deep-scrape using stored metadata
//! - fetches detail pages through the bounded pool
//! - categorizes and upserts the batch
//!
//! Failures are contained where they happen: a detail fetch never aborts its
//! batch, a page never aborts its source, and a source never aborts the run.

use crate::categorize::Categorizer;
use crate::config::{Config, SourceSpec};
use crate::crawler::block::{BackoffPolicy, BlockDetector, ListingAction, PageVerdict};
use crate::crawler::decision::{load_snapshot, partition, Partition};
use crate::crawler::pool::{DetailOutcome, RenderPool};
use crate::crawler::sync::{enrich, sync_records};
use crate::crawler::{CrawlSummary, Pacer};
use crate::extract::{CardGridStrategy, ExtractionStrategy};
use crate::record::{CategorizedRecord, StubRecord};
use crate::render::{build_renderer, build_renderers, navigate_with_timeout, Document, Renderer};
use crate::storage::{RecordStore, RunRecord};
use crate::HarvestError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// What became of one listing page
enum ListingOutcome {
    Page(Document),
    /// Navigation failed; move on to the next page
    Skipped,
    /// Still blocked after backing off; stop this source
    Abandoned,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    store: Arc<dyn RecordStore>,
    listing: Box<dyn Renderer>,
    pool: RenderPool,
    categorizer: Categorizer,
    strategies: HashMap<String, Arc<dyn ExtractionStrategy>>,
    detector: BlockDetector,
    backoff: BackoffPolicy,
    pacer: Pacer,
}

impl Coordinator {
    /// Creates a coordinator with render handles built from the configuration
    ///
    /// One handle drives the listing pages; `detail-concurrency` more are
    /// pooled for detail pages.
    pub fn new(
        config: Config,
        config_hash: String,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, HarvestError> {
        let headless = config.crawler.headless;
        let listing = build_renderer(&config.render, headless)?;
        let details = build_renderers(
            &config.render,
            headless,
            config.crawler.detail_concurrency as usize,
        )?;
        Ok(Self::with_renderers(
            config,
            config_hash,
            store,
            listing,
            details,
        ))
    }

    /// Creates a coordinator around caller-supplied render handles
    pub fn with_renderers(
        config: Config,
        config_hash: String,
        store: Arc<dyn RecordStore>,
        listing: Box<dyn Renderer>,
        details: Vec<Box<dyn Renderer>>,
    ) -> Self {
        let categorizer = match &config.categories {
            Some(mapping) => Categorizer::new(mapping),
            None => Categorizer::builtin(),
        };

        let strategies = config
            .sources
            .iter()
            .map(|source| {
                let strategy: Arc<dyn ExtractionStrategy> = Arc::new(CardGridStrategy::new(
                    source.detail_path_marker.clone(),
                    config.crawler.min_title_length,
                ));
                (source.tag.clone(), strategy)
            })
            .collect();

        let backoff = BackoffPolicy::new(config.crawler.challenge_wait(), config.crawler.headless);
        let pacer = Pacer::from_config(&config.crawler);

        Self {
            config: Arc::new(config),
            config_hash,
            store,
            listing,
            pool: RenderPool::new(details),
            categorizer,
            strategies,
            detector: BlockDetector::default(),
            backoff,
            pacer,
        }
    }

    /// Replaces the extraction strategy used for the source tagged `tag`
    pub fn with_strategy(mut self, tag: &str, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.strategies.insert(tag.to_string(), strategy);
        self
    }

    /// Runs every source to completion and records the run
    pub async fn run(&self) -> CrawlSummary {
        let started_at = Utc::now();
        let mut summary = CrawlSummary {
            sources: self.config.sources.len(),
            ..CrawlSummary::default()
        };

        tracing::info!(
            "Starting harvest of {} sources (store: {}, detail pool: {})",
            self.config.sources.len(),
            self.store.name(),
            self.pool.size()
        );

        for source in &self.config.sources {
            self.crawl_source(source, &mut summary).await;
        }

        let run = RunRecord {
            started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
            summary: summary.clone(),
        };
        if let Err(e) = self.store.record_run(&run).await {
            tracing::warn!("Failed to record run: {}", e);
        }

        tracing::info!(
            "Harvest completed: {} pages, {} items seen, {} upserted in {}s",
            summary.pages_visited,
            summary.stubs_seen,
            summary.upserted,
            (run.finished_at - started_at).num_seconds()
        );

        summary
    }

    async fn crawl_source(&self, source: &SourceSpec, summary: &mut CrawlSummary) {
        let base = match Url::parse(&source.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Skipping source {}: invalid URL {}: {}", source.tag, source.url, e);
                summary.sources_abandoned += 1;
                return;
            }
        };
        let strategy: Arc<dyn ExtractionStrategy> = match self.strategies.get(&source.tag) {
            Some(strategy) => Arc::clone(strategy),
            None => Arc::new(CardGridStrategy::new(
                source.detail_path_marker.clone(),
                self.config.crawler.min_title_length,
            )),
        };

        tracing::info!("Crawling source {} ({})", source.tag, source.url);

        for page in 1..=self.config.crawler.max_pages {
            let url = page_url(&base, page);
            tracing::debug!("Visiting {} page {}: {}", source.tag, page, url);

            let document = match self.visit_listing(&url, summary).await {
                ListingOutcome::Page(document) => document,
                ListingOutcome::Skipped => continue,
                ListingOutcome::Abandoned => {
                    tracing::warn!("Abandoning source {} at page {}", source.tag, page);
                    summary.sources_abandoned += 1;
                    return;
                }
            };

            let stubs = strategy.extract_listing(&document);
            if stubs.is_empty() {
                tracing::info!("{} page {} is empty, end of catalog", source.tag, page);
                return;
            }

            tracing::info!("{} page {}: {} items", source.tag, page, stubs.len());
            summary.stubs_seen += stubs.len();
            self.process_batch(stubs, &source.tag, strategy.as_ref(), summary)
                .await;
        }

        tracing::info!(
            "{} reached the page limit ({})",
            source.tag,
            self.config.crawler.max_pages
        );
    }

    /// Navigates to a listing page, handling timeouts and challenge pages
    ///
    /// A timeout is retried once. A challenge page is waited out and then
    /// either retried or the source is abandoned, per the backoff policy.
    async fn visit_listing(&self, url: &Url, summary: &mut CrawlSummary) -> ListingOutcome {
        let timeout = self.config.crawler.navigation_timeout();
        let mut timeouts = 0;
        let mut block_retries = 0;

        loop {
            self.pacer.pause().await;

            let document = match navigate_with_timeout(self.listing.as_ref(), url, timeout).await {
                Ok(document) => document,
                Err(e) if e.is_timeout() && timeouts == 0 => {
                    timeouts += 1;
                    tracing::warn!("{}, retrying once", e);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping listing page: {}", e);
                    summary.page_failures += 1;
                    return ListingOutcome::Skipped;
                }
            };

            match self.detector.classify(&document) {
                PageVerdict::Usable => {
                    summary.pages_visited += 1;
                    return ListingOutcome::Page(document);
                }
                PageVerdict::Blocked { signature } => {
                    summary.blocked_pages += 1;
                    tracing::warn!("Challenge page at {} ({})", url, signature);

                    let action = self.backoff.on_listing_block(block_retries);
                    self.backoff.wait(self.listing.as_ref()).await;
                    match action {
                        ListingAction::Retry => block_retries += 1,
                        ListingAction::AbandonSource => return ListingOutcome::Abandoned,
                    }
                }
            }
        }
    }

    /// Decide, fetch, categorize and sync one listing page's stubs
    async fn process_batch(
        &self,
        stubs: Vec<StubRecord>,
        source_tag: &str,
        strategy: &dyn ExtractionStrategy,
        summary: &mut CrawlSummary,
    ) {
        let snapshot = load_snapshot(self.store.as_ref(), &stubs).await;
        let Partition {
            skip,
            needs_deep_scrape,
        } = partition(stubs, &snapshot, self.config.crawler.skip_policy);

        tracing::info!(
            "{} new or incomplete, {} already complete",
            needs_deep_scrape.len(),
            skip.len()
        );
        summary.skipped += skip.len();
        summary.deep_scraped += needs_deep_scrape.len();

        let outcomes = self
            .pool
            .fetch_details(
                &needs_deep_scrape,
                strategy,
                self.config.crawler.navigation_timeout(),
                &self.pacer,
            )
            .await;

        let mut records: Vec<CategorizedRecord> = skip
            .into_iter()
            .map(|stub| CategorizedRecord::listing_only(stub, source_tag))
            .collect();

        for (stub, outcome) in needs_deep_scrape.into_iter().zip(outcomes) {
            let record = match outcome {
                DetailOutcome::Fetched(detail) => {
                    enrich(stub, detail, &self.categorizer, source_tag)
                }
                // No metadata this pass; the stored row keeps whatever it had
                // and the item is picked up again next pass
                DetailOutcome::Blocked => {
                    summary.detail_blocked += 1;
                    CategorizedRecord::listing_only(stub, source_tag)
                }
                DetailOutcome::Failed(_) => {
                    summary.detail_failures += 1;
                    CategorizedRecord::listing_only(stub, source_tag)
                }
            };
            records.push(record);
        }

        let report = sync_records(self.store.as_ref(), records).await;
        summary.upserted += report.upserted;
        summary.upsert_failures += report.failed;
    }
}

/// Builds the URL of listing page `page`, replacing any existing `page` param
pub fn page_url(base: &Url, page: u32) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());
    url
}
