//! Integration tests for the harvester
//!
//! These tests use wiremock to serve listing and detail pages and run the
//! full harvest cycle end-to-end against an in-memory SQLite store.

use async_trait::async_trait;
use catalog_harvest::config::{
    Config, CrawlerConfig, RenderConfig, SkipPolicy, SourceSpec, StorageConfig,
};
use catalog_harvest::crawler::Coordinator;
use catalog_harvest::render::{Document, RenderError, Renderer};
use catalog_harvest::storage::{RecordStore, SqliteStore};
use catalog_harvest::{CategorizedRecord, DetailRecord, StubRecord};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with one source and no pacing delays
fn create_test_config(base_url: &str, max_pages: u32, concurrency: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_pages,
            detail_concurrency: concurrency,
            min_delay_ms: 0,
            max_delay_ms: 0,
            navigation_timeout_secs: 5,
            challenge_wait_secs: 0,
            ..CrawlerConfig::default()
        },
        render: RenderConfig::default(),
        storage: StorageConfig::default(),
        sources: vec![SourceSpec {
            url: format!("{}/new", base_url),
            tag: "new".to_string(),
            detail_path_marker: None,
        }],
        categories: None,
    }
}

fn listing_page(items: &[(&str, &str)]) -> String {
    let cards: String = items
        .iter()
        .map(|(id, title)| {
            format!(
                r#"<div class="group">
                    <a href="/v/{id}"><img src="https://cdn.example.com/{id}/cover-t.jpg" alt="{title}"></a>
                    <div class="text-secondary">{title}</div>
                </div>"#
            )
        })
        .collect();
    format!(
        "<html><head><title>New releases</title></head><body><div class=\"grid\">{}</div></body></html>",
        cards
    )
}

fn detail_page(duration: Option<&str>, actors: &[&str], tags: &[&str]) -> String {
    let mut rows = String::new();
    if let Some(duration) = duration {
        rows.push_str(&format!("<div><span>Duration:</span> <span>{}</span></div>", duration));
    }
    if !actors.is_empty() {
        let links: Vec<String> = actors
            .iter()
            .map(|a| format!("<a href=\"/a/{a}\">{a}</a>"))
            .collect();
        rows.push_str(&format!("<div><span>Actors:</span> {}</div>", links.join(" ")));
    }
    if !tags.is_empty() {
        let links: Vec<String> = tags
            .iter()
            .map(|t| format!("<a href=\"/g/{t}\">{t}</a>"))
            .collect();
        rows.push_str(&format!("<div><span>Tags:</span> {}</div>", links.join(" ")));
    }
    format!(
        "<html><head><title>Item</title></head><body><div class=\"space-y-2\">{}</div></body></html>",
        rows
    )
}

async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/new"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/v/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_single_source() {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        1,
        listing_page(&[("abc-001", "女教师教室"), ("abc-002", "OL Office Drama")]),
    )
    .await;
    mount_listing(&server, 2, listing_page(&[("abc-003", "Quiet afternoon")])).await;
    mount_listing(&server, 3, listing_page(&[])).await;

    mount_detail(
        &server,
        "abc-001",
        detail_page(Some("02:10:00"), &["Alice"], &["剧情"]),
    )
    .await;
    mount_detail(
        &server,
        "abc-002",
        detail_page(Some("95 min"), &["Bea", "Carol"], &[]),
    )
    .await;
    mount_detail(&server, "abc-003", detail_page(None, &[], &[])).await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let config = create_test_config(&server.uri(), 10, 2);
    let coordinator = Coordinator::new(config, "hash".to_string(), store.clone()).unwrap();

    let summary = coordinator.run().await;

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.stubs_seen, 3);
    assert_eq!(summary.deep_scraped, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.upserted, 3);
    assert!(summary.is_clean());

    let first = store.get_record("abc-001").unwrap().unwrap();
    assert_eq!(first.duration.as_deref(), Some("02:10:00"));
    assert_eq!(first.actors, Some(vec!["Alice".to_string()]));
    assert_eq!(first.source_tag, "new");
    assert_eq!(
        first.cover_url,
        "https://cdn.example.com/abc-001/cover-n.jpg"
    );
    let categories = first.categories.unwrap();
    assert!(categories.contains(&"School".to_string()));
    assert!(categories.contains(&"Story".to_string()));
    assert!(first.is_active);

    let second = store.get_record("abc-002").unwrap().unwrap();
    assert_eq!(second.duration.as_deref(), Some("95 min"));
    assert!(second
        .categories
        .unwrap()
        .contains(&"Office".to_string()));

    // Nothing found on the detail page: persisted with the sentinel
    let third = store.get_record("abc-003").unwrap().unwrap();
    assert_eq!(third.duration.as_deref(), Some("Unknown"));

    assert_eq!(store.count_runs().unwrap(), 1);
}

#[tokio::test]
async fn test_pagination_stops_at_first_empty_page() {
    let server = MockServer::start().await;

    for page in 1..=4 {
        let id = format!("item-{}", page);
        mount_listing(&server, page, listing_page(&[(id.as_str(), "Some long title")])).await;
        mount_detail(&server, &id, detail_page(Some("10:00"), &[], &[])).await;
    }
    mount_listing(&server, 5, listing_page(&[])).await;

    // Page 6 must never be requested
    Mock::given(method("GET"))
        .and(path("/new"))
        .and(query_param("page", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let config = create_test_config(&server.uri(), 30, 2);
    let summary = Coordinator::new(config, "hash".to_string(), store.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.pages_visited, 5);
    assert_eq!(summary.upserted, 4);
    assert_eq!(store.count().unwrap(), 4);
}

#[tokio::test]
async fn test_second_pass_skips_complete_items() {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        1,
        listing_page(&[("done-1", "Complete item"), ("todo-1", "Incomplete item")]),
    )
    .await;
    mount_listing(&server, 2, listing_page(&[])).await;

    // One detail fetch on the first pass, none on the second
    Mock::given(method("GET"))
        .and(path("/v/done-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page(Some("12:00"), &["Alice"], &[])),
        )
        .expect(1)
        .mount(&server)
        .await;
    // No duration anywhere, so it stays incomplete and is fetched both times
    Mock::given(method("GET"))
        .and(path("/v/todo-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(None, &[], &[])))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());

    let first = Coordinator::new(
        create_test_config(&server.uri(), 5, 2),
        "hash".to_string(),
        store.clone(),
    )
    .unwrap()
    .run()
    .await;
    assert_eq!(first.deep_scraped, 2);
    assert_eq!(first.skipped, 0);

    let second = Coordinator::new(
        create_test_config(&server.uri(), 5, 2),
        "hash".to_string(),
        store.clone(),
    )
    .unwrap()
    .run()
    .await;
    assert_eq!(second.deep_scraped, 1);
    assert_eq!(second.skipped, 1);

    // Skipped items keep their stored metadata
    let done = store.get_record("done-1").unwrap().unwrap();
    assert_eq!(done.duration.as_deref(), Some("12:00"));
    assert_eq!(done.actors, Some(vec!["Alice".to_string()]));

    // Re-running does not duplicate records
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(store.count_runs().unwrap(), 2);
}

#[tokio::test]
async fn test_duplicate_cards_yield_one_record() {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        1,
        listing_page(&[("dup-1", "First rendition"), ("dup-1", "Second rendition")]),
    )
    .await;
    mount_listing(&server, 2, listing_page(&[])).await;
    mount_detail(&server, "dup-1", detail_page(Some("30:00"), &[], &[])).await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let summary = Coordinator::new(
        create_test_config(&server.uri(), 5, 2),
        "hash".to_string(),
        store.clone(),
    )
    .unwrap()
    .run()
    .await;

    assert_eq!(summary.stubs_seen, 1);
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_blocked_detail_page_only_loses_that_item() {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        1,
        listing_page(&[("ok-1", "Reachable item"), ("wall-1", "Walled item")]),
    )
    .await;
    mount_listing(&server, 2, listing_page(&[])).await;
    mount_detail(&server, "ok-1", detail_page(Some("20:00"), &[], &[])).await;
    Mock::given(method("GET"))
        .and(path("/v/wall-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string(
            "<html><head><title>Just a moment...</title></head><body>Duration: 99:99</body></html>",
        ))
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let summary = Coordinator::new(
        create_test_config(&server.uri(), 5, 2),
        "hash".to_string(),
        store.clone(),
    )
    .unwrap()
    .run()
    .await;

    assert_eq!(summary.detail_blocked, 1);
    assert_eq!(summary.upserted, 2);

    let ok = store.get_record("ok-1").unwrap().unwrap();
    assert_eq!(ok.duration.as_deref(), Some("20:00"));

    // Kept as a listing-only row so the next pass picks it up again
    let walled = store.get_record("wall-1").unwrap().unwrap();
    assert_eq!(walled.duration, None);
    assert!(walled.is_active);
}

#[tokio::test]
async fn test_bare_rate_limited_detail_keeps_stored_metadata() {
    let server = MockServer::start().await;

    mount_listing(&server, 1, listing_page(&[("abc-1", "Rate limited item")])).await;
    mount_listing(&server, 2, listing_page(&[])).await;
    Mock::given(method("GET"))
        .and(path("/v/abc-1"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let stub = StubRecord {
        external_id: "abc-1".to_string(),
        title: "Rate limited item".to_string(),
        cover_url: format!("{}/abc-1/cover-n.jpg", server.uri()),
        source_url: format!("{}/v/abc-1", server.uri()),
    };
    let detail = DetailRecord {
        duration: Some("12:00".to_string()),
        release_date: Some("2024-01-01".to_string()),
        actors: None,
        tags: Some(BTreeSet::from(["Drama".to_string()])),
    };
    store
        .upsert(CategorizedRecord::enriched(
            stub,
            detail,
            BTreeSet::from(["Story".to_string()]),
            "new",
        ))
        .await
        .unwrap();

    // No actors stored, so the stricter rule sends the item to its detail page
    let mut config = create_test_config(&server.uri(), 5, 1);
    config.crawler.skip_policy = SkipPolicy::DurationAndActors;
    let summary = Coordinator::new(config, "hash".to_string(), store.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.deep_scraped, 1);
    assert_eq!(summary.detail_blocked, 1);
    assert_eq!(summary.detail_failures, 0);

    let record = store.get_record("abc-1").unwrap().unwrap();
    assert_eq!(record.duration.as_deref(), Some("12:00"));
    assert_eq!(record.release_date.as_deref(), Some("2024-01-01"));
    assert_eq!(record.tags, Some(vec!["Drama".to_string()]));
}

#[tokio::test]
async fn test_challenge_listing_abandons_source_in_headless_mode() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            "<html><head><title>Attention Required! | Cloudflare</title></head><body></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let summary = Coordinator::new(
        create_test_config(&server.uri(), 5, 2),
        "hash".to_string(),
        store.clone(),
    )
    .unwrap()
    .run()
    .await;

    assert_eq!(summary.blocked_pages, 1);
    assert_eq!(summary.sources_abandoned, 1);
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_source_does_not_abort_run() {
    let server = MockServer::start().await;

    // The first source 500s on every page; the second works
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_listing(&server, 1, listing_page(&[("fine-1", "Working source item")])).await;
    mount_listing(&server, 2, listing_page(&[])).await;
    mount_detail(&server, "fine-1", detail_page(Some("15:00"), &[], &[])).await;

    let mut config = create_test_config(&server.uri(), 2, 2);
    config.sources.insert(
        0,
        SourceSpec {
            url: format!("{}/broken", server.uri()),
            tag: "broken".to_string(),
            detail_path_marker: None,
        },
    );

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let summary = Coordinator::new(config, "hash".to_string(), store.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.page_failures, 2);
    assert_eq!(summary.upserted, 1);
    assert!(store.get_record("fine-1").unwrap().is_some());
}

/// Counts how many detail navigations are in flight across all handles
#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

struct GaugedRenderer {
    gauge: Arc<Gauge>,
    busy: AtomicBool,
}

#[async_trait]
impl Renderer for GaugedRenderer {
    async fn navigate(&self, url: &Url, _timeout: Duration) -> Result<Document, RenderError> {
        assert!(!self.busy.swap(true, Ordering::SeqCst));
        self.gauge.started.fetch_add(1, Ordering::SeqCst);
        let now = self.gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;

        self.gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);

        let id = url.path().trim_start_matches("/v/");
        if id.starts_with("fail") {
            return Err(RenderError::Timeout {
                url: url.to_string(),
            });
        }
        Ok(Document::new(
            url.clone(),
            200,
            detail_page(Some("45:00"), &["Dana"], &[]),
        ))
    }

    fn name(&self) -> &'static str {
        "gauged"
    }
}

/// Serves one listing page of ten items, then an empty page
struct TwoPageListing {
    calls: AtomicUsize,
}

#[async_trait]
impl Renderer for TwoPageListing {
    async fn navigate(&self, url: &Url, _timeout: Duration) -> Result<Document, RenderError> {
        let html = if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            let ids: Vec<String> = (0..10)
                .map(|i| {
                    if i % 3 == 0 && i > 0 {
                        format!("fail-{}", i)
                    } else {
                        format!("item-{}", i)
                    }
                })
                .collect();
            let items: Vec<(&str, &str)> =
                ids.iter().map(|id| (id.as_str(), "Pooled item title")).collect();
            listing_page(&items)
        } else {
            listing_page(&[])
        };
        Ok(Document::new(url.clone(), 200, html))
    }

    fn name(&self) -> &'static str {
        "listing"
    }
}

#[tokio::test]
async fn test_detail_pool_bounds_concurrency() {
    let gauge = Arc::new(Gauge::default());
    let details: Vec<Box<dyn Renderer>> = (0..2)
        .map(|_| {
            Box::new(GaugedRenderer {
                gauge: Arc::clone(&gauge),
                busy: AtomicBool::new(false),
            }) as Box<dyn Renderer>
        })
        .collect();

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let coordinator = Coordinator::with_renderers(
        create_test_config("https://catalog.example.com", 5, 2),
        "hash".to_string(),
        store.clone(),
        Box::new(TwoPageListing {
            calls: AtomicUsize::new(0),
        }),
        details,
    );

    let summary = coordinator.run().await;

    assert_eq!(gauge.started.load(Ordering::SeqCst), 10);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(summary.deep_scraped, 10);
    assert_eq!(summary.detail_failures, 3);
    // Failed fetches still land as listing-only rows
    assert_eq!(summary.upserted, 10);
    assert_eq!(store.count().unwrap(), 10);

    let fetched = store.get_record("item-1").unwrap().unwrap();
    assert_eq!(fetched.duration.as_deref(), Some("45:00"));
    let failed = store.get_record("fail-3").unwrap().unwrap();
    assert_eq!(failed.duration, None);
}
