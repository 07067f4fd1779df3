//! Listing page extraction
//!
//! Item cards are recognised as an `<img>` nested in an `<a href>` that points
//! at a detail page. Cards are keyed by the trailing path segment of that link,
//! so the same item appearing twice on a page yields one stub.

use crate::extract::cover::upgrade_cover_url;
use crate::record::StubRecord;
use crate::render::{collapse_whitespace, Document};
use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use url::Url;

/// Rendered images at or below these sizes are icons, not covers
const MIN_COVER_WIDTH: u32 = 100;
const MIN_COVER_HEIGHT: u32 = 60;

/// Extracts deduplicated stubs from a listing page
///
/// # Arguments
///
/// * `document` - The rendered listing page
/// * `detail_path_marker` - Path fragment every detail URL must contain, if any
/// * `min_title_length` - Titles shorter than this many characters are dropped
///
/// # Returns
///
/// One stub per distinct external ID, in first-seen order. When a card repeats,
/// the last occurrence's fields win.
pub fn extract_stubs(
    document: &Document,
    detail_path_marker: Option<&str>,
    min_title_length: usize,
) -> Vec<StubRecord> {
    let html = document.parse();
    let Ok(img_selector) = Selector::parse("img") else {
        return Vec::new();
    };

    let mut order: Vec<String> = Vec::new();
    let mut stubs: HashMap<String, StubRecord> = HashMap::new();

    for img in html.select(&img_selector) {
        if is_icon_sized(img) {
            continue;
        }

        let Some(link) = closest_link(img) else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(detail_url) = resolve_detail_url(href, document.url()) else {
            continue;
        };
        let Some(external_id) = detail_id(&detail_url, detail_path_marker) else {
            continue;
        };

        let Some(title) = resolve_title(img, link, min_title_length) else {
            tracing::trace!("Dropping card {} without a usable title", external_id);
            continue;
        };

        let cover_url = cover_source(img)
            .and_then(|src| document.url().join(src).ok())
            .map(|url| upgrade_cover_url(url.as_str()))
            .unwrap_or_default();

        let stub = StubRecord {
            external_id: external_id.clone(),
            title,
            cover_url,
            source_url: detail_url.to_string(),
        };

        if stubs.insert(external_id.clone(), stub).is_none() {
            order.push(external_id);
        }
    }

    order
        .into_iter()
        .filter_map(|id| stubs.remove(&id))
        .collect()
}

/// Derives the external ID of a detail URL
///
/// The ID is the last non-empty path segment. Returns `None` when the URL has
/// no such segment or lacks the configured path marker.
pub fn detail_id(url: &Url, detail_path_marker: Option<&str>) -> Option<String> {
    if let Some(marker) = detail_path_marker {
        if !url.path().contains(marker) {
            return None;
        }
    }

    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}

/// Resolves a card link to a canonical detail URL on the listing's host
fn resolve_detail_url(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let mut url = page_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    if url.host_str() != page_url.host_str() {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);

    // Links back to the listing itself (e.g. pagination) are not items
    if url.path().trim_end_matches('/') == page_url.path().trim_end_matches('/') {
        return None;
    }

    Some(url)
}

/// Nearest enclosing `<a href>` of an element
fn closest_link(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a" && e.value().attr("href").is_some())
}

/// True when the image declares a size too small to be a cover
fn is_icon_sized(img: ElementRef<'_>) -> bool {
    let dimension = |name: &str| {
        img.value()
            .attr(name)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<u32>().ok())
    };

    matches!(dimension("width"), Some(w) if w <= MIN_COVER_WIDTH)
        || matches!(dimension("height"), Some(h) if h <= MIN_COVER_HEIGHT)
}

/// Lazy-loaded images keep the real source in `data-src`
fn cover_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    img.value()
        .attr("data-src")
        .or_else(|| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty() && !src.starts_with("data:"))
}

/// Title from the image alt text, falling back to the card's caption
fn resolve_title(
    img: ElementRef<'_>,
    link: ElementRef<'_>,
    min_title_length: usize,
) -> Option<String> {
    let long_enough = |title: &String| title.chars().count() >= min_title_length;

    let alt = img
        .value()
        .attr("alt")
        .map(collapse_whitespace)
        .filter(long_enough);
    if alt.is_some() {
        return alt;
    }

    card_caption(link).filter(long_enough)
}

/// Caption text of the card that contains `link`
///
/// The card is the nearest ancestor with a `group` class, or the link's
/// grandparent when no such ancestor exists.
fn card_caption(link: ElementRef<'_>) -> Option<String> {
    let card = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().classes().any(|c| c == "group"))
        .or_else(|| {
            link.parent()
                .and_then(|p| p.parent())
                .and_then(ElementRef::wrap)
        })?;

    for selector in [".text-secondary", "h1, h2, h3, h4, div.my-2"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let caption = card
            .select(&selector)
            .map(|e| collapse_whitespace(&e.text().collect::<Vec<_>>().join(" ")))
            .find(|text| !text.is_empty());
        if caption.is_some() {
            return caption;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(body: &str) -> Document {
        Document::new(
            Url::parse("https://catalog.example.com/new?page=1").unwrap(),
            200,
            format!("<html><body>{}</body></html>", body),
        )
    }

    #[test]
    fn test_extract_single_card() {
        let page = listing(
            r#"<div class="group">
                <a href="/v/abc-123"><img src="https://cdn.example.com/abc-123/cover-t.jpg" alt="A long enough title"></a>
            </div>"#,
        );
        let stubs = extract_stubs(&page, None, 3);

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].external_id, "abc-123");
        assert_eq!(stubs[0].title, "A long enough title");
        assert_eq!(
            stubs[0].cover_url,
            "https://cdn.example.com/abc-123/cover-n.jpg"
        );
        assert_eq!(
            stubs[0].source_url,
            "https://catalog.example.com/v/abc-123"
        );
    }

    #[test]
    fn test_duplicate_cards_dedup() {
        let page = listing(
            r#"
            <a href="/v/abc-123"><img src="/a.jpg" alt="First rendition"></a>
            <a href="/v/abc-123/"><img src="/b.jpg" alt="Second rendition"></a>
            <a href="/v/def-456"><img src="/c.jpg" alt="Another item"></a>
            "#,
        );
        let stubs = extract_stubs(&page, None, 3);

        assert_eq!(stubs.len(), 2);
        let first = stubs.iter().find(|s| s.external_id == "abc-123").unwrap();
        assert_eq!(first.title, "Second rendition");
        assert_eq!(stubs[0].external_id, "abc-123");
        assert_eq!(stubs[1].external_id, "def-456");
    }

    #[test]
    fn test_title_falls_back_to_card_caption() {
        let page = listing(
            r#"<div class="group">
                <div><a href="/v/abc-123"><img src="/a.jpg" alt=""></a></div>
                <div class="text-secondary">  Caption   title </div>
            </div>"#,
        );
        let stubs = extract_stubs(&page, None, 3);

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title, "Caption title");
    }

    #[test]
    fn test_title_falls_back_to_heading_in_grandparent() {
        let page = listing(
            r#"<section>
                <div><a href="/v/abc-123"><img src="/a.jpg" alt="x"></a></div>
                <h3>Heading title</h3>
            </section>"#,
        );
        let stubs = extract_stubs(&page, None, 3);

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title, "Heading title");
    }

    #[test]
    fn test_short_titles_rejected() {
        let page = listing(r#"<a href="/v/abc-123"><img src="/a.jpg" alt="ab"></a>"#);
        assert!(extract_stubs(&page, None, 3).is_empty());
    }

    #[test]
    fn test_icons_and_foreign_links_ignored() {
        let page = listing(
            r#"
            <a href="/v/abc-123"><img src="/logo.png" width="32" height="32" alt="Site logo"></a>
            <a href="https://ads.example.net/v/zzz"><img src="/ad.jpg" alt="Advertisement"></a>
            <a href="/new?page=2"><img src="/next.jpg" alt="Next page"></a>
            <a href="javascript:void(0)"><img src="/x.jpg" alt="Script link"></a>
            "#,
        );
        assert!(extract_stubs(&page, None, 3).is_empty());
    }

    #[test]
    fn test_path_marker_filters_links() {
        let page = listing(
            r#"
            <a href="/v/abc-123"><img src="/a.jpg" alt="Item on detail path"></a>
            <a href="/actors/someone"><img src="/b.jpg" alt="Profile picture"></a>
            "#,
        );
        let stubs = extract_stubs(&page, Some("/v/"), 3);

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].external_id, "abc-123");
    }

    #[test]
    fn test_lazy_loaded_cover() {
        let page = listing(
            r#"<a href="/v/abc-123"><img src="data:image/gif;base64,R0lGOD" data-src="/abc-123/cover-t.jpg" alt="Lazy cover"></a>"#,
        );
        let stubs = extract_stubs(&page, None, 3);
        assert_eq!(
            stubs[0].cover_url,
            "https://catalog.example.com/abc-123/cover-n.jpg"
        );
    }

    #[test]
    fn test_detail_id() {
        let url = Url::parse("https://example.com/cn/v/abc-123/").unwrap();
        assert_eq!(detail_id(&url, None).as_deref(), Some("abc-123"));
        assert_eq!(detail_id(&url, Some("/v/")).as_deref(), Some("abc-123"));
        assert_eq!(detail_id(&url, Some("/movie/")), None);

        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(detail_id(&root, None), None);
    }

    #[test]
    fn test_empty_page() {
        let page = listing("<p>No results</p>");
        assert!(extract_stubs(&page, None, 3).is_empty());
    }
}
