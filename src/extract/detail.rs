//! Detail page metadata extraction
//!
//! Extraction is layered:
//! 1. Labeled rows ("Duration: ...", "時長: ...") matched against label variants
//! 2. A regex over the visible text, for the duration only
//! 3. Fields nothing matched stay `None`

use crate::record::DetailRecord;
use crate::render::{collapse_whitespace, Document};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;

const DURATION_LABELS: &[&str] = &[
    "时长", "時長", "长度", "長度", "片长", "片長", "收録時間", "再生時間", "Duration", "Runtime",
    "Length",
];

const RELEASE_LABELS: &[&str] = &[
    "发行日期", "發行日期", "发布日期", "發佈日期", "上映日期", "配信開始日", "発売日",
    "Release Date", "Released", "Release",
];

const ACTOR_LABELS: &[&str] = &[
    "女优", "女優", "演员", "演員", "出演者", "出演", "Actresses", "Actress", "Actors", "Actor",
    "Cast", "Starring",
];

const TAG_LABELS: &[&str] = &[
    "类型", "類型", "标签", "標籤", "ジャンル", "Genres", "Genre", "Tags", "Tag",
];

/// Rows longer than this are containers, not label/value pairs
const MAX_ROW_CHARS: usize = 300;

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}:\d{2}(?::\d{2})?)\b").expect("valid clock regex"));

static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3})\s*(?:分钟|分鐘|分|minutes|mins|min)").expect("valid minutes regex")
});

static RAW_CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}:\d{2}:\d{2})\b").expect("valid raw clock regex"));

static RAW_MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{2,3})\s*(?:分钟|分鐘|minutes|mins)").expect("valid raw minutes regex")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-/.年](\d{1,2})[-/.月](\d{1,2})").expect("valid date regex"));

/// Extracts a [`DetailRecord`] from a detail page
///
/// Callers are expected to have ruled out challenge pages; on any other page
/// a miss simply leaves the corresponding field `None`.
pub fn extract_detail(document: &Document) -> DetailRecord {
    let html = document.parse();

    let duration = labeled_row(&html, DURATION_LABELS)
        .and_then(|row| parse_duration(&row.value))
        .or_else(|| raw_text_duration(&document.body_text()));

    let release_date = labeled_row(&html, RELEASE_LABELS).and_then(|row| parse_date(&row.value));

    let actors = labeled_row(&html, ACTOR_LABELS).map(|row| row.items);
    let tags = labeled_row(&html, TAG_LABELS).map(|row| row.items);

    DetailRecord {
        duration,
        release_date,
        actors,
        tags,
    }
}

/// Normalizes a duration value
///
/// Clock values (`1:58:00`, `12:00`) are kept as written; minute counts
/// (`120分钟`, `95 min`) become `"<n> min"`.
pub fn parse_duration(value: &str) -> Option<String> {
    if let Some(caps) = CLOCK_RE.captures(value) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = MINUTES_RE.captures(value) {
        return Some(format!("{} min", &caps[1]));
    }
    None
}

/// Duration found anywhere in the visible text
fn raw_text_duration(text: &str) -> Option<String> {
    if let Some(caps) = RAW_CLOCK_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    RAW_MINUTES_RE
        .captures(text)
        .map(|caps| format!("{} min", &caps[1]))
}

/// Normalizes a date value to `YYYY-MM-DD`
fn parse_date(value: &str) -> Option<String> {
    let caps = DATE_RE.captures(value)?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(caps[1].parse().ok()?, month, day)
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// A matched label/value row
struct LabeledRow {
    value: String,
    items: BTreeSet<String>,
}

/// Finds the tightest element whose text starts with one of `labels`
///
/// Rows whose value is non-empty are preferred; a label with nothing after it
/// still counts as present with an empty item set.
fn labeled_row(html: &Html, labels: &[&str]) -> Option<LabeledRow> {
    let mut best: Option<(usize, ElementRef<'_>, String)> = None;
    let mut empty_match = false;

    for element in html.root_element().descendants().filter_map(ElementRef::wrap) {
        if matches!(element.value().name(), "script" | "style" | "head" | "title") {
            continue;
        }

        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        let length = text.chars().count();
        if length == 0 || length > MAX_ROW_CHARS {
            continue;
        }

        let Some(value) = strip_label(&text, labels) else {
            continue;
        };

        if value.is_empty() {
            empty_match = true;
            continue;
        }

        if best.as_ref().map_or(true, |(len, _, _)| length < *len) {
            best = Some((length, element, value.to_string()));
        }
    }

    match best {
        Some((_, element, value)) => {
            let items = row_items(element, &value);
            Some(LabeledRow { value, items })
        }
        None if empty_match => Some(LabeledRow {
            value: String::new(),
            items: BTreeSet::new(),
        }),
        None => None,
    }
}

/// Returns the text after a leading label and its separator
fn strip_label<'t>(text: &'t str, labels: &[&str]) -> Option<&'t str> {
    for label in labels {
        let Some(head) = text.get(..label.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(label) {
            continue;
        }

        let rest = &text[label.len()..];
        let trimmed = rest.trim_start();
        if let Some(value) = trimmed
            .strip_prefix(':')
            .or_else(|| trimmed.strip_prefix('：'))
        {
            return Some(value.trim());
        }
        // "Duration 120 min" style rows need whitespace after the label
        if rest.starts_with(char::is_whitespace) || rest.is_empty() {
            return Some(trimmed);
        }
    }
    None
}

/// List items of a row: its link texts, or the value split on separators
fn row_items(element: ElementRef<'_>, value: &str) -> BTreeSet<String> {
    let links: BTreeSet<String> = Selector::parse("a")
        .ok()
        .map(|selector| {
            element
                .select(&selector)
                .map(|a| collapse_whitespace(&a.text().collect::<String>()))
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if !links.is_empty() {
        return links;
    }

    value
        .split([',', '，', '、', '/', '|'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
