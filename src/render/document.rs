//! Rendered document handed from a renderer to the extractors

use scraper::{Html, Node, Selector};
use url::Url;

/// A rendered page
///
/// Holds the raw markup rather than a parsed tree so documents can cross
/// await points; callers parse on demand with [`Document::parse`].
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    status: u16,
    html: String,
}

impl Document {
    pub fn new(url: Url, status: u16, html: impl Into<String>) -> Self {
        Self {
            url,
            status,
            html: html.into(),
        }
    }

    /// Final URL of the page
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw markup
    pub fn content(&self) -> &str {
        &self.html
    }

    /// Parses the markup into a queryable tree
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Text of the `<title>` element, empty when missing
    pub fn title(&self) -> String {
        let document = self.parse();
        let Ok(selector) = Selector::parse("title") else {
            return String::new();
        };
        document
            .select(&selector)
            .next()
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .unwrap_or_default()
    }

    /// Visible body text, excluding script and style contents
    pub fn body_text(&self) -> String {
        let document = self.parse();
        let Ok(selector) = Selector::parse("body") else {
            return String::new();
        };
        let Some(body) = document.select(&selector).next() else {
            return String::new();
        };

        let mut text = String::new();
        for node in body.descendants() {
            let Node::Text(chunk) = node.value() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|e| e.name()))
                .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
            if !hidden {
                text.push_str(chunk);
                text.push(' ');
            }
        }
        collapse_whitespace(&text)
    }
}

/// Trims and collapses runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::new(Url::parse("https://example.com/page").unwrap(), 200, html)
    }

    #[test]
    fn test_title() {
        let page = doc("<html><head><title>  Just a   moment </title></head></html>");
        assert_eq!(page.title(), "Just a moment");
    }

    #[test]
    fn test_missing_title() {
        assert_eq!(doc("<html><body></body></html>").title(), "");
    }

    #[test]
    fn test_body_text_skips_scripts() {
        let page = doc(
            r#"<html><body><p>Runtime: 02:10:00</p><script>var x = "12:00";</script></body></html>"#,
        );
        let text = page.body_text();
        assert!(text.contains("Runtime: 02:10:00"));
        assert!(!text.contains("var x"));
    }
}
