/// Thumbnail suffix served on listing pages
const LOW_RES_SUFFIX: &str = "cover-t.jpg";

/// Suffix of the full-size cover for the same item
const HIGH_RES_SUFFIX: &str = "cover-n.jpg";

/// Rewrites a thumbnail URL to its high-resolution variant
///
/// Only the path suffix is replaced; any query string is kept. URLs without
/// the thumbnail suffix, including already-upgraded ones, come back unchanged.
pub fn upgrade_cover_url(url: &str) -> String {
    let (path, query) = match url.find(['?', '#']) {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };

    match path.strip_suffix(LOW_RES_SUFFIX) {
        Some(prefix) => format!("{prefix}{HIGH_RES_SUFFIX}{query}"),
        None => url.to_string(),
    }
}
