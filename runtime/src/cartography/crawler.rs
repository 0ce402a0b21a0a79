//! Spider fallback: harvest same-site links from a fetched page.

use crate::cartography::url_classifier::same_domain;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// File extensions that never lead to an auditable HTML page.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".gz", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".mp4", ".mp3",
    ".css", ".js", ".xml", ".json", ".ico", ".woff", ".woff2",
];

/// Extract internal links from page HTML, resolved against `source_url`.
///
/// Links are returned in document order without duplicates; fragments are
/// stripped and only same-site http(s) URLs are kept.
pub fn extract_links(html: &str, source_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(source_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:")
        {
            continue;
        }

        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);

        let lower_path = resolved.path().to_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| lower_path.ends_with(ext)) {
            continue;
        }

        let link = resolved.to_string();
        // Only follow internal links
        if !same_domain(&link, source_url) {
            continue;
        }
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}
