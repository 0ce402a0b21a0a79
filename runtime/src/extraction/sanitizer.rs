//! Boilerplate detection: which elements never reach the extracted markdown.

use scraper::node::Element;

/// Elements removed along with their whole subtree.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "iframe", "template", "head",
];

/// Elements that are never matched against id/class patterns.
const STRUCTURAL_TAGS: &[&str] = &["html", "body", "main"];

const COOKIE_BANNER_PATTERNS: &[&str] = &[
    "cookie",
    "consent",
    "gdpr",
    "privacy-banner",
    "cc-banner",
    "cookie-notice",
    "cookieconsent",
];

const AD_PATTERNS: &[&str] = &[
    "ad-",
    "ads-",
    "advert",
    "banner-ad",
    "google_ads",
    "sponsored",
    "dfp-",
    "gpt-ad",
];

/// Sanitizer settings. All rules are on by default.
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    pub strip_cookie_banners: bool,
    pub strip_ads: bool,
    pub strip_hidden: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            strip_cookie_banners: true,
            strip_ads: true,
            strip_hidden: true,
        }
    }
}

impl SanitizerConfig {
    /// Whether `el` (and everything inside it) is boilerplate.
    pub fn should_strip(&self, el: &Element) -> bool {
        let name = el.name();
        if STRIPPED_TAGS.contains(&name) {
            return true;
        }

        if self.strip_hidden && is_hidden(el) {
            return true;
        }

        if STRUCTURAL_TAGS.contains(&name) {
            return false;
        }

        if !self.strip_cookie_banners && !self.strip_ads {
            return false;
        }
        let marker = id_and_classes(el);
        if marker.trim().is_empty() {
            return false;
        }
        (self.strip_cookie_banners && COOKIE_BANNER_PATTERNS.iter().any(|p| marker.contains(p)))
            || (self.strip_ads && AD_PATTERNS.iter().any(|p| marker.contains(p)))
    }
}

fn is_hidden(el: &Element) -> bool {
    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    el.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        compact.contains("display:none")
    })
}

/// `"<id> <class> <class>..."`, lowercased.
fn id_and_classes(el: &Element) -> String {
    let mut marker = el.id().unwrap_or_default().to_string();
    for class in el.classes() {
        marker.push(' ');
        marker.push_str(class);
    }
    marker.to_lowercase()
}
