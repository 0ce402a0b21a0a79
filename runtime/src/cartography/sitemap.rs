//! Sitemap discovery: fetch `sitemap.xml`, follow sitemap indexes, collect page URLs.

use crate::acquisition::http_client::HttpClient;
use quick_xml::events::Event;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

/// Global cap on candidate URLs collected from sitemaps.
pub const MAX_SITEMAP_URLS: usize = 500;

/// How many levels of nested sitemap indexes are followed.
pub const MAX_SITEMAP_DEPTH: usize = 3;

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDoc {
    /// `<urlset>`: page URLs.
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: child sitemap URLs.
    Index(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed sitemap: {0}")]
pub struct SitemapParseError(pub String);

/// Result of walking every reachable sitemap.
#[derive(Debug, Clone, Default)]
pub struct SitemapCollection {
    pub urls: Vec<String>,
    /// At least one sitemap document was fetched and parsed.
    pub found: bool,
    /// Sitemaps that were served but could not be parsed.
    pub errors: Vec<String>,
}

/// Parse a sitemap or sitemap index.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDoc, SitemapParseError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if root.is_none() {
                    root = Some(name.clone());
                }
                in_loc = name == "loc";
            }
            Ok(Event::Text(ref e)) if in_loc => {
                let text = e
                    .unescape()
                    .map_err(|err| SitemapParseError(err.to_string()))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    locs.push(trimmed.to_string());
                }
            }
            Ok(Event::CData(ref e)) if in_loc => {
                let text = String::from_utf8_lossy(&e[..]).trim().to_string();
                if !text.is_empty() {
                    locs.push(text);
                }
            }
            Ok(Event::End(_)) => in_loc = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SitemapParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("urlset") => Ok(SitemapDoc::UrlSet(locs)),
        Some("sitemapindex") => Ok(SitemapDoc::Index(locs)),
        Some(other) => Err(SitemapParseError(format!("unexpected root element <{other}>"))),
        None => Err(SitemapParseError("no root element".to_string())),
    }
}

/// Fetch `roots` and every nested sitemap up to `MAX_SITEMAP_DEPTH`, stopping at `cap` URLs.
pub async fn collect_sitemap_urls(
    client: &HttpClient,
    roots: &[String],
    timeout: Duration,
    cap: usize,
) -> SitemapCollection {
    let mut out = SitemapCollection::default();
    let mut queue: VecDeque<(String, usize)> = roots.iter().map(|r| (r.clone(), 0)).collect();
    let mut visited = HashSet::new();
    let mut seen_urls = HashSet::new();

    while let Some((sitemap_url, depth)) = queue.pop_front() {
        if out.urls.len() >= cap {
            break;
        }
        if !visited.insert(sitemap_url.clone()) {
            continue;
        }

        let body = match client.get(&sitemap_url, timeout).await {
            Ok(resp) => resp.body,
            Err(e) => {
                debug!(url = %sitemap_url, error = %e, "sitemap not available");
                continue;
            }
        };

        match parse_sitemap(&body) {
            Ok(SitemapDoc::UrlSet(urls)) => {
                out.found = true;
                for u in urls {
                    if out.urls.len() >= cap {
                        break;
                    }
                    if seen_urls.insert(u.clone()) {
                        out.urls.push(u);
                    }
                }
            }
            Ok(SitemapDoc::Index(children)) => {
                out.found = true;
                if depth + 1 > MAX_SITEMAP_DEPTH {
                    warn!(url = %sitemap_url, "sitemap index nesting too deep, skipping children");
                    continue;
                }
                queue.extend(children.into_iter().map(|c| (c, depth + 1)));
            }
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "sitemap parse failed");
                out.errors.push(format!("{sitemap_url}: {e}"));
            }
        }
    }

    out
}
