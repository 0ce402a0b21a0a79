//! Page discovery: decide which URLs of a site get audited.
//!
//! Sitemaps are tried first (`/sitemap.xml` plus any declared in robots.txt);
//! when they yield nothing, links on the seed page are used instead.
//! Candidates are then filtered to the seed's site and our crawler's robots
//! permissions, deduplicated, and diversity-sampled down to `max_pages`.

use crate::acquisition::http_client::HttpClient;
use crate::cartography::crawler::extract_links;
use crate::cartography::robots_cache::{domain_key, RobotsCache};
use crate::cartography::sampler::select_samples;
use crate::cartography::sitemap::{collect_sitemap_urls, MAX_SITEMAP_URLS};
use crate::cartography::url_classifier::{page_key, path_and_query, same_domain};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    Sitemap,
    Spider,
    /// Discovery skipped; only the seed is audited.
    Single,
}

/// Which pages were found and which will be audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub method: DiscoveryMethod,
    /// Candidates after filtering and deduplication, before sampling.
    pub urls_found: usize,
    /// Pages to audit; the seed is always first.
    pub urls_sampled: Vec<String>,
    pub detail: String,
    /// Problems met while discovering, such as unparseable sitemaps.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl DiscoveryResult {
    pub fn single(seed: &str) -> Self {
        Self {
            method: DiscoveryMethod::Single,
            urls_found: 1,
            urls_sampled: vec![seed.to_string()],
            detail: "single-page audit".to_string(),
            errors: Vec::new(),
        }
    }

    /// Discovery did not finish before the run deadline; only the seed is audited.
    pub fn interrupted(seed: &str) -> Self {
        Self {
            detail: "discovery cut short by the run deadline".to_string(),
            ..Self::single(seed)
        }
    }
}

/// Inputs shared by the discovery steps.
pub struct Discovery<'a> {
    pub client: &'a HttpClient,
    pub robots: &'a RobotsCache,
    pub timeout: Duration,
    pub crawler_agent: &'a str,
    pub max_pages: usize,
}

impl Discovery<'_> {
    /// Discover pages for `seed_url`, using `seed_html` for the spider fallback.
    pub async fn discover(&self, seed_url: &str, seed_html: &str) -> DiscoveryResult {
        let seed_robots = self.robots.get(seed_url).await;
        let (_, origin) = domain_key(seed_url);

        let mut roots = vec![format!("{origin}/sitemap.xml")];
        for declared in seed_robots.sitemaps() {
            if !roots.contains(declared) {
                roots.push(declared.clone());
            }
        }

        let sitemaps = collect_sitemap_urls(self.client, &roots, self.timeout, MAX_SITEMAP_URLS).await;
        let (method, raw, source) = if sitemaps.urls.is_empty() {
            debug!(seed = seed_url, "no sitemap urls, falling back to spider");
            let source = if !sitemaps.errors.is_empty() {
                "seed page links (sitemap unparseable)"
            } else if sitemaps.found {
                "seed page links (sitemap listed no pages)"
            } else {
                "seed page links"
            };
            (DiscoveryMethod::Spider, extract_links(seed_html, seed_url), source)
        } else {
            (DiscoveryMethod::Sitemap, sitemaps.urls, "sitemap")
        };
        let raw_count = raw.len();

        let candidates = self.filter_candidates(seed_url, raw).await;
        let urls_found = candidates.len();
        let urls_sampled = select_samples(seed_url, &candidates, self.max_pages);

        info!(
            seed = seed_url,
            method = ?method,
            raw = raw_count,
            found = urls_found,
            sampled = urls_sampled.len(),
            "discovery complete"
        );

        DiscoveryResult {
            method,
            urls_found,
            detail: format!(
                "{urls_found} page(s) found via {source}, {} sampled",
                urls_sampled.len()
            ),
            urls_sampled,
            errors: sitemaps.errors,
        }
    }

    /// Same-site, robots-permitted, deduplicated candidates in discovery order.
    async fn filter_candidates(&self, seed_url: &str, raw: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for url in raw {
            if !same_domain(&url, seed_url) {
                continue;
            }
            let Some(key) = page_key(&url) else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            let entry = self.robots.get(&url).await;
            if !entry.crawler_allows(self.crawler_agent, &path_and_query(&url)) {
                debug!(url = %url, "dropped by robots.txt");
                continue;
            }
            kept.push(url);
        }
        kept
    }
}
