//! Per-run robots.txt cache with a single fetch per domain.
//!
//! The first caller for a domain fetches and parses `/robots.txt`; concurrent
//! callers wait on the same cell and then share the immutable entry.
//! Optionally entries are also written to disk and reused across runs.

use crate::acquisition::http_client::HttpClient;
use crate::cartography::robots::{parse_robots, RobotsTxt};
use crate::error::FetchErrorKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Path evaluated for each AI bot.
pub const BOT_CHECK_PATH: &str = "/";

/// What happened when robots.txt was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RobotsStatus {
    Found,
    /// Not served or unreachable.
    Missing(String),
    /// Served, but not a rules file.
    Unparseable(String),
}

/// Access decision for one AI bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotAccess {
    pub bot: String,
    pub allowed: bool,
    pub detail: String,
}

/// Cached robots.txt state for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotsCacheEntry {
    pub domain: String,
    pub robots_url: String,
    pub status: RobotsStatus,
    pub rules: Option<RobotsTxt>,
    pub bots: Vec<BotAccess>,
    pub fetched_at: DateTime<Utc>,
}

impl RobotsCacheEntry {
    pub fn found(&self) -> bool {
        self.status == RobotsStatus::Found
    }

    /// Whether our own crawler may fetch `path`.
    ///
    /// A missing robots.txt places no restriction on crawling; an unparseable
    /// one is treated as blocking everything.
    pub fn crawler_allows(&self, agent: &str, path: &str) -> bool {
        match (&self.status, &self.rules) {
            (RobotsStatus::Found, Some(rules)) => rules.is_allowed(agent, path),
            (RobotsStatus::Missing(_), _) => true,
            _ => false,
        }
    }

    pub fn sitemaps(&self) -> &[String] {
        self.rules.as_ref().map(|r| r.sitemaps.as_slice()).unwrap_or(&[])
    }

    pub fn blocked_bots(&self) -> Vec<&str> {
        self.bots
            .iter()
            .filter(|b| !b.allowed)
            .map(|b| b.bot.as_str())
            .collect()
    }
}

/// Raw outcome kept on disk so a different bot list can be re-evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedRobots {
    robots_url: String,
    fetched_at: DateTime<Utc>,
    body: Option<String>,
    missing_reason: Option<String>,
}

struct Persistence {
    dir: PathBuf,
    ttl: chrono::Duration,
}

/// Robots cache shared by every worker of one audit run.
pub struct RobotsCache {
    client: HttpClient,
    timeout: Duration,
    bots: Vec<String>,
    entries: DashMap<String, Arc<OnceCell<Arc<RobotsCacheEntry>>>>,
    fetches: AtomicUsize,
    persistence: Option<Persistence>,
}

impl RobotsCache {
    /// In-memory cache for one run.
    pub fn new(client: HttpClient, timeout: Duration, bots: Vec<String>) -> Self {
        Self {
            client,
            timeout,
            bots,
            entries: DashMap::new(),
            fetches: AtomicUsize::new(0),
            persistence: None,
        }
    }

    /// Cache that also reuses robots files fetched by earlier runs within `ttl`.
    pub fn persistent(
        client: HttpClient,
        timeout: Duration,
        bots: Vec<String>,
        dir: PathBuf,
        ttl: Duration,
    ) -> Self {
        let mut cache = Self::new(client, timeout, bots);
        cache.persistence = Some(Persistence {
            dir: dir.join("robots"),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24)),
        });
        cache
    }

    /// Network fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Robots entry for the domain of `url`, fetching it at most once per run.
    pub async fn get(&self, url: &str) -> Arc<RobotsCacheEntry> {
        let (key, origin) = domain_key(url);
        let cell = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        cell.get_or_init(|| self.load(key, origin)).await.clone()
    }

    /// Entry for a domain whose robots.txt could not be loaded in time.
    /// Nothing is cached.
    pub fn unavailable(&self, url: &str, reason: &str) -> Arc<RobotsCacheEntry> {
        let (domain, origin) = domain_key(url);
        let saved = PersistedRobots {
            robots_url: format!("{origin}/robots.txt"),
            fetched_at: Utc::now(),
            body: None,
            missing_reason: Some(reason.to_string()),
        };
        Arc::new(self.build_entry(domain, saved))
    }

    async fn load(&self, domain: String, origin: String) -> Arc<RobotsCacheEntry> {
        let robots_url = format!("{origin}/robots.txt");

        if let Some(saved) = self.read_persisted(&domain) {
            debug!(domain = %domain, "robots.txt reused from disk cache");
            return Arc::new(self.build_entry(domain, saved));
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let fetched_at = Utc::now();
        let (saved, cacheable) = match self.client.get(&robots_url, self.timeout).await {
            Ok(resp) => (
                PersistedRobots {
                    robots_url: robots_url.clone(),
                    fetched_at,
                    body: Some(resp.body),
                    missing_reason: None,
                },
                true,
            ),
            Err(e) => {
                let cacheable = matches!(e.kind, FetchErrorKind::Http(s) if s < 500);
                (
                    PersistedRobots {
                        robots_url: robots_url.clone(),
                        fetched_at,
                        body: None,
                        missing_reason: Some(e.kind.to_string()),
                    },
                    cacheable,
                )
            }
        };

        if cacheable {
            self.write_persisted(&domain, &saved);
        }

        let entry = self.build_entry(domain, saved);
        info!(domain = %entry.domain, status = ?entry.status, "robots.txt loaded");
        Arc::new(entry)
    }

    fn build_entry(&self, domain: String, saved: PersistedRobots) -> RobotsCacheEntry {
        let (status, rules) = match saved.body {
            Some(body) => match parse_robots(&body) {
                Ok(rules) => (RobotsStatus::Found, Some(rules)),
                Err(e) => {
                    warn!(domain = %domain, error = %e, "robots.txt unparseable, treating as fully blocked");
                    (RobotsStatus::Unparseable(e.to_string()), None)
                }
            },
            None => (
                RobotsStatus::Missing(
                    saved
                        .missing_reason
                        .unwrap_or_else(|| "not found".to_string()),
                ),
                None,
            ),
        };

        let bots = self
            .bots
            .iter()
            .map(|bot| evaluate_bot(bot, &status, rules.as_ref()))
            .collect();

        RobotsCacheEntry {
            domain,
            robots_url: saved.robots_url,
            status,
            rules,
            bots,
            fetched_at: saved.fetched_at,
        }
    }

    fn persisted_path(&self, domain: &str) -> Option<PathBuf> {
        let p = self.persistence.as_ref()?;
        let file = domain.replace([':', '/', '\\'], "_");
        Some(p.dir.join(format!("{file}.json")))
    }

    fn read_persisted(&self, domain: &str) -> Option<PersistedRobots> {
        let ttl = self.persistence.as_ref()?.ttl;
        let path = self.persisted_path(domain)?;
        let data = std::fs::read_to_string(path).ok()?;
        let saved: PersistedRobots = serde_json::from_str(&data).ok()?;
        (Utc::now() - saved.fetched_at < ttl).then_some(saved)
    }

    fn write_persisted(&self, domain: &str, saved: &PersistedRobots) {
        let Some(path) = self.persisted_path(domain) else {
            return;
        };
        let result = path
            .parent()
            .map(std::fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| {
                let json = serde_json::to_string(saved).map_err(std::io::Error::other)?;
                std::fs::write(&path, json)
            });
        if let Err(e) = result {
            warn!(domain, error = %e, "failed to persist robots.txt");
        }
    }
}

fn evaluate_bot(bot: &str, status: &RobotsStatus, rules: Option<&RobotsTxt>) -> BotAccess {
    let (allowed, detail) = match (status, rules) {
        (RobotsStatus::Found, Some(rules)) => {
            if rules.is_allowed(bot, BOT_CHECK_PATH) {
                (true, "Allowed".to_string())
            } else {
                (false, "Blocked by robots.txt".to_string())
            }
        }
        (RobotsStatus::Unparseable(_), _) => (false, "robots.txt unparseable".to_string()),
        _ => (false, "robots.txt not found".to_string()),
    };
    BotAccess {
        bot: bot.to_string(),
        allowed,
        detail,
    }
}

/// `(host[:port], scheme://host[:port])` for a URL.
pub fn domain_key(url: &str) -> (String, String) {
    match url::Url::parse(url) {
        Ok(u) => {
            let host = u.host_str().unwrap_or_default().to_lowercase();
            let key = match u.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            };
            let origin = format!("{}://{key}", u.scheme());
            (key, origin)
        }
        Err(_) => (url.to_string(), url.trim_end_matches('/').to_string()),
    }
}
