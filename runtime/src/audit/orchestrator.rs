//! Audit orchestrator: one run from seed URL to finished `AuditReport`.
//!
//! A run moves through `Discovering → Auditing → Aggregating → Done`. The
//! only way to end without a report is an unreachable seed (`Failed`).
//! Page failures are recorded in the report and never stop the run.

use crate::acquisition::http_client::{HttpClient, HttpResponse, RetryPolicy};
use crate::audit::report::{
    compute_lint_checks, AuditReport, BotAccessEvidence, PageResult, PageStatus, SiteWidePillar,
};
use crate::cartography::discovery::{Discovery, DiscoveryResult};
use crate::cartography::rate_limiter::RateLimiter;
use crate::cartography::robots_cache::{domain_key, RobotsCache};
use crate::cartography::url_classifier::{page_key, site_host, url_depth};
use crate::config::{AuditConfig, SchemaScoring};
use crate::error::{AuditError, FetchError, FetchErrorKind};
use crate::extraction::markdown::extract_page;
use crate::pool::manager::{PoolManager, ProgressFn};
use crate::scoring::aggregate::{aggregate, PageScores};
use crate::scoring::bot_access::score_bot_access;
use crate::scoring::content::{score_content, token_waste, ContentAnalysis, TokenWaste};
use crate::scoring::llms_txt::{probe_llms_files, score_llms_file, LlmsFileReport};
use crate::scoring::schema::score_schema;
use crate::scoring::{PillarScore, CONTENT_MAX, SCHEMA_MAX};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Error entry added when the run deadline cut the audit short.
pub const DEADLINE_ERROR: &str = "audit deadline exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    Discovering,
    Auditing,
    Aggregating,
    Done,
    Failed,
}

pub type PhaseFn = Arc<dyn Fn(AuditPhase) + Send + Sync>;

/// Runs audits for one validated configuration.
pub struct Auditor {
    config: AuditConfig,
    client: HttpClient,
    robots: RobotsCache,
    on_phase: Option<PhaseFn>,
    on_progress: Option<ProgressFn>,
}

impl Auditor {
    /// Validate `config` and build the run's HTTP client and robots cache.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let config = config.validated()?;
        let retry = RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_cap_ms),
        };
        let user_agent = format!("ctxlint/{}", env!("CARGO_PKG_VERSION"));
        let client = HttpClient::new(&user_agent, retry)
            .map_err(|e| AuditError::ClientSetup(e.to_string()))?;
        let robots = RobotsCache::new(client.clone(), config.timeout(), config.bots.clone());
        Ok(Self {
            config,
            client,
            robots,
            on_phase: None,
            on_progress: None,
        })
    }

    /// Reuse robots files saved under `dir` by earlier runs while younger than `ttl`.
    pub fn with_persistent_robots(mut self, dir: PathBuf, ttl: Duration) -> Self {
        self.robots = RobotsCache::persistent(
            self.client.clone(),
            self.config.timeout(),
            self.config.bots.clone(),
            dir,
            ttl,
        );
        self
    }

    pub fn on_phase(mut self, f: PhaseFn) -> Self {
        self.on_phase = Some(f);
        self
    }

    /// Called with `(completed, total)` as page audits finish.
    pub fn on_progress(mut self, f: ProgressFn) -> Self {
        self.on_progress = Some(f);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Robots cache of this run, shared by discovery and bot-access scoring.
    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    pub async fn run(&self) -> Result<AuditReport, AuditError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("audit", run_id = %run_id, url = %self.config.url);
        self.run_inner(run_id).instrument(span).await
    }

    fn phase(&self, phase: AuditPhase) {
        debug!(?phase, "phase");
        if let Some(f) = &self.on_phase {
            f(phase);
        }
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<AuditReport, AuditError> {
        let cfg = &self.config;
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = started + cfg.run_deadline();
        let mut deadline_exceeded = false;

        self.phase(AuditPhase::Discovering);
        let fetched = timeout_at(deadline, self.client.get(&cfg.url, cfg.timeout()))
            .await
            .unwrap_or_else(|_| Err(FetchError::new(&cfg.url, FetchErrorKind::Timeout)));
        let seed = match fetched {
            Ok(resp) => resp,
            Err(source) => {
                warn!(error = %source, "seed url unreachable");
                self.phase(AuditPhase::Failed);
                return Err(AuditError::FatalSeed {
                    url: cfg.url.clone(),
                    source,
                });
            }
        };
        info!(status = seed.status, bytes = seed.body.len(), "seed fetched");
        // Scored up front so a run cut short by the deadline still reports it.
        let seed_page = score_page(&seed, cfg.schema_scoring);

        let (_, origin) = domain_key(&cfg.url);
        let probes = async {
            futures::join!(
                self.robots.get(&cfg.url),
                probe_llms_files(&self.client, &origin, cfg.timeout()),
            )
        };
        let (robots, llms) = match timeout_at(deadline, probes).await {
            Ok(probed) => probed,
            Err(_) => {
                warn!("run deadline reached while probing robots.txt and llms.txt");
                deadline_exceeded = true;
                (
                    self.robots.unavailable(&cfg.url, DEADLINE_ERROR),
                    LlmsFileReport::default(),
                )
            }
        };

        let discovery = if cfg.single_page {
            DiscoveryResult::single(&cfg.url)
        } else if deadline_exceeded {
            DiscoveryResult::interrupted(&cfg.url)
        } else {
            let discovery = Discovery {
                client: &self.client,
                robots: &self.robots,
                timeout: cfg.timeout(),
                crawler_agent: &cfg.crawler_agent,
                max_pages: cfg.max_pages,
            };
            let discovered = timeout_at(deadline, discovery.discover(&cfg.url, &seed.body)).await;
            match discovered {
                Ok(found) => found,
                Err(_) => {
                    warn!("run deadline reached during discovery, auditing the seed only");
                    deadline_exceeded = true;
                    DiscoveryResult::interrupted(&cfg.url)
                }
            }
        };

        self.phase(AuditPhase::Auditing);
        let seed_key = page_key(&seed.url);
        let urls: Vec<String> = discovery
            .urls_sampled
            .iter()
            .filter(|url| page_key(url) != seed_key)
            .cloned()
            .collect();

        let total = urls.len() + 1;
        if let Some(progress) = &self.on_progress {
            progress(1, total);
        }

        let crawl_delay = robots
            .rules
            .as_ref()
            .and_then(|rules| rules.crawl_delay(&cfg.crawler_agent));
        let workers = cfg.effective_concurrency();
        let limiter =
            RateLimiter::with_crawl_delay(workers, Duration::from_millis(cfg.delay_ms), crawl_delay);
        let mut pool = PoolManager::new(limiter);
        if let Some(progress) = &self.on_progress {
            let progress = Arc::clone(progress);
            pool = pool.with_progress(Arc::new(move |done: usize, _: usize| progress(done + 1, total)));
        }

        let client = self.client.clone();
        let timeout = cfg.timeout();
        let mode = cfg.schema_scoring;
        let run = pool
            .run(urls.clone(), deadline, move |url| {
                audit_page(client.clone(), url, timeout, mode)
            })
            .await;
        deadline_exceeded |= run.deadline_exceeded;

        self.phase(AuditPhase::Aggregating);
        let mut pages = Vec::with_capacity(total);
        let mut errors = discovery.errors.clone();
        let mut unfinished = 0;
        let results = std::iter::once((&seed.url, Some(seed_page))).chain(urls.iter().zip(run.results));
        for (url, result) in results {
            match result {
                Some(page) => {
                    if let Some(err) = &page.error {
                        errors.push(format!("{}: {err}", page.url));
                    }
                    pages.push(page);
                }
                None if run.deadline_exceeded => unfinished += 1,
                None => errors.push(format!("{url}: page audit aborted")),
            }
        }
        if deadline_exceeded {
            warn!(unfinished, "run deadline exceeded");
            errors.push(DEADLINE_ERROR.to_string());
        }

        let bot_access = SiteWidePillar {
            pillar: score_bot_access(&robots),
            evidence: BotAccessEvidence {
                robots_found: robots.found(),
                robots_url: robots.robots_url.clone(),
                bots: robots.bots.clone(),
            },
        };
        let llms_file = SiteWidePillar {
            pillar: score_llms_file(&llms),
            evidence: llms,
        };

        let scored: Vec<PageScores<'_>> = pages
            .iter()
            .filter(|p| p.is_ok())
            .map(|p| PageScores {
                url: &p.url,
                content: p.content.score,
                structured_data: p.structured_data.score,
                raw_tokens: p.token_waste.raw_tokens,
                clean_tokens: p.token_waste.clean_tokens,
            })
            .collect();
        let site = aggregate(&scored, &bot_access.pillar, &llms_file.pillar);

        let pages_audited = pages.iter().filter(|p| p.is_ok()).count();
        let pages_failed = pages.len() - pages_audited + run.panicked;

        let mut report = AuditReport {
            run_id,
            url: cfg.url.clone(),
            domain: site_host(&cfg.url).unwrap_or_default(),
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            discovery,
            bot_access,
            llms_file,
            content: site.content,
            structured_data: site.structured_data,
            overall_score: site.overall_score,
            context_waste_pct: site.token_waste.map(|t| t.waste_pct),
            token_waste: site.token_waste,
            pages,
            errors,
            pages_audited,
            pages_failed,
            deadline_exceeded,
            lint: Vec::new(),
        };
        report.lint = compute_lint_checks(&report);

        self.phase(AuditPhase::Done);
        info!(
            overall = report.overall_score,
            audited = report.pages_audited,
            failed = report.pages_failed,
            duration_ms = report.duration_ms,
            "audit complete"
        );
        Ok(report)
    }
}

/// Validate `config`, audit the site and return the report.
pub async fn run_audit(config: AuditConfig) -> Result<AuditReport, AuditError> {
    Auditor::new(config)?.run().await
}

async fn audit_page(client: HttpClient, url: String, timeout: Duration, mode: SchemaScoring) -> PageResult {
    match client.get(&url, timeout).await {
        Ok(resp) => score_page(&resp, mode),
        Err(e) => {
            debug!(url = %url, error = %e, "page fetch failed");
            failed_page(&url, &e)
        }
    }
}

/// Extract and score a fetched page. Synchronous: the parsed DOM never
/// lives across an await point.
fn score_page(resp: &HttpResponse, mode: SchemaScoring) -> PageResult {
    if let Some(reason) = unparseable(resp) {
        let mut page = empty_page(&resp.url, PageStatus::ParseError, reason);
        page.http_status = Some(resp.status);
        page.raw_bytes = resp.body.len();
        return page;
    }

    let extracted = extract_page(&resp.body);
    let (content, content_analysis) = score_content(&extracted.markdown);
    let (structured_data, schema) = score_schema(&resp.body, mode);

    PageResult {
        url: resp.url.clone(),
        depth: url_depth(&resp.url),
        status: PageStatus::Ok,
        http_status: Some(resp.status),
        raw_bytes: resp.body.len(),
        extracted_bytes: extracted.markdown.len(),
        content,
        structured_data,
        content_analysis,
        schema_blocks: schema.blocks_found,
        schema_types: schema.unique_types().into_iter().map(String::from).collect(),
        token_waste: token_waste(extracted.raw_chars, extracted.clean_chars),
        error: None,
    }
}

fn unparseable(resp: &HttpResponse) -> Option<String> {
    if resp.body.trim().is_empty() {
        return Some("empty response body".to_string());
    }
    let ct = resp.content_type.as_deref()?.to_ascii_lowercase();
    let textual = ct.starts_with("text/") || ct.contains("html") || ct.contains("xml");
    (!textual).then(|| format!("unsupported content type {ct}"))
}

fn failed_page(url: &str, err: &FetchError) -> PageResult {
    let status = match err.kind {
        FetchErrorKind::Timeout => PageStatus::Timeout,
        _ => PageStatus::FetchError,
    };
    let mut page = empty_page(url, status, err.kind.to_string());
    if let FetchErrorKind::Http(code) = err.kind {
        page.http_status = Some(code);
    }
    page
}

fn empty_page(url: &str, status: PageStatus, error: String) -> PageResult {
    PageResult {
        url: url.to_string(),
        depth: url_depth(url),
        status,
        http_status: None,
        raw_bytes: 0,
        extracted_bytes: 0,
        content: PillarScore::zero("content", CONTENT_MAX, "page not audited"),
        structured_data: PillarScore::zero("structured_data", SCHEMA_MAX, "page not audited"),
        content_analysis: ContentAnalysis::default(),
        schema_blocks: 0,
        schema_types: Vec::new(),
        token_waste: TokenWaste::default(),
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str, content_type: Option<&str>) -> HttpResponse {
        HttpResponse {
            url: "https://example.com/docs/intro".into(),
            final_url: "https://example.com/docs/intro".into(),
            status: 200,
            content_type: content_type.map(String::from),
            body: body.into(),
        }
    }

    #[test]
    fn test_score_page_ok() {
        let html = r#"<html><head><script type="application/ld+json">{"@type":"Article"}</script></head>
            <body><h1>Intro</h1><p>Some words here.</p><ul><li>a</li></ul></body></html>"#;
        let page = score_page(&response(html, Some("text/html; charset=utf-8")), SchemaScoring::Baseline);
        assert!(page.is_ok());
        assert_eq!(page.depth, 2);
        assert_eq!(page.schema_blocks, 1);
        assert_eq!(page.schema_types, vec!["Article".to_string()]);
        assert_eq!(page.structured_data.score, 13.0);
        assert!(page.content_analysis.has_headings);
        assert!(page.content_analysis.has_lists);
        assert!(page.extracted_bytes < page.raw_bytes);
    }

    #[test]
    fn test_score_page_parse_errors() {
        let page = score_page(&response("   ", Some("text/html")), SchemaScoring::Baseline);
        assert_eq!(page.status, PageStatus::ParseError);
        assert_eq!(page.error.as_deref(), Some("empty response body"));

        let page = score_page(&response("%PDF-1.4", Some("application/pdf")), SchemaScoring::Baseline);
        assert_eq!(page.status, PageStatus::ParseError);
        assert_eq!(page.http_status, Some(200));

        let page = score_page(&response("<p>hi</p>", None), SchemaScoring::Baseline);
        assert!(page.is_ok());
    }

    #[test]
    fn test_failed_page_status() {
        let page = failed_page(
            "https://example.com/a",
            &FetchError::new("https://example.com/a", FetchErrorKind::Timeout),
        );
        assert_eq!(page.status, PageStatus::Timeout);

        let page = failed_page(
            "https://example.com/a",
            &FetchError::new("https://example.com/a", FetchErrorKind::Http(404)),
        );
        assert_eq!(page.status, PageStatus::FetchError);
        assert_eq!(page.http_status, Some(404));
        assert_eq!(page.error.as_deref(), Some("HTTP 404"));
        assert_eq!(page.content.score, 0.0);
    }

    #[test]
    fn test_auditor_rejects_bad_config() {
        let mut cfg = AuditConfig::new("https://example.com");
        cfg.max_pages = 0;
        assert!(matches!(Auditor::new(cfg), Err(AuditError::Config(_))));
    }
}
