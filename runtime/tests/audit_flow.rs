//! End-to-end audit runs against a mock site.

use ctxlint_runtime::audit::gate::{evaluate_gate, GateOutcome};
use ctxlint_runtime::audit::orchestrator::{AuditPhase, Auditor, DEADLINE_ERROR};
use ctxlint_runtime::audit::report::PageStatus;
use ctxlint_runtime::cartography::discovery::DiscoveryMethod;
use ctxlint_runtime::error::{AuditError, FetchErrorKind};
use ctxlint_runtime::{run_audit, AuditConfig};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROBOTS: &str = "User-agent: GPTBot\nDisallow: /\n\nUser-agent: *\nAllow: /\n";

const HOME: &str = "<html><head><title>Home</title></head><body>\
    <nav><a href=\"/docs/guide\">Guide</a></nav>\
    <h1>Home</h1><p>Welcome to the site.</p>\
    <ul><li>one</li><li>two</li></ul>\
    <pre><code>let x = 1;</code></pre>\
    </body></html>";

const GUIDE: &str = "<html><head>\
    <script type=\"application/ld+json\">{\"@context\":\"https://schema.org\",\"@type\":\"Article\"}</script>\
    </head><body><h2>Guide</h2><p>Read this first.</p></body></html>";

const DEEP: &str = "<html><body><p>Just a paragraph.</p></body></html>";

fn config(base: &str) -> AuditConfig {
    let mut cfg = AuditConfig::new(base);
    cfg.bots = vec!["GPTBot".into(), "ClaudeBot".into()];
    cfg.max_attempts = 1;
    cfg.timeout_secs = 5;
    cfg
}

async fn mount_html(server: &MockServer, at: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(server)
        .await;
}

async fn mount_text(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Home (depth 0), guide (depth 2), deep page (depth 3) and one dead link.
async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(HOME, "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(&server, "/docs/guide", GUIDE).await;
    mount_html(&server, "/blog/post/deep", DEEP).await;
    mount_text(&server, "/robots.txt", ROBOTS).await;
    mount_text(&server, "/llms.txt", "# Example\n\n> A test site.\n").await;

    let sitemap = format!(
        "<?xml version=\"1.0\"?><urlset>\
         <url><loc>{base}/</loc></url>\
         <url><loc>{base}/docs/guide</loc></url>\
         <url><loc>{base}/blog/post/deep</loc></url>\
         <url><loc>{base}/missing</loc></url>\
         </urlset>"
    );
    mount_text(&server, "/sitemap.xml", &sitemap).await;
    server
}

#[tokio::test]
async fn test_full_site_audit() {
    let server = mock_site().await;
    let report = run_audit(config(&server.uri())).await.unwrap();
    let seed = format!("{}/", server.uri());

    assert_eq!(report.url, seed);
    assert_eq!(report.discovery.method, DiscoveryMethod::Sitemap);
    assert_eq!(report.discovery.urls_found, 4);
    assert_eq!(report.discovery.urls_sampled[0], seed);
    assert_eq!(report.pages.len(), 4);
    assert_eq!(report.pages[0].url, seed);
    assert_eq!(report.pages_audited, 3);
    assert_eq!(report.pages_failed, 1);

    let missing = report
        .pages
        .iter()
        .find(|p| p.url.ends_with("/missing"))
        .unwrap();
    assert_eq!(missing.status, PageStatus::FetchError);
    assert_eq!(missing.http_status, Some(404));
    assert!(report.errors.iter().any(|e| e.contains("/missing")));

    // 1 of 2 bots allowed, llms.txt present.
    assert_eq!(report.bot_access.pillar.score, 12.5);
    assert_eq!(report.llms_file.pillar.score, 10.0);
    assert_eq!(report.blocked_bots(), vec!["GPTBot"]);

    // content 15/7/0 and schema 0/13/0 at weights 3/2/1
    assert_eq!(report.content.score, 9.8);
    assert_eq!(report.structured_data.score, 4.3);
    assert!((report.overall_score - 36.6).abs() < 1e-9);

    assert!(report.context_waste_pct.is_some());
    assert!(!report.deadline_exceeded);
    let lint: Vec<(&str, bool)> = report
        .lint
        .iter()
        .map(|c| (c.name.as_str(), c.passed))
        .collect();
    assert_eq!(lint[0], ("AI Primitives", true));
    assert_eq!(lint[1], ("Bot Access", false));
    assert_eq!(lint[2], ("Data Structuring", true));
}

#[tokio::test]
async fn test_gate_on_full_audit() {
    let server = mock_site().await;
    let mut cfg = config(&server.uri());
    cfg.thresholds.fail_on_blocked_bots = true;
    cfg.thresholds.require_llms_txt = true;
    let thresholds = cfg.thresholds.clone();

    let report = run_audit(cfg).await.unwrap();
    let outcome = evaluate_gate(&report, &thresholds);
    assert_eq!(outcome.code(), 2);
    assert!(matches!(outcome, GateOutcome::BotBlocked { .. }));
}

#[tokio::test]
async fn test_unreachable_seed_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = run_audit(config(&server.uri())).await.unwrap_err();
    match err {
        AuditError::FatalSeed { source, .. } => assert_eq!(source.kind, FetchErrorKind::Http(404)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_invalid_config_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut cfg = config(&server.uri());
    cfg.bots.clear();
    assert!(matches!(run_audit(cfg).await, Err(AuditError::Config(_))));
}

#[tokio::test]
async fn test_single_page_mode() {
    let server = MockServer::start().await;
    mount_html(&server, "/docs/guide", GUIDE).await;
    mount_text(&server, "/robots.txt", ROBOTS).await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut cfg = config(&format!("{}/docs/guide", server.uri()));
    cfg.single_page = true;
    let report = run_audit(cfg).await.unwrap();

    assert_eq!(report.discovery.method, DiscoveryMethod::Single);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.content.score, 7.0);
    assert_eq!(report.structured_data.score, 13.0);
    assert_eq!(report.llms_file.pillar.score, 0.0);
    assert!(!report.llms_present());
}

#[tokio::test]
async fn test_spider_fallback_and_missing_robots() {
    let server = MockServer::start().await;
    let home = "<html><body><h1>Hi</h1>\
        <a href=\"/about\">About</a>\
        <a href=\"/docs/start\">Docs</a>\
        <a href=\"https://elsewhere.example/x\">Out</a>\
        </body></html>";
    mount_html(&server, "/", home).await;
    mount_html(&server, "/about", DEEP).await;
    mount_html(&server, "/docs/start", GUIDE).await;

    let mut cfg = config(&server.uri());
    cfg.thresholds.require_bot_access = true;
    let thresholds = cfg.thresholds.clone();
    let report = run_audit(cfg).await.unwrap();

    assert_eq!(report.discovery.method, DiscoveryMethod::Spider);
    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.pages_audited, 3);
    assert!(!report.robots_found());
    assert_eq!(report.bot_access.pillar.score, 0.0);
    assert!(report.blocked_bots().is_empty());
    assert_eq!(evaluate_gate(&report, &thresholds).code(), 2);
}

#[tokio::test]
async fn test_deadline_keeps_completed_pages() {
    let server = MockServer::start().await;
    mount_html(&server, "/", HOME).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(DEEP, "text/html")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;
    let sitemap = format!(
        "<urlset><url><loc>{0}/</loc></url><url><loc>{0}/slow</loc></url></urlset>",
        server.uri()
    );
    mount_text(&server, "/sitemap.xml", &sitemap).await;

    let mut cfg = config(&server.uri());
    cfg.timeout_secs = 30;
    cfg.run_deadline_secs = 1;
    let report = run_audit(cfg).await.unwrap();

    assert!(report.deadline_exceeded);
    assert!(report.errors.iter().any(|e| e == DEADLINE_ERROR));
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages_audited, 1);
    assert_eq!(report.content.score, 15.0);
}

#[tokio::test]
async fn test_deadline_during_discovery_keeps_seed() {
    let server = MockServer::start().await;
    mount_html(&server, "/", HOME).await;
    mount_text(&server, "/robots.txt", ROBOTS).await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<urlset></urlset>")
                .set_delay(Duration::from_secs(6)),
        )
        .mount(&server)
        .await;

    let mut cfg = config(&server.uri());
    cfg.timeout_secs = 30;
    cfg.run_deadline_secs = 1;
    let started = Instant::now();
    let report = run_audit(cfg).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(report.deadline_exceeded);
    assert!(report.errors.iter().any(|e| e == DEADLINE_ERROR));
    assert_eq!(report.discovery.method, DiscoveryMethod::Single);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].url, format!("{}/", server.uri()));
    assert_eq!(report.pages_audited, 1);
    assert_eq!(report.content.score, 15.0);
    assert_eq!(report.bot_access.pillar.score, 12.5);
}

#[tokio::test]
async fn test_out_of_range_crawl_delay() {
    let server = MockServer::start().await;
    let home = "<html><body><h1>Hi</h1><a href=\"/about\">About</a></body></html>";
    mount_html(&server, "/", home).await;
    mount_html(&server, "/about", DEEP).await;
    mount_text(
        &server,
        "/robots.txt",
        "User-agent: *\nCrawl-delay: 99999999999999999999\nAllow: /\n",
    )
    .await;

    let report = run_audit(config(&server.uri())).await.unwrap();

    assert_eq!(report.discovery.method, DiscoveryMethod::Spider);
    assert_eq!(report.pages_audited, 2);
    assert!(!report.deadline_exceeded);
    assert_eq!(report.bot_access.pillar.score, 25.0);
}

#[tokio::test]
async fn test_phases_and_progress_reported() {
    let server = mock_site().await;
    let phases = Arc::new(Mutex::new(Vec::new()));
    let progress = Arc::new(Mutex::new(Vec::new()));

    let seen_phases = Arc::clone(&phases);
    let seen_progress = Arc::clone(&progress);
    let auditor = Auditor::new(config(&server.uri()))
        .unwrap()
        .on_phase(Arc::new(move |p: AuditPhase| seen_phases.lock().unwrap().push(p)))
        .on_progress(Arc::new(move |done: usize, total: usize| {
            seen_progress.lock().unwrap().push((done, total))
        }));
    auditor.run().await.unwrap();

    assert_eq!(
        *phases.lock().unwrap(),
        vec![
            AuditPhase::Discovering,
            AuditPhase::Auditing,
            AuditPhase::Aggregating,
            AuditPhase::Done
        ]
    );
    let progress = progress.lock().unwrap();
    assert_eq!(progress.len(), 4);
    assert_eq!(progress.last(), Some(&(4, 4)));
}

#[tokio::test]
async fn test_persistent_robots_reused_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_html(&server, "/", HOME).await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ROBOTS))
        .expect(1)
        .mount(&server)
        .await;

    for _ in 0..2 {
        let mut cfg = config(&server.uri());
        cfg.single_page = true;
        let report = Auditor::new(cfg)
            .unwrap()
            .with_persistent_robots(dir.path().to_path_buf(), Duration::from_secs(3600))
            .run()
            .await
            .unwrap();
        assert_eq!(report.bot_access.pillar.score, 12.5);
    }
}
