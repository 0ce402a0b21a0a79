//! `ctxlint audit <url>`: run an audit, report it, and exit with the CI gate code.

use crate::audit::baseline::{compare_baseline, load_baseline, save_baseline, BaselineComparison};
use crate::audit::gate::{evaluate_gate, GateOutcome, GateThresholds};
use crate::audit::history::{HistoryStore, Regression};
use crate::audit::orchestrator::Auditor;
use crate::audit::report::AuditReport;
use crate::audit::webhook::{build_webhook_payload, send_webhook};
use crate::cli::output::{self, Styled};
use crate::cli::progress::AuditProgress;
use crate::config::{ctxlint_home, AuditConfig, SchemaScoring, DEFAULT_BOTS};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Site to audit; `https://` is assumed when no scheme is given
    pub url: String,

    #[arg(long, help = "Audit only the given URL, skipping discovery")]
    pub single_page: bool,

    #[arg(long, default_value_t = 10, help = "Maximum pages to audit (1-100)")]
    pub max_pages: usize,

    #[arg(long, default_value_t = 15, help = "Per-fetch timeout in seconds")]
    pub timeout: u64,

    #[arg(long, help = "Parallel page audits (default: min(max-pages, 8))")]
    pub concurrency: Option<usize>,

    #[arg(long, default_value_t = 3, help = "Attempts per fetch for transient failures")]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 90, help = "Whole-run deadline in seconds")]
    pub deadline: u64,

    #[arg(long, default_value_t = 0, help = "Minimum delay between page fetches in ms")]
    pub delay_ms: u64,

    #[arg(long, value_delimiter = ',', help = "Comma-separated AI bot user agents to check")]
    pub bots: Vec<String>,

    #[arg(long, value_enum, default_value_t = SchemaScoring::Baseline)]
    pub schema_scoring: SchemaScoring,

    #[arg(long, help = "Record this run in the history database")]
    pub save: bool,

    #[arg(long, default_value_t = 5.0, help = "Score drop that counts as a regression")]
    pub regression_threshold: f64,

    #[arg(long, help = "POST a score summary to this URL")]
    pub webhook: Option<String>,

    #[arg(long, help = "Exit 1 if the overall score is below this")]
    pub min_score: Option<f64>,

    #[arg(long)]
    pub min_bot_access: Option<f64>,

    #[arg(long)]
    pub min_llms_file: Option<f64>,

    #[arg(long)]
    pub min_content: Option<f64>,

    #[arg(long)]
    pub min_structured_data: Option<f64>,

    #[arg(long, help = "Exit 3 if context waste exceeds this percentage")]
    pub max_context_waste: Option<f64>,

    #[arg(long, help = "Exit 4 if no llms.txt is found")]
    pub require_llms_txt: bool,

    #[arg(long, help = "Exit 2 if robots.txt is missing or blocks any bot")]
    pub require_bot_access: bool,

    #[arg(long, help = "Exit 2 if robots.txt blocks any bot")]
    pub fail_on_blocked_bots: bool,

    #[arg(long, help = "Compare against a baseline file (exit 1 on regression)")]
    pub baseline: Option<PathBuf>,

    #[arg(long, help = "Write this run's scores as a baseline file")]
    pub save_baseline: Option<PathBuf>,

    #[arg(long, help = "Reuse robots.txt files fetched within this many hours")]
    pub robots_cache_hours: Option<u64>,
}

impl AuditArgs {
    pub fn to_config(&self) -> AuditConfig {
        let mut cfg = AuditConfig::new(&self.url);
        cfg.single_page = self.single_page;
        cfg.max_pages = self.max_pages;
        cfg.timeout_secs = self.timeout;
        cfg.concurrency = self.concurrency;
        cfg.max_attempts = self.max_attempts;
        cfg.run_deadline_secs = self.deadline;
        cfg.delay_ms = self.delay_ms;
        cfg.bots = if self.bots.is_empty() {
            DEFAULT_BOTS.iter().map(|b| b.to_string()).collect()
        } else {
            self.bots.clone()
        };
        cfg.schema_scoring = self.schema_scoring;
        cfg.save = self.save;
        cfg.regression_threshold = self.regression_threshold;
        cfg.webhook = self.webhook.clone();
        cfg.thresholds = GateThresholds {
            overall_min: self.min_score,
            bot_access_min: self.min_bot_access,
            llms_file_min: self.min_llms_file,
            content_min: self.min_content,
            structured_data_min: self.min_structured_data,
            max_context_waste: self.max_context_waste,
            require_llms_txt: self.require_llms_txt,
            require_bot_access: self.require_bot_access,
            fail_on_blocked_bots: self.fail_on_blocked_bots,
        };
        cfg
    }
}

/// Run the audit command and return the process exit code.
pub async fn run(args: &AuditArgs) -> Result<i32> {
    let s = Styled::new();
    let interactive = !output::is_json() && !output::is_quiet();

    let mut auditor = Auditor::new(args.to_config())?;
    if let Some(hours) = args.robots_cache_hours {
        auditor = auditor.with_persistent_robots(ctxlint_home(), Duration::from_secs(hours * 3600));
    }
    let cfg = auditor.config().clone();

    if interactive {
        output::print_header(&s);
    }
    let progress = interactive.then(|| AuditProgress::start(&cfg.url));
    if let Some(p) = &progress {
        auditor = auditor.on_phase(p.phase_fn()).on_progress(p.page_fn());
    }

    let result = auditor.run().await;
    if let Some(p) = progress {
        p.finish();
    }
    let report = result?;

    let regression = if cfg.save {
        let store = HistoryStore::default_store()?;
        let regression =
            store.detect_regression(&report.url, report.overall_score, cfg.regression_threshold)?;
        store.record(&report)?;
        Some(regression)
    } else {
        None
    };

    let comparison = match &args.baseline {
        Some(path) => {
            let baseline = load_baseline(path)?;
            Some(compare_baseline(&report, &baseline, cfg.regression_threshold))
        }
        None => None,
    };

    if let Some(path) = &args.save_baseline {
        save_baseline(&report, path)?;
        if interactive {
            eprintln!("  Baseline saved to {}", path.display());
        }
    }

    if let Some(hook) = &cfg.webhook {
        let regressed = regression.as_ref().is_some_and(|r| r.regressed)
            || comparison.as_ref().is_some_and(BaselineComparison::regressed);
        let payload = build_webhook_payload(&report, regressed);
        if !send_webhook(hook, &payload).await {
            warn!(webhook = %hook, "webhook not delivered");
        }
    }

    let outcome = evaluate_gate(&report, &cfg.thresholds);
    let code = exit_code(&outcome, comparison.as_ref());

    if output::is_json() {
        let mut value = serde_json::to_value(&report)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("gate".into(), serde_json::to_value(&outcome)?);
            obj.insert("exit_code".into(), code.into());
            if let Some(r) = &regression {
                obj.insert("regression".into(), serde_json::to_value(r)?);
            }
            if let Some(c) = &comparison {
                obj.insert("baseline_comparison".into(), serde_json::to_value(c)?);
            }
        }
        output::print_json(&value);
    } else if !output::is_quiet() {
        print_report(&s, &report);
        print_followups(&s, regression.as_ref(), comparison.as_ref());
        let status = if code == 0 { s.green("pass") } else { s.red(&format!("fail (exit {code})")) };
        let detail = match (&outcome, &comparison) {
            (GateOutcome::Pass, Some(c)) if c.regressed() => "baseline regression detected".to_string(),
            _ => outcome.describe(),
        };
        output::print_status(&s, &status, &detail);
    }

    Ok(code)
}

/// Gate code, or 1 when only the baseline comparison failed.
pub fn exit_code(outcome: &GateOutcome, comparison: Option<&BaselineComparison>) -> i32 {
    match outcome {
        GateOutcome::Pass if comparison.is_some_and(BaselineComparison::regressed) => 1,
        _ => outcome.code(),
    }
}

fn print_report(s: &Styled, report: &AuditReport) {
    eprintln!(
        "  {}  {}",
        s.bold(&report.domain),
        s.dim(&format!(
            "{} page(s) audited, {} failed, {}",
            report.pages_audited,
            report.pages_failed,
            output::format_duration_ms(report.duration_ms)
        ))
    );
    eprintln!();

    output::print_section(s, "Readiness");
    let pillars = [
        &report.bot_access.pillar,
        &report.llms_file.pillar,
        &report.content,
        &report.structured_data,
    ];
    for p in pillars {
        eprintln!(
            "    {:<18} {} {:>8}  {}",
            p.name,
            output::score_bar(p.score, p.max, 20),
            s.score(p.score, p.max),
            s.dim(&p.detail)
        );
    }
    eprintln!(
        "    {:<18} {} {:>8}",
        s.bold("overall"),
        output::score_bar(report.overall_score, crate::scoring::OVERALL_MAX, 20),
        s.score(report.overall_score, crate::scoring::OVERALL_MAX)
    );
    if let Some(waste) = report.context_waste_pct {
        eprintln!("    {:<18} {waste:.1}%", "context waste");
    }
    eprintln!();

    let lint_title = if report.lint_passed() { "Lint (all passed)" } else { "Lint" };
    output::print_section(s, lint_title);
    for check in &report.lint {
        let sym = if check.passed { s.ok_sym() } else { s.fail_sym() };
        output::print_check(sym, &check.name, &check.detail);
    }
    eprintln!();

    let method = format!("{:?}", report.discovery.method).to_lowercase();
    output::print_section(s, &format!("Pages (via {method})"));
    for page in &report.pages {
        let sym = if page.is_ok() { s.ok_sym() } else { s.fail_sym() };
        let value = if page.is_ok() {
            format!(
                "content {:.1}  schema {:.1}  {} -> {}",
                page.content.score,
                page.structured_data.score,
                output::format_size(page.raw_bytes as u64),
                output::format_size(page.extracted_bytes as u64)
            )
        } else {
            s.red(page.error.as_deref().unwrap_or("failed"))
        };
        eprintln!("    {sym} {}", page.url);
        output::print_detail(&value);
    }

    if output::is_verbose() && !report.errors.is_empty() {
        eprintln!();
        output::print_section(s, "Errors");
        for err in &report.errors {
            eprintln!("    {} {err}", s.warn_sym());
        }
    }
}

fn print_followups(s: &Styled, regression: Option<&Regression>, comparison: Option<&BaselineComparison>) {
    if let Some(r) = regression {
        eprintln!();
        match r.previous_score {
            Some(prev) if r.regressed => eprintln!(
                "  {} Score dropped {:.1} points since last run ({prev:.1} -> {:.1})",
                s.warn_sym(),
                r.delta,
                r.current_score
            ),
            Some(prev) => eprintln!(
                "  {} Previous score {prev:.1}, now {:.1}",
                s.ok_sym(),
                r.current_score
            ),
            None => eprintln!("  {} First recorded run for this URL", s.ok_sym()),
        }
    }
    if let Some(c) = comparison {
        eprintln!();
        if c.regressed() {
            eprintln!("  {} Baseline regressions:", s.fail_sym());
            for reg in &c.regressions {
                eprintln!(
                    "      {:<16} {:.1} -> {:.1} ({})",
                    reg.pillar,
                    reg.baseline,
                    reg.current,
                    s.red(&format!("-{:.1}", reg.delta))
                );
            }
        } else {
            eprintln!("  {} No regressions against baseline", s.ok_sym());
        }
    }
}
