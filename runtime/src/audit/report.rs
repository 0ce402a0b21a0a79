//! Audit report data model.

use crate::cartography::discovery::DiscoveryResult;
use crate::cartography::robots_cache::BotAccess;
use crate::scoring::content::{ContentAnalysis, TokenWaste};
use crate::scoring::llms_txt::LlmsFileReport;
use crate::scoring::PillarScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Waste at or above this share fails the token-efficiency lint.
pub const TOKEN_EFFICIENCY_LIMIT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Ok,
    FetchError,
    ParseError,
    Timeout,
}

/// Outcome of auditing one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    /// Non-empty path segments.
    pub depth: usize,
    pub status: PageStatus,
    pub http_status: Option<u16>,
    pub raw_bytes: usize,
    pub extracted_bytes: usize,
    pub content: PillarScore,
    pub structured_data: PillarScore,
    pub content_analysis: ContentAnalysis,
    pub schema_blocks: usize,
    pub schema_types: Vec<String>,
    pub token_waste: TokenWaste,
    pub error: Option<String>,
}

impl PageResult {
    pub fn is_ok(&self) -> bool {
        self.status == PageStatus::Ok
    }
}

/// What robots.txt said about each AI bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotAccessEvidence {
    pub robots_found: bool,
    pub robots_url: String,
    pub bots: Vec<BotAccess>,
}

/// A pillar computed once per site and shared by every page of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteWidePillar<E> {
    pub pillar: PillarScore,
    pub evidence: E,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Final result of one audit run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub url: String,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub discovery: DiscoveryResult,
    pub bot_access: SiteWidePillar<BotAccessEvidence>,
    pub llms_file: SiteWidePillar<LlmsFileReport>,
    /// Depth-weighted average over successfully audited pages.
    pub content: PillarScore,
    /// Depth-weighted average over successfully audited pages.
    pub structured_data: PillarScore,
    pub overall_score: f64,
    /// `None` when no page was audited successfully.
    pub context_waste_pct: Option<f64>,
    pub token_waste: Option<TokenWaste>,
    pub pages: Vec<PageResult>,
    pub errors: Vec<String>,
    pub pages_audited: usize,
    pub pages_failed: usize,
    pub deadline_exceeded: bool,
    pub lint: Vec<LintCheck>,
}

impl AuditReport {
    pub fn robots_found(&self) -> bool {
        self.bot_access.evidence.robots_found
    }

    pub fn bots(&self) -> &[BotAccess] {
        &self.bot_access.evidence.bots
    }

    /// Bots denied by a robots.txt that was found.
    pub fn blocked_bots(&self) -> Vec<&str> {
        if !self.robots_found() {
            return Vec::new();
        }
        self.bots()
            .iter()
            .filter(|b| !b.allowed)
            .map(|b| b.bot.as_str())
            .collect()
    }

    pub fn llms_present(&self) -> bool {
        self.llms_file.evidence.present()
    }

    pub fn schema_blocks(&self) -> usize {
        self.pages.iter().filter(|p| p.is_ok()).map(|p| p.schema_blocks).sum()
    }

    pub fn lint_passed(&self) -> bool {
        self.lint.iter().all(|c| c.passed)
    }
}

/// Pass/fail checks derived from final scores.
pub fn compute_lint_checks(report: &AuditReport) -> Vec<LintCheck> {
    let mut checks = Vec::with_capacity(4);

    let llms = report.llms_present();
    checks.push(LintCheck {
        name: "AI Primitives".to_string(),
        passed: llms,
        detail: if llms { "llms.txt found" } else { "no llms.txt found" }.to_string(),
    });

    let (bot_pass, bot_detail) = if report.robots_found() {
        let blocked = report.blocked_bots();
        let total = report.bots().len();
        let mut detail = format!("{}/{total} AI bots allowed", total - blocked.len());
        if !blocked.is_empty() {
            let shown: Vec<&str> = blocked.iter().take(3).copied().collect();
            detail.push_str(&format!(" ({} blocked)", shown.join(", ")));
        }
        (blocked.is_empty(), detail)
    } else {
        (false, "no robots.txt found".to_string())
    };
    checks.push(LintCheck {
        name: "Bot Access".to_string(),
        passed: bot_pass,
        detail: bot_detail,
    });

    let blocks = report.schema_blocks();
    let mut types: Vec<&str> = report
        .pages
        .iter()
        .filter(|p| p.is_ok())
        .flat_map(|p| p.schema_types.iter().map(String::as_str))
        .collect();
    types.sort_unstable();
    types.dedup();
    let mut schema_detail = format!("{blocks} JSON-LD block(s)");
    if !types.is_empty() {
        let shown: Vec<&str> = types.iter().take(3).copied().collect();
        schema_detail.push_str(&format!(" ({})", shown.join(", ")));
    }
    checks.push(LintCheck {
        name: "Data Structuring".to_string(),
        passed: blocks > 0,
        detail: schema_detail,
    });

    let (eff_pass, eff_detail) = match (report.context_waste_pct, report.token_waste) {
        (Some(waste), Some(tokens)) => (
            waste < TOKEN_EFFICIENCY_LIMIT,
            format!(
                "{waste:.0}% context waste ({} raw -> {} clean tokens)",
                tokens.raw_tokens, tokens.clean_tokens
            ),
        ),
        _ => (false, "no pages audited".to_string()),
    };
    checks.push(LintCheck {
        name: "Token Efficiency".to_string(),
        passed: eff_pass,
        detail: eff_detail,
    });

    checks
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cartography::discovery::DiscoveryMethod;
    use crate::scoring::{BOT_ACCESS_MAX, CONTENT_MAX, LLMS_FILE_MAX, SCHEMA_MAX};

    impl AuditReport {
        pub(crate) fn set_robots_missing(&mut self) {
            self.bot_access = SiteWidePillar {
                pillar: PillarScore::zero("bot_access", BOT_ACCESS_MAX, "robots.txt not found"),
                evidence: BotAccessEvidence {
                    robots_found: false,
                    robots_url: "https://example.com/robots.txt".into(),
                    bots: Vec::new(),
                },
            };
        }
    }

    fn ok_page(url: &str, content: f64, schema: f64, types: &[&str]) -> PageResult {
        PageResult {
            url: url.to_string(),
            depth: crate::cartography::url_classifier::url_depth(url),
            status: PageStatus::Ok,
            http_status: Some(200),
            raw_bytes: 4000,
            extracted_bytes: 1000,
            content: PillarScore::new("content", content, CONTENT_MAX, ""),
            structured_data: PillarScore::new("structured_data", schema, SCHEMA_MAX, ""),
            content_analysis: ContentAnalysis::default(),
            schema_blocks: types.len(),
            schema_types: types.iter().map(|t| t.to_string()).collect(),
            token_waste: TokenWaste {
                raw_tokens: 1000,
                clean_tokens: 250,
                waste_pct: 75.0,
            },
            error: None,
        }
    }

    /// Robots found with GPTBot blocked, no llms.txt, 75% waste.
    pub(crate) fn sample_report() -> AuditReport {
        let bots = vec![
            BotAccess {
                bot: "GPTBot".into(),
                allowed: false,
                detail: "Blocked by robots.txt".into(),
            },
            BotAccess {
                bot: "ClaudeBot".into(),
                allowed: true,
                detail: "Allowed".into(),
            },
        ];
        let mut report = AuditReport {
            run_id: Uuid::new_v4(),
            url: "https://example.com/".into(),
            domain: "example.com".into(),
            started_at: Utc::now(),
            duration_ms: 1200,
            discovery: DiscoveryResult {
                method: DiscoveryMethod::Sitemap,
                urls_found: 2,
                urls_sampled: vec!["https://example.com/".into(), "https://example.com/docs".into()],
                detail: String::new(),
                errors: Vec::new(),
            },
            bot_access: SiteWidePillar {
                pillar: PillarScore::new("bot_access", 12.5, BOT_ACCESS_MAX, "1/2 AI bots allowed"),
                evidence: BotAccessEvidence {
                    robots_found: true,
                    robots_url: "https://example.com/robots.txt".into(),
                    bots,
                },
            },
            llms_file: SiteWidePillar {
                pillar: PillarScore::zero("llms_file", LLMS_FILE_MAX, "llms.txt not found"),
                evidence: LlmsFileReport::default(),
            },
            content: PillarScore::new("content", 30.0, CONTENT_MAX, ""),
            structured_data: PillarScore::new("structured_data", 13.0, SCHEMA_MAX, ""),
            overall_score: 55.5,
            context_waste_pct: Some(75.0),
            token_waste: Some(TokenWaste {
                raw_tokens: 2000,
                clean_tokens: 500,
                waste_pct: 75.0,
            }),
            pages: vec![
                ok_page("https://example.com/", 30.0, 13.0, &["Organization"]),
                ok_page("https://example.com/docs", 30.0, 13.0, &["Article"]),
            ],
            errors: Vec::new(),
            pages_audited: 2,
            pages_failed: 0,
            deadline_exceeded: false,
            lint: Vec::new(),
        };
        report.lint = compute_lint_checks(&report);
        report
    }

    #[test]
    fn test_lint_checks() {
        let report = sample_report();
        let names: Vec<&str> = report.lint.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["AI Primitives", "Bot Access", "Data Structuring", "Token Efficiency"]
        );
        assert!(!report.lint[0].passed);
        assert!(!report.lint[1].passed);
        assert!(report.lint[1].detail.contains("1/2"));
        assert!(report.lint[2].passed);
        assert!(report.lint[2].detail.contains("Article, Organization"));
        assert!(!report.lint[3].passed);
        assert!(!report.lint_passed());
    }

    #[test]
    fn test_blocked_bots_require_found_robots() {
        let mut report = sample_report();
        assert_eq!(report.blocked_bots(), vec!["GPTBot"]);
        report.set_robots_missing();
        assert!(report.blocked_bots().is_empty());
        assert!(!report.robots_found());
    }

    #[test]
    fn test_report_serializes() {
        let report = sample_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bot_access"]["evidence"]["robots_found"], true);
        assert_eq!(json["bot_access"]["evidence"]["bots"][0]["bot"], "GPTBot");
        assert_eq!(json["pages"][0]["status"], "ok");
        assert_eq!(json["discovery"]["method"], "sitemap");
    }
}
