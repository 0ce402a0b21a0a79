//! Audit configuration: every recognized option in one record, validated once
//! before the engine touches the network.

use crate::audit::gate::GateThresholds;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// AI crawler user agents evaluated against robots.txt by default.
pub const DEFAULT_BOTS: &[&str] = &[
    "GPTBot",
    "ChatGPT-User",
    "Google-Extended",
    "ClaudeBot",
    "PerplexityBot",
    "Amazonbot",
    "OAI-SearchBot",
    "DeepSeek-AI",
    "Grok",
    "Meta-ExternalAgent",
    "cohere-ai",
    "AI2Bot",
    "ByteSpider",
];

/// Upper bound on parallel page audits regardless of `max_pages`.
pub const CONCURRENCY_CEILING: usize = 8;

/// User agent token used for our own crawling decisions (discovery filter).
pub const CRAWLER_AGENT: &str = "ctxlint";

/// How the structured-data pillar values schema types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SchemaScoring {
    /// `min(25, 8 + 5 × unique_types)`.
    #[default]
    Baseline,
    /// High-value types (FAQPage, HowTo, Article, Product, Recipe) +5, others +3.
    WeightedTypes,
}

/// All options for one audit run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub url: String,
    pub single_page: bool,
    pub max_pages: usize,
    pub timeout_secs: u64,
    /// Parallel page audits; `None` means `min(max_pages, CONCURRENCY_CEILING)`.
    pub concurrency: Option<usize>,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub run_deadline_secs: u64,
    /// Minimum delay between page fetches.
    pub delay_ms: u64,
    pub bots: Vec<String>,
    pub crawler_agent: String,
    pub schema_scoring: SchemaScoring,
    pub thresholds: GateThresholds,
    pub save: bool,
    pub regression_threshold: f64,
    pub webhook: Option<String>,
}

impl AuditConfig {
    /// Defaults for every option, targeting `url`.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            single_page: false,
            max_pages: 10,
            timeout_secs: 15,
            concurrency: None,
            max_attempts: 3,
            backoff_base_ms: 250,
            backoff_cap_ms: 4_000,
            run_deadline_secs: 90,
            delay_ms: 0,
            bots: DEFAULT_BOTS.iter().map(|b| b.to_string()).collect(),
            crawler_agent: CRAWLER_AGENT.to_string(),
            schema_scoring: SchemaScoring::Baseline,
            thresholds: GateThresholds::default(),
            save: false,
            regression_threshold: 5.0,
            webhook: None,
        }
    }

    /// Normalize and check every option. Scheme-less URLs get `https://`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.url = normalize_target(&self.url)?;

        check_range("max_pages", self.max_pages as f64, 1.0, 100.0)?;
        check_range("timeout", self.timeout_secs as f64, 1.0, 300.0)?;
        check_range("max_attempts", self.max_attempts as f64, 1.0, 10.0)?;
        check_range("run_deadline", self.run_deadline_secs as f64, 1.0, 3600.0)?;
        check_range("regression_threshold", self.regression_threshold, 0.0, 100.0)?;
        if let Some(c) = self.concurrency {
            check_range("concurrency", c as f64, 1.0, 32.0)?;
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(ConfigError::OutOfRange {
                name: "backoff_cap_ms",
                value: self.backoff_cap_ms as f64,
                min: self.backoff_base_ms as f64,
                max: f64::MAX,
            });
        }

        if self.bots.is_empty() {
            return Err(ConfigError::EmptyBotList);
        }
        for bot in &mut self.bots {
            let trimmed = bot.trim();
            if trimmed.is_empty()
                || trimmed.contains(|c: char| c.is_whitespace() || c == ':' || c == '#')
            {
                return Err(ConfigError::InvalidBot(bot.clone()));
            }
            *bot = trimmed.to_string();
        }

        self.thresholds.validate()?;

        if let Some(hook) = &self.webhook {
            match url::Url::parse(hook) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                _ => return Err(ConfigError::InvalidWebhook(hook.clone())),
            }
        }

        Ok(self)
    }

    /// Worker count for the page-audit pool.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| self.max_pages.min(CONCURRENCY_CEILING))
            .max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

pub(crate) fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Prefix a scheme when missing and require an http(s) URL with a host.
pub fn normalize_target(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed =
        url::Url::parse(&with_scheme).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(parsed.to_string())
}

/// Data directory for history and cached robots files (`$CTXLINT_HOME` or `~/.ctxlint`).
pub fn ctxlint_home() -> PathBuf {
    if let Ok(p) = std::env::var("CTXLINT_HOME") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".ctxlint")
}
