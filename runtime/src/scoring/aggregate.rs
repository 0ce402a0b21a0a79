//! Depth-weighted aggregation of per-page pillars into one site score.
//!
//! Shallow pages (home, top-level sections) represent a site better than deep
//! leaf pages, so they weigh more: depth 0–1 → 3, depth 2 → 2, deeper → 1.
//! Site-wide pillars are added as-is.

use super::content::{waste_from_tokens, TokenWaste};
use super::{clamp_score, round1, PillarScore, CONTENT_MAX, OVERALL_MAX, SCHEMA_MAX};
use crate::cartography::url_classifier::url_depth;
use serde::{Deserialize, Serialize};

/// Per-page inputs to aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScores<'a> {
    pub url: &'a str,
    pub content: f64,
    pub structured_data: f64,
    pub raw_tokens: usize,
    pub clean_tokens: usize,
}

/// Site-level result of aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAggregate {
    pub content: PillarScore,
    pub structured_data: PillarScore,
    pub overall_score: f64,
    pub pages_scored: usize,
    /// `None` when no page was scored.
    pub token_waste: Option<TokenWaste>,
}

pub fn depth_weight(depth: usize) -> u32 {
    match depth {
        0 | 1 => 3,
        2 => 2,
        _ => 1,
    }
}

/// `Σ(score × weight) / Σ(weight)`, rounded to one decimal; 0 for no input.
///
/// Inputs are summed in a canonical order so that permuting them cannot
/// change the floating-point result.
pub fn weighted_average(items: &[(f64, u32)]) -> f64 {
    let mut sorted: Vec<(f64, u32)> = items.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let total_weight: u32 = sorted.iter().map(|(_, w)| *w).sum();
    if total_weight == 0 {
        return 0.0;
    }
    let weighted_sum: f64 = sorted.iter().map(|(s, w)| s * f64::from(*w)).sum();
    round1(weighted_sum / f64::from(total_weight))
}

/// Combine per-page scores with the site-wide pillars.
pub fn aggregate(pages: &[PageScores<'_>], bot_access: &PillarScore, llms_file: &PillarScore) -> SiteAggregate {
    let weights: Vec<u32> = pages.iter().map(|p| depth_weight(url_depth(p.url))).collect();

    let content_pairs: Vec<(f64, u32)> = pages
        .iter()
        .zip(&weights)
        .map(|(p, w)| (clamp_score(p.content, CONTENT_MAX), *w))
        .collect();
    let schema_pairs: Vec<(f64, u32)> = pages
        .iter()
        .zip(&weights)
        .map(|(p, w)| (clamp_score(p.structured_data, SCHEMA_MAX), *w))
        .collect();

    let content_avg = weighted_average(&content_pairs);
    let schema_avg = weighted_average(&schema_pairs);

    let (content, structured_data) = if pages.is_empty() {
        (
            PillarScore::zero("content", CONTENT_MAX, "no pages audited successfully"),
            PillarScore::zero("structured_data", SCHEMA_MAX, "no pages audited successfully"),
        )
    } else {
        let n = pages.len();
        (
            PillarScore::new(
                "content",
                content_avg,
                CONTENT_MAX,
                format!("weighted average {content_avg} across {n} page(s)"),
            ),
            PillarScore::new(
                "structured_data",
                schema_avg,
                SCHEMA_MAX,
                format!("weighted average {schema_avg} across {n} page(s)"),
            ),
        )
    };

    let overall = clamp_score(bot_access.score, bot_access.max)
        + clamp_score(llms_file.score, llms_file.max)
        + content.score
        + structured_data.score;

    let token_waste = (!pages.is_empty()).then(|| {
        let raw: usize = pages.iter().map(|p| p.raw_tokens).sum();
        let clean: usize = pages.iter().map(|p| p.clean_tokens).sum();
        waste_from_tokens(raw, clean)
    });

    SiteAggregate {
        content,
        structured_data,
        overall_score: round1(clamp_score(overall, OVERALL_MAX)),
        pages_scored: pages.len(),
        token_waste,
    }
}
