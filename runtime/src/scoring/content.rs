//! Content density pillar and token-waste estimate.

use super::{round1, PillarScore, CONTENT_MAX};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// `(min_words, base_score)`, evaluated top-down; first match wins.
pub const CONTENT_WORD_TIERS: &[(usize, f64)] = &[(1500, 25.0), (800, 20.0), (400, 15.0), (150, 8.0)];
pub const HEADING_BONUS: f64 = 7.0;
pub const LIST_BONUS: f64 = 5.0;
pub const CODE_BONUS: f64 = 3.0;

/// Chunk sizes (in words) that retrieval pipelines embed well.
const SWEET_SPOT: std::ops::RangeInclusive<usize> = 50..=150;

/// Structural statistics of one page's extracted markdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub word_count: usize,
    pub char_count: usize,
    pub has_headings: bool,
    pub has_lists: bool,
    pub has_code_blocks: bool,
    /// Sections between headings that contain any text.
    pub chunk_count: usize,
    pub avg_chunk_words: usize,
    pub chunks_in_sweet_spot: usize,
}

/// Raw-vs-clean token estimate for one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenWaste {
    pub raw_tokens: usize,
    pub clean_tokens: usize,
    pub waste_pct: f64,
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}\s").expect("heading regex is valid"))
}

fn heading_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}\s.*$").expect("heading line regex is valid"))
}

fn list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[-*+]\s").expect("list regex is valid"))
}

pub fn analyze_content(markdown: &str) -> ContentAnalysis {
    if markdown.trim().is_empty() {
        return ContentAnalysis::default();
    }

    let chunk_words: Vec<usize> = heading_line_re()
        .split(markdown)
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.split_whitespace().count())
        .collect();
    let chunk_count = chunk_words.len();
    let avg_chunk_words = if chunk_count == 0 {
        0
    } else {
        chunk_words.iter().sum::<usize>() / chunk_count
    };

    ContentAnalysis {
        word_count: markdown.split_whitespace().count(),
        char_count: markdown.chars().count(),
        has_headings: heading_re().is_match(markdown),
        has_lists: list_re().is_match(markdown),
        has_code_blocks: markdown.contains("```"),
        chunk_count,
        avg_chunk_words,
        chunks_in_sweet_spot: chunk_words.iter().filter(|w| SWEET_SPOT.contains(w)).count(),
    }
}

/// Word-count tier plus structural bonuses, capped at `CONTENT_MAX`.
pub fn content_points(analysis: &ContentAnalysis) -> f64 {
    let mut score = CONTENT_WORD_TIERS
        .iter()
        .find(|(min_words, _)| analysis.word_count >= *min_words)
        .map(|(_, tier)| *tier)
        .unwrap_or(0.0);
    if analysis.has_headings {
        score += HEADING_BONUS;
    }
    if analysis.has_lists {
        score += LIST_BONUS;
    }
    if analysis.has_code_blocks {
        score += CODE_BONUS;
    }
    score.min(CONTENT_MAX)
}

/// Score a page's extracted markdown.
pub fn score_content(markdown: &str) -> (PillarScore, ContentAnalysis) {
    let analysis = analyze_content(markdown);
    if analysis.word_count == 0 {
        return (
            PillarScore::zero("content", CONTENT_MAX, "no content extracted"),
            analysis,
        );
    }

    let mut detail = format!("{} words", analysis.word_count);
    if analysis.has_headings {
        detail.push_str(", has headings");
    }
    if analysis.has_lists {
        detail.push_str(", has lists");
    }
    if analysis.has_code_blocks {
        detail.push_str(", has code blocks");
    }
    if analysis.chunk_count > 0 {
        detail.push_str(&format!(
            "; {} chunk(s), {} in the {}-{} word range",
            analysis.chunk_count,
            analysis.chunks_in_sweet_spot,
            SWEET_SPOT.start(),
            SWEET_SPOT.end()
        ));
    }

    (
        PillarScore::new("content", content_points(&analysis), CONTENT_MAX, detail),
        analysis,
    )
}

/// Estimate tokens as `chars / 4` and the share lost to markup and boilerplate.
pub fn token_waste(raw_chars: usize, clean_chars: usize) -> TokenWaste {
    waste_from_tokens(raw_chars / 4, clean_chars / 4)
}

/// Waste percentage for already-estimated token counts, floored at 0.
pub fn waste_from_tokens(raw_tokens: usize, clean_tokens: usize) -> TokenWaste {
    let waste_pct = if raw_tokens == 0 {
        0.0
    } else {
        let pct = (raw_tokens as f64 - clean_tokens as f64) / raw_tokens as f64 * 100.0;
        round1(pct.max(0.0))
    };
    TokenWaste {
        raw_tokens,
        clean_tokens,
        waste_pct,
    }
}
