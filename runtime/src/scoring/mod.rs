//! Pillar scorers and depth-weighted aggregation.
//!
//! Every scorer is a pure function over content that has already been
//! fetched; network probes live with their callers.
//!
//! | Pillar            | Max | Scope     |
//! |-------------------|-----|-----------|
//! | Content density   | 40  | per page  |
//! | Structured data   | 25  | per page  |
//! | Bot access        | 25  | site-wide |
//! | LLM instructions  | 10  | site-wide |

pub mod aggregate;
pub mod bot_access;
pub mod content;
pub mod llms_txt;
pub mod schema;

use serde::{Deserialize, Serialize};

pub const CONTENT_MAX: f64 = 40.0;
pub const SCHEMA_MAX: f64 = 25.0;
pub const BOT_ACCESS_MAX: f64 = 25.0;
pub const LLMS_FILE_MAX: f64 = 10.0;
/// Sum of all pillar maxima.
pub const OVERALL_MAX: f64 = CONTENT_MAX + SCHEMA_MAX + BOT_ACCESS_MAX + LLMS_FILE_MAX;

/// One scored pillar. `0 <= score <= max` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub name: String,
    pub score: f64,
    pub max: f64,
    pub detail: String,
}

impl PillarScore {
    /// Build a score, clamping into `[0, max]`.
    pub fn new(name: &str, score: f64, max: f64, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            score: clamp_score(score, max),
            max,
            detail: detail.into(),
        }
    }

    pub fn zero(name: &str, max: f64, detail: impl Into<String>) -> Self {
        Self::new(name, 0.0, max, detail)
    }
}

/// Clamp into `[0, max]`; NaN becomes 0.
pub fn clamp_score(score: f64, max: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, max)
}

/// Round to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
