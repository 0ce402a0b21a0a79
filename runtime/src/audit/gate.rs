//! CI gate: turn a report and a set of thresholds into one exit code.
//!
//! Predicates are checked in a fixed order and the first violation decides
//! the outcome, so a run that breaks several thresholds still produces a
//! single deterministic code:
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | pass                                      |
//! | 1    | overall or a pillar score below minimum   |
//! | 2    | a required bot is blocked                 |
//! | 3    | context waste above maximum               |
//! | 4    | llms.txt required but missing             |

use crate::audit::report::AuditReport;
use crate::config::check_range;
use crate::error::ConfigError;
use crate::scoring::{BOT_ACCESS_MAX, CONTENT_MAX, LLMS_FILE_MAX, OVERALL_MAX, SCHEMA_MAX};
use serde::{Deserialize, Serialize};

/// Optional CI thresholds. An unset threshold never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub overall_min: Option<f64>,
    pub bot_access_min: Option<f64>,
    pub llms_file_min: Option<f64>,
    pub content_min: Option<f64>,
    pub structured_data_min: Option<f64>,
    /// Maximum context waste percentage.
    pub max_context_waste: Option<f64>,
    pub require_llms_txt: bool,
    /// Fail when robots.txt is missing or blocks any evaluated bot.
    pub require_bot_access: bool,
    pub fail_on_blocked_bots: bool,
}

impl GateThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("overall_min", self.overall_min, OVERALL_MAX),
            ("bot_access_min", self.bot_access_min, BOT_ACCESS_MAX),
            ("llms_file_min", self.llms_file_min, LLMS_FILE_MAX),
            ("content_min", self.content_min, CONTENT_MAX),
            ("structured_data_min", self.structured_data_min, SCHEMA_MAX),
            ("max_context_waste", self.max_context_waste, 100.0),
        ];
        for (name, value, max) in ranges {
            if let Some(v) = value {
                check_range(name, v, 0.0, max)?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Pass,
    ScoreBelowMinimum {
        pillar: String,
        score: f64,
        minimum: f64,
    },
    BotBlocked {
        blocked: Vec<String>,
        robots_found: bool,
    },
    ContextWasteExceeded {
        waste_pct: f64,
        maximum: f64,
    },
    LlmsFileMissing,
}

impl GateOutcome {
    pub fn code(&self) -> i32 {
        match self {
            GateOutcome::Pass => 0,
            GateOutcome::ScoreBelowMinimum { .. } => 1,
            GateOutcome::BotBlocked { .. } => 2,
            GateOutcome::ContextWasteExceeded { .. } => 3,
            GateOutcome::LlmsFileMissing => 4,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, GateOutcome::Pass)
    }

    pub fn describe(&self) -> String {
        match self {
            GateOutcome::Pass => "all thresholds met".to_string(),
            GateOutcome::ScoreBelowMinimum {
                pillar,
                score,
                minimum,
            } => format!("{pillar} score {score} is below minimum {minimum}"),
            GateOutcome::BotBlocked {
                blocked,
                robots_found,
            } => {
                if !robots_found {
                    "robots.txt not found; bot access cannot be confirmed".to_string()
                } else {
                    format!("blocked bots: {}", blocked.join(", "))
                }
            }
            GateOutcome::ContextWasteExceeded { waste_pct, maximum } => {
                format!("context waste {waste_pct}% exceeds maximum {maximum}%")
            }
            GateOutcome::LlmsFileMissing => "llms.txt required but not found".to_string(),
        }
    }
}

/// Apply `thresholds` to `report` in precedence order.
pub fn evaluate_gate(report: &AuditReport, thresholds: &GateThresholds) -> GateOutcome {
    let minimums = [
        ("overall", report.overall_score, thresholds.overall_min),
        ("bot_access", report.bot_access.pillar.score, thresholds.bot_access_min),
        ("llms_file", report.llms_file.pillar.score, thresholds.llms_file_min),
        ("content", report.content.score, thresholds.content_min),
        ("structured_data", report.structured_data.score, thresholds.structured_data_min),
    ];
    for (pillar, score, minimum) in minimums {
        if let Some(minimum) = minimum {
            if score < minimum {
                return GateOutcome::ScoreBelowMinimum {
                    pillar: pillar.to_string(),
                    score,
                    minimum,
                };
            }
        }
    }

    let blocked: Vec<String> = report.blocked_bots().into_iter().map(String::from).collect();
    let robots_found = report.robots_found();
    let any_blocked = !blocked.is_empty();
    if (thresholds.fail_on_blocked_bots && any_blocked)
        || (thresholds.require_bot_access && (any_blocked || !robots_found))
    {
        return GateOutcome::BotBlocked {
            blocked,
            robots_found,
        };
    }

    if let (Some(maximum), Some(waste_pct)) = (thresholds.max_context_waste, report.context_waste_pct) {
        if waste_pct > maximum {
            return GateOutcome::ContextWasteExceeded { waste_pct, maximum };
        }
    }

    if thresholds.require_llms_txt && !report.llms_present() {
        return GateOutcome::LlmsFileMissing;
    }

    GateOutcome::Pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::report::tests::sample_report;

    #[test]
    fn test_pass_without_thresholds() {
        let report = sample_report();
        assert_eq!(evaluate_gate(&report, &GateThresholds::default()), GateOutcome::Pass);
    }

    #[test]
    fn test_overall_minimum() {
        let report = sample_report();
        let t = GateThresholds {
            overall_min: Some(report.overall_score + 1.0),
            ..GateThresholds::default()
        };
        assert_eq!(evaluate_gate(&report, &t).code(), 1);
    }

    #[test]
    fn test_pillar_minimum_order() {
        let report = sample_report();
        let t = GateThresholds {
            content_min: Some(40.0),
            bot_access_min: Some(25.0),
            ..GateThresholds::default()
        };
        match evaluate_gate(&report, &t) {
            GateOutcome::ScoreBelowMinimum { pillar, .. } => assert_eq!(pillar, "bot_access"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_precedence_when_everything_fails() {
        let report = sample_report();
        let t = GateThresholds {
            overall_min: Some(100.0),
            max_context_waste: Some(0.0),
            require_llms_txt: true,
            fail_on_blocked_bots: true,
            ..GateThresholds::default()
        };
        assert_eq!(evaluate_gate(&report, &t).code(), 1);

        let t = GateThresholds {
            overall_min: None,
            ..t
        };
        assert_eq!(evaluate_gate(&report, &t).code(), 2);

        let t = GateThresholds {
            fail_on_blocked_bots: false,
            ..t
        };
        assert_eq!(evaluate_gate(&report, &t).code(), 3);

        let t = GateThresholds {
            max_context_waste: None,
            ..t
        };
        assert_eq!(evaluate_gate(&report, &t).code(), 4);
    }

    #[test]
    fn test_require_bot_access_with_missing_robots() {
        let mut report = sample_report();
        report.set_robots_missing();
        let t = GateThresholds {
            require_bot_access: true,
            ..GateThresholds::default()
        };
        let outcome = evaluate_gate(&report, &t);
        assert_eq!(outcome.code(), 2);
        assert!(outcome.describe().contains("robots.txt not found"));

        // fail_on_blocked_bots alone does not fail on a missing file
        let t = GateThresholds {
            fail_on_blocked_bots: true,
            ..GateThresholds::default()
        };
        assert!(evaluate_gate(&report, &t).passed());
    }

    #[test]
    fn test_waste_without_pages_never_fails() {
        let mut report = sample_report();
        report.context_waste_pct = None;
        let t = GateThresholds {
            max_context_waste: Some(0.0),
            ..GateThresholds::default()
        };
        assert!(evaluate_gate(&report, &t).passed());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(GateThresholds::default().validate().is_ok());
        let t = GateThresholds {
            content_min: Some(41.0),
            ..GateThresholds::default()
        };
        assert!(matches!(
            t.validate(),
            Err(ConfigError::OutOfRange { name: "content_min", .. })
        ));
        let t = GateThresholds {
            max_context_waste: Some(-1.0),
            ..GateThresholds::default()
        };
        assert!(t.validate().is_err());
    }
}
