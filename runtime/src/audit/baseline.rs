//! File-based baselines: save a run's scores as JSON and compare later runs to it.

use crate::audit::history::HistoryEntry;
use crate::audit::report::AuditReport;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Same fields as a history record.
pub type Baseline = HistoryEntry;

/// A pillar (or the overall score) that dropped by at least the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarRegression {
    pub pillar: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub threshold: f64,
    pub regressions: Vec<PillarRegression>,
}

impl BaselineComparison {
    pub fn regressed(&self) -> bool {
        !self.regressions.is_empty()
    }
}

pub fn save_baseline(report: &AuditReport, path: &Path) -> Result<Baseline> {
    let baseline = HistoryEntry::from_report(report);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&baseline)?;
    std::fs::write(path, json).with_context(|| format!("failed to write baseline: {}", path.display()))?;
    Ok(baseline)
}

pub fn load_baseline(path: &Path) -> Result<Baseline> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read baseline: {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid baseline file: {}", path.display()))
}

/// Every pillar whose score fell by `threshold` or more since `baseline`.
pub fn compare_baseline(report: &AuditReport, baseline: &Baseline, threshold: f64) -> BaselineComparison {
    let current = HistoryEntry::from_report(report);
    let pairs = [
        ("overall", baseline.overall_score, current.overall_score),
        ("bot_access", baseline.bot_access, current.bot_access),
        ("llms_file", baseline.llms_file, current.llms_file),
        ("content", baseline.content, current.content),
        ("structured_data", baseline.structured_data, current.structured_data),
    ];
    let regressions = pairs
        .into_iter()
        .filter_map(|(pillar, before, now)| {
            let delta = crate::scoring::round1(before - now);
            (delta > 0.0 && delta >= threshold).then(|| PillarRegression {
                pillar: pillar.to_string(),
                baseline: before,
                current: now,
                delta,
            })
        })
        .collect();
    BaselineComparison {
        threshold,
        regressions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::report::tests::sample_report;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        let report = sample_report();
        let saved = save_baseline(&report, &path).unwrap();
        let loaded = load_baseline(&path).unwrap();
        assert_eq!(saved, loaded);

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["url"], "https://example.com/");
        assert_eq!(raw["context_waste_pct"], 75.0);
    }

    #[test]
    fn test_compare_finds_drops() {
        let report = sample_report();
        let mut baseline = HistoryEntry::from_report(&report);
        baseline.overall_score += 10.0;
        baseline.content += 3.0;
        baseline.structured_data -= 5.0;

        let cmp = compare_baseline(&report, &baseline, 5.0);
        assert!(cmp.regressed());
        let pillars: Vec<&str> = cmp.regressions.iter().map(|r| r.pillar.as_str()).collect();
        assert_eq!(pillars, vec!["overall"]);

        let cmp = compare_baseline(&report, &baseline, 2.0);
        assert_eq!(cmp.regressions.len(), 2);
    }

    #[test]
    fn test_zero_threshold_ignores_unchanged() {
        let report = sample_report();
        let baseline = HistoryEntry::from_report(&report);
        assert!(!compare_baseline(&report, &baseline, 0.0).regressed());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_baseline(Path::new("/nonexistent/baseline.json")).is_err());
    }
}
