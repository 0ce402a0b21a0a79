//! Score history backed by SQLite, and regression detection against it.

use crate::audit::report::AuditReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One recorded run. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub bot_access: f64,
    pub llms_file: f64,
    pub content: f64,
    pub structured_data: f64,
    pub context_waste_pct: Option<f64>,
}

impl HistoryEntry {
    pub fn from_report(report: &AuditReport) -> Self {
        Self {
            url: report.url.clone(),
            timestamp: report.started_at,
            overall_score: report.overall_score,
            bot_access: report.bot_access.pillar.score,
            llms_file: report.llms_file.pillar.score,
            content: report.content.score,
            structured_data: report.structured_data.score,
            context_waste_pct: report.context_waste_pct,
        }
    }
}

/// Comparison of a run against the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub regressed: bool,
    pub previous_score: Option<f64>,
    pub current_score: f64,
    /// `previous - current`; positive means the score dropped.
    pub delta: f64,
    pub threshold: f64,
}

impl Regression {
    /// `regressed` iff the drop from `previous` is at least `threshold`.
    pub fn compare(previous: Option<f64>, current: f64, threshold: f64) -> Self {
        let delta = previous.map(|p| p - current).unwrap_or(0.0);
        Self {
            regressed: previous.is_some() && delta >= threshold,
            previous_score: previous,
            current_score: current,
            delta,
            threshold,
        }
    }
}

pub struct HistoryStore {
    db: Connection,
}

impl HistoryStore {
    /// Open or create a history database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open history db: {}", path.display()))?;
        Self::init(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open the default store at `<data dir>/history.db`.
    pub fn default_store() -> Result<Self> {
        Self::open(&crate::config::ctxlint_home().join("history.db"))
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                overall_score REAL NOT NULL,
                bot_access REAL NOT NULL,
                llms_file REAL NOT NULL,
                content REAL NOT NULL,
                structured_data REAL NOT NULL,
                context_waste_pct REAL
            );
            CREATE INDEX IF NOT EXISTS idx_history_url_ts ON history (url, timestamp);",
        )
        .context("failed to create history table")?;
        Ok(Self { db })
    }

    /// Append a snapshot of `report`.
    pub fn record(&self, report: &AuditReport) -> Result<HistoryEntry> {
        let entry = HistoryEntry::from_report(report);
        self.insert(&entry)?;
        Ok(entry)
    }

    pub fn insert(&self, entry: &HistoryEntry) -> Result<()> {
        self.db.execute(
            "INSERT INTO history
                (url, timestamp, overall_score, bot_access, llms_file, content, structured_data, context_waste_pct)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                entry.url,
                entry.timestamp.to_rfc3339(),
                entry.overall_score,
                entry.bot_access,
                entry.llms_file,
                entry.content,
                entry.structured_data,
                entry.context_waste_pct,
            ],
        )?;
        Ok(())
    }

    /// Most recent entry for `url`.
    pub fn latest(&self, url: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.list(url, 1)?.into_iter().next())
    }

    /// Up to `limit` entries for `url`, newest first.
    pub fn list(&self, url: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.db.prepare(
            "SELECT url, timestamp, overall_score, bot_access, llms_file, content, structured_data, context_waste_pct
             FROM history WHERE url = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![url, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(url, ts, overall_score, bot_access, llms_file, content, structured_data, context_waste_pct)| {
                    let timestamp = DateTime::parse_from_rfc3339(&ts)
                        .with_context(|| format!("bad timestamp in history: {ts}"))?
                        .with_timezone(&Utc);
                    Ok(HistoryEntry {
                        url,
                        timestamp,
                        overall_score,
                        bot_access,
                        llms_file,
                        content,
                        structured_data,
                        context_waste_pct,
                    })
                },
            )
            .collect()
    }

    /// Compare `current` against the newest entry recorded for `url`.
    ///
    /// Call before `record` for the current run; without a prior entry the
    /// result is not a regression.
    pub fn detect_regression(&self, url: &str, current: f64, threshold: f64) -> Result<Regression> {
        let previous = self.latest(url)?.map(|e| e.overall_score);
        Ok(Regression::compare(previous, current, threshold))
    }

    pub fn count(&self, url: &str) -> Result<usize> {
        let n: i64 = self
            .db
            .query_row(
                "SELECT COUNT(*) FROM history WHERE url = ?1",
                rusqlite::params![url],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::report::tests::sample_report;
    use chrono::Duration;

    fn entry(url: &str, score: f64, minutes_ago: i64) -> HistoryEntry {
        HistoryEntry {
            url: url.to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            overall_score: score,
            bot_access: 25.0,
            llms_file: 10.0,
            content: 20.0,
            structured_data: score - 55.0,
            context_waste_pct: Some(40.0),
        }
    }

    #[test]
    fn test_regression_thresholds() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.insert(&entry("https://a.com/", 70.0, 10)).unwrap();

        let r = store.detect_regression("https://a.com/", 60.0, 5.0).unwrap();
        assert!(r.regressed);
        assert_eq!(r.delta, 10.0);

        let r = store.detect_regression("https://a.com/", 60.0, 15.0).unwrap();
        assert!(!r.regressed);
    }

    #[test]
    fn test_no_prior_entry_is_not_regression() {
        let store = HistoryStore::open_in_memory().unwrap();
        let r = store.detect_regression("https://new.com/", 10.0, 0.0).unwrap();
        assert!(!r.regressed);
        assert_eq!(r.previous_score, None);
    }

    #[test]
    fn test_latest_uses_most_recent() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.insert(&entry("https://a.com/", 80.0, 30)).unwrap();
        store.insert(&entry("https://a.com/", 65.0, 5)).unwrap();
        store.insert(&entry("https://b.com/", 10.0, 1)).unwrap();

        let latest = store.latest("https://a.com/").unwrap().unwrap();
        assert_eq!(latest.overall_score, 65.0);
        assert_eq!(store.list("https://a.com/", 10).unwrap().len(), 2);
        assert_eq!(store.count("https://b.com/").unwrap(), 1);
    }

    #[test]
    fn test_record_report_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let report = sample_report();
        {
            let store = HistoryStore::open(&path).unwrap();
            store.record(&report).unwrap();
        }
        let store = HistoryStore::open(&path).unwrap();
        let latest = store.latest(&report.url).unwrap().unwrap();
        assert_eq!(latest, HistoryEntry::from_report(&report));
    }
}
