//! `ctxlint history <url>`: list recorded runs for a URL, newest first.

use crate::audit::history::HistoryStore;
use crate::cli::output::{self, Styled};
use crate::config::normalize_target;
use anyhow::Result;

pub fn run(url: &str, limit: usize) -> Result<()> {
    let url = normalize_target(url)?;
    let store = HistoryStore::default_store()?;
    let entries = store.list(&url, limit)?;

    if output::is_json() {
        output::print_json(&serde_json::to_value(&entries)?);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    let s = Styled::new();
    if entries.is_empty() {
        eprintln!("  No history for {url}. Record runs with: ctxlint audit {url} --save");
        return Ok(());
    }

    output::print_section(&s, &format!("History for {url}"));
    eprintln!(
        "    {:<20} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "timestamp", "overall", "bots", "llms", "content", "schema", "waste"
    );
    for e in &entries {
        let waste = e
            .context_waste_pct
            .map(|w| format!("{w:.1}%"))
            .unwrap_or_else(|| "-".to_string());
        eprintln!(
            "    {:<20} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>8}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            e.overall_score,
            e.bot_access,
            e.llms_file,
            e.content,
            e.structured_data,
            waste
        );
    }
    Ok(())
}
