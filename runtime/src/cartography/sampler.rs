//! Diversity sampling: choose which discovered pages to audit.

use crate::cartography::url_classifier::{page_key, top_level_section};
use std::collections::{HashMap, HashSet};

/// Select up to `max_pages` URLs, seed first.
///
/// Strategy:
/// - The seed URL is always the first entry and appears exactly once
/// - Remaining candidates are grouped by top-level path section
/// - Sections are visited round-robin in order of first appearance, so one
///   prolific section cannot crowd out the others
pub fn select_samples(seed: &str, candidates: &[String], max_pages: usize) -> Vec<String> {
    if max_pages == 0 {
        return Vec::new();
    }

    let key_of = |u: &str| page_key(u).unwrap_or_else(|| u.to_string());
    let mut seen = HashSet::new();
    seen.insert(key_of(seed));

    let mut selected = Vec::with_capacity(max_pages.min(candidates.len() + 1));
    selected.push(seed.to_string());

    // Group by section, preserving discovery order within and across groups.
    let mut order: Vec<String> = Vec::new();
    let mut by_section: HashMap<String, Vec<&String>> = HashMap::new();
    for url in candidates {
        if !seen.insert(key_of(url)) {
            continue;
        }
        let section = top_level_section(url);
        if !by_section.contains_key(&section) {
            order.push(section.clone());
        }
        by_section.entry(section).or_default().push(url);
    }

    let mut round = 0;
    loop {
        let mut took_any = false;
        for section in &order {
            if selected.len() >= max_pages {
                return selected;
            }
            if let Some(url) = by_section.get(section).and_then(|urls| urls.get(round)) {
                selected.push((*url).clone());
                took_any = true;
            }
        }
        if !took_any {
            break;
        }
        round += 1;
    }

    selected
}
