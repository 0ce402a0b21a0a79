//! Bot-access pillar: share of AI crawlers robots.txt lets in.

use super::{round1, PillarScore, BOT_ACCESS_MAX};
use crate::cartography::robots_cache::{RobotsCacheEntry, RobotsStatus};

/// `25 × allowed / total`, one decimal; 0 without a robots.txt or bots.
pub fn bot_access_points(robots_found: bool, allowed: usize, total: usize) -> f64 {
    if !robots_found || total == 0 {
        return 0.0;
    }
    round1(BOT_ACCESS_MAX * allowed as f64 / total as f64)
}

pub fn score_bot_access(entry: &RobotsCacheEntry) -> PillarScore {
    let total = entry.bots.len();
    let allowed = entry.bots.iter().filter(|b| b.allowed).count();
    let points = bot_access_points(entry.found(), allowed, total);

    let detail = match &entry.status {
        RobotsStatus::Found => {
            let blocked = entry.blocked_bots();
            let mut detail = format!("{allowed}/{total} AI bots allowed");
            if !blocked.is_empty() {
                let shown: Vec<&str> = blocked.iter().take(3).copied().collect();
                detail.push_str(&format!(" ({} blocked", shown.join(", ")));
                if blocked.len() > shown.len() {
                    detail.push_str(&format!(" and {} more", blocked.len() - shown.len()));
                }
                detail.push(')');
            }
            detail
        }
        RobotsStatus::Missing(reason) => format!("robots.txt not found ({reason})"),
        RobotsStatus::Unparseable(reason) => format!("robots.txt unparseable ({reason})"),
    };

    PillarScore::new("bot_access", points, BOT_ACCESS_MAX, detail)
}
