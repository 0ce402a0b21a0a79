//! Parse robots.txt files and evaluate user agents against them.

use serde::{Deserialize, Serialize};

/// A single allow/disallow line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotsRule {
    pub allow: bool,
    pub pattern: String,
}

/// Rules shared by one or more consecutive `User-agent` lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotsGroup {
    /// Lowercased user-agent tokens.
    pub agents: Vec<String>,
    pub rules: Vec<RobotsRule>,
    pub crawl_delay: Option<f32>,
}

/// Parsed robots.txt with every group kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotsTxt {
    pub groups: Vec<RobotsGroup>,
    pub sitemaps: Vec<String>,
}

/// The body was not a robots.txt file (e.g. an HTML soft-404).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("robots.txt is not a plain-text rules file: {0}")]
pub struct RobotsParseError(pub String);

impl RobotsTxt {
    /// Rules that apply to `user_agent`: its own groups, else the `*` groups.
    fn rules_for(&self, user_agent: &str) -> Vec<&RobotsRule> {
        let ua = user_agent.to_lowercase();
        let specific: Vec<&RobotsGroup> = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == &ua))
            .collect();
        let groups = if specific.is_empty() {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            specific
        };
        groups.into_iter().flat_map(|g| g.rules.iter()).collect()
    }

    /// Whether `user_agent` may fetch `path`.
    ///
    /// The longest matching pattern decides; among equally long matches the
    /// last one in file order wins. No matching rule means allowed.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        let mut best: Option<(usize, bool)> = None;
        for rule in self.rules_for(user_agent) {
            if !path_matches(path, &rule.pattern) {
                continue;
            }
            let len = rule.pattern.len();
            match best {
                Some((best_len, _)) if len < best_len => {}
                _ => best = Some((len, rule.allow)),
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    /// Crawl delay declared for `user_agent` (or `*`).
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f32> {
        let ua = user_agent.to_lowercase();
        self.groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a == &ua))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
            .and_then(|g| g.crawl_delay)
    }
}

/// Parse a robots.txt body into groups.
pub fn parse_robots(txt: &str) -> Result<RobotsTxt, RobotsParseError> {
    let head = txt.trim_start().chars().take(512).collect::<String>().to_lowercase();
    if head.starts_with("<!doctype") || head.starts_with("<html") || head.contains("<body") {
        return Err(RobotsParseError("body is HTML".to_string()));
    }
    if txt.contains('\0') {
        return Err(RobotsParseError("body contains binary data".to_string()));
    }

    let mut robots = RobotsTxt::default();
    let mut current: Option<RobotsGroup> = None;
    // A user-agent line after rules starts a new group.
    let mut seen_rules = false;

    for line in txt.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if seen_rules || current.is_none() {
                    if let Some(g) = current.take() {
                        robots.groups.push(g);
                    }
                    current = Some(RobotsGroup::default());
                    seen_rules = false;
                }
                if let Some(g) = current.as_mut() {
                    g.agents.push(value.to_lowercase());
                }
            }
            "allow" | "disallow" => {
                let Some(g) = current.as_mut() else {
                    continue;
                };
                seen_rules = true;
                // An empty Disallow permits everything, which is the default anyway.
                if !value.is_empty() {
                    g.rules.push(RobotsRule {
                        allow: key == "allow",
                        pattern: value.to_string(),
                    });
                }
            }
            "crawl-delay" => {
                if let Some(g) = current.as_mut() {
                    seen_rules = true;
                    if let Ok(delay) = value.parse::<f32>() {
                        g.crawl_delay = Some(delay);
                    }
                }
            }
            "sitemap" => {
                // Sitemap directives are global
                if !value.is_empty() {
                    robots.sitemaps.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    if let Some(g) = current.take() {
        robots.groups.push(g);
    }

    Ok(robots)
}

/// Match a path against a robots pattern with `*` wildcards and a `$` anchor.
fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let Some(first) = parts.first() else {
        return true;
    };
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for (i, part) in parts.iter().enumerate().skip(1) {
        let is_last = i == parts.len() - 1;
        if is_last && anchored {
            return path.len() >= pos + part.len() && path[pos..].ends_with(part);
        }
        match path[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }

    !anchored || pos == path.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_robots() {
        let txt = r#"
User-agent: *
Allow: /
Disallow: /admin
Disallow: /private/
Crawl-delay: 1.5

Sitemap: https://example.com/sitemap.xml
Sitemap: https://example.com/sitemap-blog.xml
"#;

        let robots = parse_robots(txt).unwrap();
        assert_eq!(robots.groups.len(), 1);
        assert_eq!(robots.groups[0].rules.len(), 3);
        assert_eq!(robots.crawl_delay("ctxlint"), Some(1.5));
        assert_eq!(robots.sitemaps.len(), 2);

        assert!(robots.is_allowed("ctxlint", "/"));
        assert!(robots.is_allowed("ctxlint", "/about"));
        assert!(!robots.is_allowed("ctxlint", "/admin"));
        assert!(!robots.is_allowed("ctxlint", "/admin/settings"));
        assert!(!robots.is_allowed("ctxlint", "/private/data"));
    }

    #[test]
    fn test_longest_match_wins() {
        let txt = r#"
User-agent: *
Disallow: /api/
Allow: /api/public/
"#;
        let robots = parse_robots(txt).unwrap();
        assert!(!robots.is_allowed("ctxlint", "/api/secret"));
        assert!(robots.is_allowed("ctxlint", "/api/public/docs"));
    }

    #[test]
    fn test_equal_length_last_rule_wins() {
        let txt = "User-agent: *\nAllow: /page\nDisallow: /page\n";
        let robots = parse_robots(txt).unwrap();
        assert!(!robots.is_allowed("ctxlint", "/page"));

        let txt = "User-agent: *\nDisallow: /page\nAllow: /page\n";
        let robots = parse_robots(txt).unwrap();
        assert!(robots.is_allowed("ctxlint", "/page"));
    }

    #[test]
    fn test_specific_agent_overrides_wildcard() {
        let txt = r#"
User-agent: GPTBot
Disallow: /

User-agent: *
Allow: /
"#;
        let robots = parse_robots(txt).unwrap();
        assert!(!robots.is_allowed("GPTBot", "/"));
        assert!(!robots.is_allowed("gptbot", "/anything"));
        assert!(robots.is_allowed("ClaudeBot", "/"));
    }

    #[test]
    fn test_shared_group_agents() {
        let txt = r#"
User-agent: ClaudeBot
User-agent: PerplexityBot
Disallow: /

User-agent: Amazonbot
Disallow: /private
"#;
        let robots = parse_robots(txt).unwrap();
        assert_eq!(robots.groups.len(), 2);
        assert!(!robots.is_allowed("ClaudeBot", "/"));
        assert!(!robots.is_allowed("PerplexityBot", "/"));
        assert!(robots.is_allowed("Amazonbot", "/"));
        assert!(!robots.is_allowed("Amazonbot", "/private/x"));
        // No group and no wildcard: allowed.
        assert!(robots.is_allowed("GPTBot", "/"));
    }

    #[test]
    fn test_empty_disallow_allows() {
        let robots = parse_robots("User-agent: *\nDisallow:\n").unwrap();
        assert!(robots.is_allowed("GPTBot", "/"));
    }

    #[test]
    fn test_wildcards_and_anchor() {
        assert!(path_matches("/a/b.pdf", "/*.pdf$"));
        assert!(!path_matches("/a/b.pdf?x=1", "/*.pdf$"));
        assert!(path_matches("/shop/cart/1", "/*/cart"));
        assert!(path_matches("/private", "/private$"));
        assert!(!path_matches("/private/x", "/private$"));
        assert!(path_matches("/anything", "/*"));
    }

    #[test]
    fn test_html_body_is_parse_error() {
        let err = parse_robots("<!DOCTYPE html><html><body>Not found</body></html>");
        assert!(err.is_err());
    }
}
