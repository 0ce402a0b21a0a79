//! Classify URLs by shape: path depth, top-level section, origin.

use url::Url;

/// Number of non-empty path segments (`/` → 0, `/blog/post` → 2).
pub fn url_depth(url: &str) -> usize {
    extract_path(url)
        .split('/')
        .filter(|s| !s.is_empty())
        .count()
}

/// First path segment, lowercased; empty for the root page.
pub fn top_level_section(url: &str) -> String {
    extract_path(url)
        .split('/')
        .find(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Host without a leading `www.`, lowercased.
pub fn site_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(String::from).unwrap_or(host))
}

/// Whether two URLs belong to the same site (`www.` is ignored).
pub fn same_domain(a: &str, b: &str) -> bool {
    match (site_host(a), site_host(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Canonical form used for deduplication.
///
/// Drops the fragment, lowercases scheme and host, removes a trailing slash
/// (except on the root), and sorts query parameters.
pub fn normalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    let host = parsed.host_str().map(|h| h.to_lowercase());
    let mut out = format!("{}://{}", parsed.scheme(), host.unwrap_or_default());
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(parsed.path());
    if let Some(q) = parsed.query() {
        out.push('?');
        out.push_str(q);
    }
    Some(out)
}

/// Key under which two URLs count as the same page.
///
/// `normalize_url` with the scheme and a leading `www.` dropped, so it agrees
/// with `same_domain` about what one site is.
pub fn page_key(url: &str) -> Option<String> {
    let normalized = normalize_url(url)?;
    let rest = normalized
        .split_once("://")
        .map_or(normalized.as_str(), |(_, rest)| rest);
    Some(rest.strip_prefix("www.").unwrap_or(rest).to_string())
}

/// Path plus query, as matched against robots rules.
pub fn path_and_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => match u.query() {
            Some(q) => format!("{}?{q}", u.path()),
            None => u.path().to_string(),
        },
        Err(_) => extract_path(url).to_string(),
    }
}

fn extract_path(url: &str) -> &str {
    // Simple path extraction without parsing the full URL
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => match rest.find('/') {
            Some(slash_pos) => &rest[slash_pos..],
            None => "/",
        },
        None => url,
    };
    rest.split(['?', '#']).next().unwrap_or("/")
}
