//! Frontier insertion priority (§4.4). Lower is sooner.

/// Path segments containing any of these are treated as likely crawler traps
/// (infinite calendars, faceted search, session-bound flows) and penalised.
const TRAP_KEYWORDS: &[&str] = &[
    "search", "filter", "login", "signup", "calendar", "archive", "tag",
];

const BASE_PRIORITY: i64 = 10;
const PER_SEGMENT_PENALTY: i64 = 2;
const QUERY_PENALTY: i64 = 20;
const TRAP_PENALTY: i64 = 50;
const HOMEPAGE_PRIORITY: i64 = 1;

/// Computes the dispatch priority for a canonical URL.
///
/// base 10; +2 per path segment; +20 if a query string is present; +50 if
/// the path contains a trap keyword; 1 for the homepage (path length ≤ 1,
/// no query).
pub fn priority(url: &str) -> i64 {
    let parsed = match ::url::Url::parse(url) {
        Ok(u) => u,
        Err(_) => return BASE_PRIORITY,
    };

    let path = parsed.path();
    let has_query = parsed.query().is_some();

    if path.len() <= 1 && !has_query {
        return HOMEPAGE_PRIORITY;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut p = BASE_PRIORITY + PER_SEGMENT_PENALTY * segments.len() as i64;

    if has_query {
        p += QUERY_PENALTY;
    }

    let path_lower = path.to_lowercase();
    if TRAP_KEYWORDS.iter().any(|kw| path_lower.contains(kw)) {
        p += TRAP_PENALTY;
    }

    p
}
