//! Query processor (§4.10): turns a raw user query string into a boolean FTS
//! query plus the metadata the ranking engine needs (intent, brand slug,
//! site directive, base terms).
//!
//! Mirrors the crawler's own preference for small static tables over a
//! dependency: stopwords and synonyms are plain `&[&str]`/match tables, the
//! same way `url::normalize` keeps `TRACKING_PARAMS` and friends as const
//! arrays.

use thiserror::Error;

/// Raw queries are truncated to this many characters before processing.
const MAX_QUERY_CHARS: usize = 150;
/// At most this many base tokens survive stopword removal.
const MAX_TOKENS: usize = 7;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty after normalization")]
    Empty,
}

/// Whether a query most likely targets one known site (e.g. a bare brand
/// name) or is a general informational search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Navigational,
    Informational,
}

/// Output of query processing: everything the ranking engine and the search
/// store need to fetch and score candidates.
#[derive(Debug, Clone)]
pub struct ProcessedQuery {
    /// The boolean FTS5 `MATCH` expression.
    pub fts_query: String,
    /// Terms actually used to build `fts_query`, synonyms/truncations included.
    pub expanded_terms: Vec<String>,
    /// Deduplicated, stopword-filtered tokens before expansion.
    pub base_terms: Vec<String>,
    pub intent: Intent,
    /// `site:` directive or a lone dotted token, if present.
    pub site_directive: Option<String>,
    pub user_language: Option<String>,
    /// Lowercase-alphanumeric concatenation of the raw query, used for brand matching.
    pub brand_slug: String,
    /// True if `fts_query` was rebuilt as an OR-of-OR recall fallback; the
    /// ranking engine applies a 0.8x penalty to scores in this case.
    pub is_fallback: bool,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "for", "to", "in", "on", "and", "or", "is", "are", "was", "were",
    "be", "been", "with", "at", "by", "from", "how", "what", "when", "where", "why", "who",
    "this", "that", "it", "as", "do", "does", "did", "can", "will", "i",
];

/// Small synonym table: each entry's terms are mutually interchangeable.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["install", "setup", "configure"],
    &["login", "auth"],
    &["linux", "gnu", "unix"],
    &["doc", "docs", "documentation"],
    &["tutorial", "guide", "howto"],
    &["error", "bug", "issue"],
];

fn synonyms_for(term: &str) -> Vec<String> {
    SYNONYM_GROUPS
        .iter()
        .find(|group| group.contains(&term))
        .map(|group| group.iter().filter(|s| **s != term).map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

/// Lowercase, strip everything but ascii alphanumerics and whitespace, split.
fn tokenize(s: &str) -> Vec<String> {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(|t| t.to_string()).collect()
}

/// Extracts a `site:` directive (`site:example.com foo`) or, failing that,
/// a lone token containing a `.` (`example.com foo`), from the raw query.
fn extract_site_directive(raw: &str) -> Option<String> {
    for word in raw.split_whitespace() {
        if let Some(site) = word.strip_prefix("site:") {
            if !site.is_empty() {
                return Some(site.to_lowercase());
            }
        }
    }
    raw.split_whitespace()
        .find(|w| w.contains('.') && !w.starts_with("site:"))
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '.').to_lowercase())
        .filter(|s| !s.is_empty())
}

fn brand_slug(raw: &str) -> String {
    raw.chars().filter(|c| c.is_alphanumeric()).flat_map(|c| c.to_lowercase()).collect()
}

/// Quotes a token for use inside an FTS5 MATCH expression.
fn fts_quote(term: &str) -> String {
    format!("\"{}\"", term.replace('"', ""))
}

/// Builds one OR-group for a base term: the term itself, its 1-char
/// truncation variant and any synonyms.
fn or_group(term: &str) -> String {
    let mut variants = vec![term.to_string()];
    if term.chars().count() > 3 {
        let truncated: String = term.chars().take(term.chars().count() - 1).collect();
        variants.push(truncated);
    }
    variants.extend(synonyms_for(term));
    variants.dedup();

    let quoted: Vec<String> = variants.iter().map(|v| fts_quote(v)).collect();
    if quoted.len() == 1 {
        quoted.into_iter().next().unwrap()
    } else {
        format!("({})", quoted.join(" OR "))
    }
}

fn build_and_query(terms: &[String]) -> String {
    terms.iter().map(|t| or_group(t)).collect::<Vec<_>>().join(" AND ")
}

fn build_or_query(terms: &[String]) -> String {
    terms.iter().map(|t| or_group(t)).collect::<Vec<_>>().join(" OR ")
}

/// Processes a raw query string, building the AND-of-OR FTS query.
///
/// The recall fallback (OR-of-OR, §4.10 step 5) depends on how many
/// candidates the AND query actually returns, so this function only builds
/// the AND form; call [`with_recall_fallback`] once the candidate count is
/// known, or use it directly when the caller doesn't need the fallback.
pub fn process(raw: &str) -> Result<ProcessedQuery, QueryError> {
    let truncated: String = raw.chars().take(MAX_QUERY_CHARS).collect();
    let site_directive = extract_site_directive(&truncated);
    let user_language = None;

    let mut tokens = tokenize(&truncated);
    if tokens.is_empty() {
        return Err(QueryError::Empty);
    }

    let all_stopwords = tokens.iter().all(|t| STOPWORDS.contains(&t.as_str()));
    if !all_stopwords {
        tokens.retain(|t| !STOPWORDS.contains(&t.as_str()));
    }

    let mut base_terms = Vec::with_capacity(tokens.len());
    for t in tokens {
        if !base_terms.contains(&t) {
            base_terms.push(t);
        }
        if base_terms.len() >= MAX_TOKENS {
            break;
        }
    }
    if base_terms.is_empty() {
        return Err(QueryError::Empty);
    }

    let mut expanded_terms = Vec::new();
    for term in &base_terms {
        expanded_terms.push(term.clone());
        expanded_terms.extend(synonyms_for(term));
    }
    expanded_terms.dedup();

    let intent = if base_terms.len() <= 2 {
        Intent::Navigational
    } else {
        Intent::Informational
    };

    let fts_query = build_and_query(&base_terms);

    Ok(ProcessedQuery {
        fts_query,
        expanded_terms,
        base_terms,
        intent,
        site_directive,
        user_language,
        brand_slug: brand_slug(&truncated),
        is_fallback: false,
    })
}

/// Rebuilds `query` as an OR-of-OR recall fallback, marking it as such so
/// the ranking engine applies the 0.8x score penalty.
pub fn with_recall_fallback(query: &ProcessedQuery) -> ProcessedQuery {
    let mut fallback = query.clone();
    fallback.fts_query = build_or_query(&query.base_terms);
    fallback.is_fallback = true;
    fallback
}
