//! Ranking engine (§4.11): scores FTS candidates against a processed query
//! and returns them sorted, paginated, and with same-domain repetition
//! penalised.
//!
//! The composite score is a flat sum of independently-reasoned components
//! (text, authority, freshness, TLD bias, URL shape, field hits, intent,
//! language); none of this needs a learned model, so it stays a handful of
//! plain functions the same way the crawler's own `priority()` does.

use crate::query::{Intent, ProcessedQuery};
use crate::storage::CandidateRow;
use chrono::Utc;

/// Rank at or below which a result is considered "authority verified" (§4.12).
pub const AUTHORITY_VERIFIED_RANK: i64 = 10_000;

/// A fully scored, render-ready search result.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub domain: String,
    pub language: Option<String>,
    pub authority_verified: bool,
    pub score: f64,
}

fn tld_bias(host: &str) -> f64 {
    let tld = host.rsplit('.').next().unwrap_or("");
    match tld {
        "gov" | "edu" | "org" => 15.0,
        "io" | "dev" | "net" => 8.0,
        _ => 0.0,
    }
}

fn url_quality(url: &str) -> f64 {
    let parsed = match ::url::Url::parse(url) {
        Ok(u) => u,
        Err(_) => return 0.0,
    };

    let path = parsed.path();
    let depth = path.split('/').filter(|s| !s.is_empty()).count();
    let mut score = -4.0 * (depth as f64 - 3.0).max(0.0);

    if parsed.query().is_some() {
        score -= 12.0;
    }

    if path == "/" || path.is_empty() {
        score += 12.0;
    }

    let keyword_chars = path.chars().filter(|c| c.is_alphanumeric() || *c == '-').count();
    let density_bonus = (keyword_chars as f64 / 40.0).min(1.0) * 10.0;
    score += density_bonus;

    score
}

/// Saturating term-hit score: counts how many query terms appear in `text`,
/// saturating at `cap` hits, scaled by `weight`.
fn saturated_term_hits(text: &str, terms: &[String], cap: f64, weight: f64) -> f64 {
    let lower = text.to_lowercase();
    let hits = terms.iter().filter(|t| lower.contains(t.as_str())).count() as f64;
    hits.min(cap) / cap * weight
}

fn phrase_bonus(text: &str, phrase: &str, bonus: f64) -> f64 {
    if !phrase.is_empty() && text.to_lowercase().contains(&phrase.to_lowercase()) {
        bonus
    } else {
        0.0
    }
}

/// Proximity boost: shortest gap (in words) between any two distinct query
/// terms in `text`, saturating to 30 at distance 1.
fn proximity_boost(text: &str, terms: &[String]) -> f64 {
    if terms.len() < 2 {
        return 0.0;
    }
    let words: Vec<&str> = text.to_lowercase().split_whitespace().collect();
    let mut positions: Vec<(usize, &str)> = Vec::new();
    for (i, w) in words.iter().enumerate() {
        if let Some(t) = terms.iter().find(|t| t.as_str() == *w) {
            positions.push((i, t.as_str()));
        }
    }

    let mut best_distance = usize::MAX;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].1 != positions[j].1 {
                let d = positions[j].0.saturating_sub(positions[i].0);
                if d > 0 && d < best_distance {
                    best_distance = d;
                }
            }
        }
    }

    if best_distance == usize::MAX {
        0.0
    } else {
        (30.0 / best_distance as f64).min(30.0)
    }
}

fn field_score(candidate: &CandidateRow, query: &ProcessedQuery) -> f64 {
    let phrase = query.base_terms.join(" ");
    let mut score = 0.0;
    score += phrase_bonus(&candidate.title, &phrase, 90.0);
    score += phrase_bonus(&candidate.description, &phrase, 50.0);

    score += saturated_term_hits(&candidate.title, &query.expanded_terms, 4.0, 70.0);
    score += saturated_term_hits(&candidate.description, &query.expanded_terms, 5.0, 35.0);
    score += saturated_term_hits(&candidate.url, &query.expanded_terms, 6.0, 30.0);

    score += proximity_boost(&candidate.title, &query.base_terms) * 1.6;
    score += proximity_boost(&candidate.description, &query.base_terms) * 1.0;

    score
}

fn intent_boost(host: &str, path: &str, query: &ProcessedQuery) -> f64 {
    if query.intent != Intent::Navigational {
        return 0.0;
    }
    let bare_host = host.strip_prefix("www.").unwrap_or(host);
    let host_slug: String = bare_host.chars().filter(|c| c.is_alphanumeric()).collect();

    if !host_slug.contains(&query.brand_slug) && !query.brand_slug.contains(&host_slug) {
        return 0.0;
    }

    let mut boost = 180.0;
    if path == "/" || path.is_empty() {
        boost += 220.0;
    }
    boost
}

fn language_score(candidate_lang: Option<&str>, user_lang: Option<&str>) -> f64 {
    let (Some(c), Some(u)) = (candidate_lang, user_lang) else {
        return 0.0;
    };
    if c.eq_ignore_ascii_case(u) {
        40.0
    } else if c.chars().next().map(|a| a.to_ascii_lowercase()) == u.chars().next().map(|a| a.to_ascii_lowercase()) {
        8.0
    } else {
        -10.0
    }
}

fn authority_score(rank: i64) -> f64 {
    (160.0 / (1.0 + (((rank.max(0) + 10) as f64).log10()))).min(60.0)
}

fn freshness_score(crawled_at: Option<chrono::DateTime<Utc>>) -> f64 {
    let Some(crawled_at) = crawled_at else {
        return 0.0;
    };
    let age_days = (Utc::now() - crawled_at).num_seconds().max(0) as f64 / 86_400.0;
    25.0 * (-age_days / 200.0).exp()
}

/// Normalises a URL to a dedup key: strips scheme/`www.` and a trailing slash.
fn dedup_key(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let stripped = stripped.strip_prefix("www.").unwrap_or(stripped);
    stripped.strip_suffix('/').unwrap_or(stripped).to_lowercase()
}

fn snippet_for(candidate: &CandidateRow) -> String {
    if !candidate.description.is_empty() {
        candidate.description.chars().take(220).collect()
    } else {
        candidate.content.chars().take(220).collect()
    }
}

/// Scores, dedups, sorts and paginates candidates.
///
/// `fallback_penalty` is `0.8` when `query` came from [`crate::query::with_recall_fallback`],
/// `1.0` otherwise.
pub fn rank(candidates: Vec<CandidateRow>, query: &ProcessedQuery, fallback_penalty: f64, page: usize, per_page: usize) -> Vec<RankedResult> {
    let mut seen_keys = std::collections::HashSet::new();
    let mut scored: Vec<(f64, CandidateRow, String, String)> = Vec::new();

    for candidate in candidates {
        let key = dedup_key(&candidate.url);
        if !seen_keys.insert(key) {
            continue;
        }

        let parsed = match ::url::Url::parse(&candidate.url) {
            Ok(u) => u,
            Err(_) => continue,
        };
        let host = parsed.host_str().unwrap_or_default().to_string();
        let path = parsed.path().to_string();

        let mut score = 0.0;
        score += -3.2 * candidate.bm25;
        score += authority_score(candidate.domain_rank);
        score += freshness_score(candidate.crawled_at);
        score += tld_bias(&host);
        score += url_quality(&candidate.url);
        score += field_score(&candidate, query);
        score += intent_boost(&host, &path, query);
        score += language_score(candidate.language.as_deref(), query.user_language.as_deref());
        score *= fallback_penalty;

        scored.push((score, candidate, host, path));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    // Domain-diversity re-sort: walk the primary order, penalise repeat
    // domains by how many times that domain has already appeared, then
    // re-sort on the adjusted score.
    let mut domain_counts: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
    let mut adjusted: Vec<(f64, CandidateRow, String)> = scored
        .into_iter()
        .map(|(score, candidate, host, _path)| {
            let count = domain_counts.entry(host.clone()).or_insert(0);
            let penalty = -15.0 * (*count as f64);
            *count += 1;
            (score + penalty, candidate, host)
        })
        .collect();
    adjusted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let start = page.saturating_sub(1) * per_page;
    adjusted
        .into_iter()
        .skip(start)
        .take(per_page)
        .map(|(score, candidate, host)| RankedResult {
            snippet: snippet_for(&candidate),
            authority_verified: candidate.domain_rank <= AUTHORITY_VERIFIED_RANK,
            language: candidate.language.clone(),
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            domain: host,
            score,
        })
        .collect()
}
