//! Route handlers: `/search`, `/suggest`, `/health`.

use crate::query::{process, with_recall_fallback};
use crate::ranking::rank;
use crate::search::RateLimiter;
use crate::storage::{CrawlStore, SearchStore};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

/// Candidate pools below this size trigger the OR-of-OR recall fallback
/// (§4.10 step 5).
const RECALL_FALLBACK_THRESHOLD: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<Mutex<SearchStore>>,
    pub crawl: Arc<Mutex<CrawlStore>>,
    pub limiter: Arc<RateLimiter>,
    pub results_per_page: usize,
    pub max_candidates: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(search))
        .route("/suggest", get(suggest))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
    #[serde(default = "default_page")]
    page: usize,
}

fn default_page() -> usize {
    1
}

#[derive(Debug, Serialize)]
pub struct SearchResultView {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub domain: String,
    pub language: Option<String>,
    pub authority_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultView>,
    pub total: usize,
    pub page: usize,
    pub elapsed_ms: u128,
}

/// Wraps every query term occurrence in `text` with `<b>…</b>`, case-insensitively.
fn highlight(text: &str, terms: &[String]) -> String {
    let mut result = text.to_string();
    for term in terms {
        if term.is_empty() {
            continue;
        }
        let lower = result.to_lowercase();
        let term_lower = term.to_lowercase();
        let mut out = String::with_capacity(result.len());
        let mut rest = result.as_str();
        let mut rest_lower = lower.as_str();
        while let Some(idx) = rest_lower.find(&term_lower) {
            out.push_str(&rest[..idx]);
            out.push_str("<b>");
            out.push_str(&rest[idx..idx + term.len()]);
            out.push_str("</b>");
            rest = &rest[idx + term.len()..];
            rest_lower = &rest_lower[idx + term.len()..];
        }
        out.push_str(rest);
        result = out;
    }
    result
}

async fn search(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    if !state.limiter.check(addr.ip()) {
        return (StatusCode::TOO_MANY_REQUESTS, Json(serde_json::json!({ "error": "rate limit exceeded" }))).into_response();
    }

    let start = Instant::now();

    let Ok(processed) = process(&params.q) else {
        return Json(SearchResponse { results: Vec::new(), total: 0, page: params.page, elapsed_ms: start.elapsed().as_millis() }).into_response();
    };

    let candidates = {
        let store = state.search.lock().unwrap();
        store.candidates(&processed.fts_query, state.max_candidates).unwrap_or_default()
    };

    let (candidates, query, penalty) = if candidates.len() < RECALL_FALLBACK_THRESHOLD {
        let fallback = with_recall_fallback(&processed);
        let retried = {
            let store = state.search.lock().unwrap();
            store.candidates(&fallback.fts_query, state.max_candidates).unwrap_or_default()
        };
        (retried, fallback, 0.8)
    } else {
        (candidates, processed, 1.0)
    };

    let total = candidates.len();
    let ranked = rank(candidates, &query, penalty, params.page, state.results_per_page);

    let results = ranked
        .into_iter()
        .map(|r| SearchResultView {
            snippet: highlight(&r.snippet, &query.base_terms),
            title: highlight(&r.title, &query.base_terms),
            url: r.url,
            domain: r.domain,
            language: r.language,
            authority_verified: r.authority_verified,
        })
        .collect();

    Json(SearchResponse {
        results,
        total,
        page: params.page,
        elapsed_ms: start.elapsed().as_millis(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    q: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

async fn suggest(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> impl IntoResponse {
    if params.q.chars().count() < 2 {
        return Json(SuggestResponse { suggestions: Vec::new() });
    }
    let suggestions = {
        let crawl = state.crawl.lock().unwrap();
        crawl.suggest_titles(&params.q, 5).unwrap_or_default()
    };
    Json(SuggestResponse { suggestions })
}
