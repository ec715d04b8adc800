//! Search API (§4.12): a thin `axum` JSON service over the search store.
//!
//! `/search` and `/suggest` return the structured fields the ranking engine
//! produces; HTML rendering is left to a downstream collaborator (§1). A
//! sliding-window per-IP rate limiter sits in front of both, and `/health`
//! is an ambient liveness probe for running this as a long-lived service.

mod rate_limit;
mod routes;

pub use rate_limit::RateLimiter;
pub use routes::{build_router, AppState};

use crate::config::{PathsConfig, SearchConfig};
use crate::storage::{CrawlStore, SearchStore};
use std::sync::{Arc, Mutex};

/// Builds the router from config, opening the search/crawl stores read-only
/// in the sense that nothing in this module ever writes to them.
pub fn build_app(search_cfg: &SearchConfig, paths: &PathsConfig) -> crate::Result<axum::Router> {
    let search = SearchStore::open(
        std::path::Path::new(&paths.search_db),
        std::path::Path::new(&paths.crawl_db),
    )?;
    let crawl = CrawlStore::open(std::path::Path::new(&paths.crawl_db))?;

    let state = AppState {
        search: Arc::new(Mutex::new(search)),
        crawl: Arc::new(Mutex::new(crawl)),
        limiter: Arc::new(RateLimiter::new(search_cfg.rate_limit_requests, search_cfg.rate_limit_window_secs)),
        results_per_page: search_cfg.results_per_page,
        max_candidates: search_cfg.max_candidates,
    };

    Ok(build_router(state))
}
