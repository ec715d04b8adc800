//! Persistence layer: three single-writer SQLite stores (§4.3).
//!
//! - [`crawl_store`]: frontier, visited, domain_authority.
//! - [`html_store`]: raw+parsed HTML (`html_storage`).
//! - [`search_store`]: FTS5 search index + index_meta, with the crawl DB
//!   attached for cross-store joins.
//!
//! Splitting storage this way keeps the bandwidth-heavy HTML writes off the
//! frontier's hot path, and lets the search API run against its own store
//! without contending with the crawler's writer.

pub mod crawl_store;
pub mod html_store;
mod pragma;
mod schema;
pub mod search_store;
mod traits;

pub use crawl_store::{CrawlStore, DomainAuthorityRecord, RunRecord, RunStatus, VisitedRecord, UNKNOWN_DOMAIN_RANK};
pub use html_store::{HtmlStore, StorageRecord};
pub use search_store::{CandidateRow, SearchIndexRecord, SearchStore};
pub use traits::{StorageError, StorageResult};

use crate::config::PathsConfig;
use std::path::Path;

/// Opens all three stores from the paths in [`PathsConfig`].
pub struct Stores {
    pub crawl: CrawlStore,
    pub html: HtmlStore,
    pub search: SearchStore,
}

pub fn open_stores(paths: &PathsConfig) -> StorageResult<Stores> {
    let crawl = CrawlStore::open(Path::new(&paths.crawl_db))?;
    let html = HtmlStore::open(Path::new(&paths.storage_db))?;
    let search = SearchStore::open(Path::new(&paths.search_db), Path::new(&paths.crawl_db))?;
    Ok(Stores { crawl, html, search })
}

/// `next_crawl_time` bracket from domain rank (§4.8).
pub fn next_crawl_time_for_rank(rank: i64, now: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
    use chrono::Duration;
    let delta = if rank < 1_000 {
        Duration::days(1)
    } else if rank < 10_000 {
        Duration::days(3)
    } else if rank < 100_000 {
        Duration::days(7)
    } else {
        Duration::days(30)
    };
    now + delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_next_crawl_time_brackets() {
        let now = Utc::now();
        assert_eq!(next_crawl_time_for_rank(500, now), now + chrono::Duration::days(1));
        assert_eq!(next_crawl_time_for_rank(5_000, now), now + chrono::Duration::days(3));
        assert_eq!(next_crawl_time_for_rank(50_000, now), now + chrono::Duration::days(7));
        assert_eq!(next_crawl_time_for_rank(1_000_000, now), now + chrono::Duration::days(30));
    }
}
