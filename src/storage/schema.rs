//! SQL schema definitions for the three stores (§4.3, §6 persisted state layout).

/// crawl DB: `frontier`, `visited`, `domain_authority`.
pub const CRAWL_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS frontier (
    url TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status INTEGER NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL DEFAULT 0,
    reserved_at TEXT,
    added_at TEXT NOT NULL,
    next_crawl_time TEXT
);

CREATE INDEX IF NOT EXISTS idx_frontier_dispatch ON frontier(status, priority, next_crawl_time);
CREATE INDEX IF NOT EXISTS idx_frontier_domain ON frontier(domain);

CREATE TABLE IF NOT EXISTS visited (
    url TEXT PRIMARY KEY,
    title TEXT,
    description TEXT,
    http_status INTEGER,
    language TEXT,
    out_links INTEGER NOT NULL DEFAULT 0,
    crawled_at TEXT NOT NULL,
    crawl_epoch INTEGER NOT NULL DEFAULT 0,
    last_seen_epoch INTEGER NOT NULL DEFAULT 0,
    domain_rank INTEGER NOT NULL DEFAULT 10000000
);

CREATE INDEX IF NOT EXISTS idx_visited_title ON visited(title);

CREATE TABLE IF NOT EXISTS domain_authority (
    domain TEXT PRIMARY KEY,
    rank INTEGER NOT NULL
);

-- Ambient bookkeeping (SPEC_FULL §3.1): one row per `run-crawler` invocation,
-- read by `monitor` and any post-run summary.
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    config_hash TEXT NOT NULL
);
"#;

/// storage DB: `html_storage`.
pub const STORAGE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS html_storage (
    rowid INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    raw_html BLOB,
    parsed_text TEXT,
    title TEXT,
    description TEXT,
    h1 TEXT,
    h2 TEXT,
    important_text TEXT,
    headers TEXT,
    crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_html_storage_url ON html_storage(url);
"#;

/// search DB: `search_index` (FTS5) + `index_meta`.
///
/// `unicode61 remove_diacritics 2` matches the unicode-normalising,
/// diacritic-stripping tokeniser the data model calls for.
pub const SEARCH_SCHEMA_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS search_index USING fts5(
    url UNINDEXED,
    title,
    description,
    content,
    h1,
    h2,
    important_text,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    #[test]
    fn test_crawl_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(super::CRAWL_SCHEMA_SQL).unwrap();
        conn.execute_batch(super::CRAWL_SCHEMA_SQL).unwrap();
    }

    #[test]
    fn test_storage_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(super::STORAGE_SCHEMA_SQL).unwrap();
    }

    #[test]
    fn test_search_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(super::SEARCH_SCHEMA_SQL).unwrap();
    }
}
