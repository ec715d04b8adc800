//! Search store: `search_index` (FTS5) + `index_meta` (§4.3).
//!
//! The search store attaches the crawl database so that candidate rows can
//! be joined against `crawl.visited` in one query, per §4.3's "all three
//! must support attached cross-store reads" requirement.

use crate::storage::pragma;
use crate::storage::schema::SEARCH_SCHEMA_SQL;
use crate::storage::traits::StorageResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// A full-text index row (§3): one per visited URL with a non-null title.
#[derive(Debug, Clone)]
pub struct SearchIndexRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub h1: String,
    pub h2: String,
    pub important_text: String,
}

/// An FTS candidate joined with its visited row, ready for ranking.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub h1: String,
    pub h2: String,
    pub important_text: String,
    pub bm25: f64,
    pub http_status: Option<u16>,
    pub language: Option<String>,
    pub domain_rank: i64,
    pub crawled_at: Option<DateTime<Utc>>,
}

pub struct SearchStore {
    conn: Connection,
}

impl SearchStore {
    pub fn open(search_db_path: &Path, crawl_db_path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(search_db_path)?;
        pragma::tune(&conn)?;
        conn.execute_batch(SEARCH_SCHEMA_SQL)?;
        conn.execute(
            "ATTACH DATABASE ?1 AS crawl",
            params![crawl_db_path.to_string_lossy().to_string()],
        )?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory_with_crawl(crawl_db_path: &Path) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SEARCH_SCHEMA_SQL)?;
        conn.execute(
            "ATTACH DATABASE ?1 AS crawl",
            params![crawl_db_path.to_string_lossy().to_string()],
        )?;
        Ok(Self { conn })
    }

    pub fn checkpoint(&self) -> StorageResult<()> {
        pragma::checkpoint_truncate(&self.conn)?;
        Ok(())
    }

    pub fn insert_batch(&mut self, rows: &[SearchIndexRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO search_index (url, title, description, content, h1, h2, important_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.url,
                    row.title,
                    row.description,
                    row.content,
                    row.h1,
                    row.h2,
                    row.important_text,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Runs `fts_query` against the index, joined with `crawl.visited`,
    /// returning up to `limit` candidates ordered by raw BM25 (§4.11's
    /// "up to N=500 FTS candidates joined with their visited rows").
    ///
    /// A malformed FTS query returns an empty candidate list rather than an
    /// error (§7 "search FTS compile error: return empty result").
    pub fn candidates(&self, fts_query: &str, limit: usize) -> StorageResult<Vec<CandidateRow>> {
        let mut stmt = match self.conn.prepare(
            "SELECT s.url, s.title, s.description, s.content, s.h1, s.h2, s.important_text,
                    bm25(search_index) AS score,
                    v.http_status, v.language, v.domain_rank, v.crawled_at
             FROM search_index s
             JOIN crawl.visited v ON v.url = s.url
             WHERE search_index MATCH ?1
             ORDER BY score
             LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(_) => return Ok(Vec::new()),
        };

        let result = stmt.query_map(params![fts_query, limit as i64], |r| {
            let crawled_at: Option<String> = r.get(11)?;
            Ok(CandidateRow {
                url: r.get(0)?,
                title: r.get(1)?,
                description: r.get(2)?,
                content: r.get(3)?,
                h1: r.get(4)?,
                h2: r.get(5)?,
                important_text: r.get(6)?,
                bm25: r.get(7)?,
                http_status: r.get::<_, Option<i64>>(8)?.map(|v| v as u16),
                language: r.get(9)?,
                domain_rank: r.get(10)?,
                crawled_at: crawled_at
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|d| d.with_timezone(&Utc)),
            })
        });

        match result {
            Ok(mapped) => Ok(mapped.collect::<Result<Vec<_>, _>>().unwrap_or_default()),
            Err(_) => Ok(Vec::new()),
        }
    }

    pub fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM search_index", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    pub fn set_meta(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> StorageResult<Option<String>> {
        use rusqlite::OptionalExtension;
        let value = self
            .conn
            .query_row("SELECT value FROM index_meta WHERE key = ?1", params![key], |r| r.get(0))
            .optional()?;
        Ok(value)
    }
}
