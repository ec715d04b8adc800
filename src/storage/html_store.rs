//! Storage store: `html_storage` (compressed raw HTML + parsed text, §4.3).

use crate::storage::pragma;
use crate::storage::schema::STORAGE_SCHEMA_SQL;
use crate::storage::traits::StorageResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// {url, compressed raw HTML bytes, parsed text, title, serialized HTTP
/// headers, crawled_at} (§3). `raw_html` may be absent for pages saved
/// before storage was introduced.
#[derive(Debug, Clone)]
pub struct StorageRecord {
    pub url: String,
    pub raw_html: Option<Vec<u8>>,
    pub parsed_text: Option<String>,
    pub title: Option<String>,
    /// Extracted `<meta name="description">` (§4.7); carried alongside the raw
    /// row so the indexer can build a full search-index row without re-parsing.
    pub description: String,
    pub h1: String,
    pub h2: String,
    pub important_text: String,
    pub headers: Option<String>,
    pub crawled_at: DateTime<Utc>,
}

pub struct HtmlStore {
    conn: Connection,
}

impl HtmlStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        pragma::tune(&conn)?;
        conn.execute_batch(STORAGE_SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(STORAGE_SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub fn checkpoint(&self) -> StorageResult<()> {
        pragma::checkpoint_truncate(&self.conn)?;
        Ok(())
    }

    /// REPLACEs a storage row (re-fetch overwrites the prior bytes/text, §3).
    pub fn upsert(&mut self, row: &StorageRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO html_storage (url, raw_html, parsed_text, title, description, h1, h2, important_text, headers, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(url) DO UPDATE SET
                raw_html = excluded.raw_html,
                parsed_text = excluded.parsed_text,
                title = excluded.title,
                description = excluded.description,
                h1 = excluded.h1,
                h2 = excluded.h2,
                important_text = excluded.important_text,
                headers = excluded.headers,
                crawled_at = excluded.crawled_at",
            params![
                row.url,
                row.raw_html,
                row.parsed_text,
                row.title,
                row.description,
                row.h1,
                row.h2,
                row.important_text,
                row.headers,
                row.crawled_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_batch(&mut self, rows: &[StorageRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO html_storage (url, raw_html, parsed_text, title, description, h1, h2, important_text, headers, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(url) DO UPDATE SET
                    raw_html = excluded.raw_html,
                    parsed_text = excluded.parsed_text,
                    title = excluded.title,
                    description = excluded.description,
                    h1 = excluded.h1,
                    h2 = excluded.h2,
                    important_text = excluded.important_text,
                    headers = excluded.headers,
                    crawled_at = excluded.crawled_at",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.url,
                    row.raw_html,
                    row.parsed_text,
                    row.title,
                    row.description,
                    row.h1,
                    row.h2,
                    row.important_text,
                    row.headers,
                    row.crawled_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn max_rowid(&self) -> StorageResult<i64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(rowid) FROM html_storage", [], |r| r.get(0))?;
        Ok(max.unwrap_or(0))
    }

    /// Next batch of rows with `rowid > watermark` and non-null parsed
    /// text, for the indexer (§4.9).
    pub fn rows_after(&self, watermark: i64, limit: usize) -> StorageResult<Vec<(i64, StorageRecord)>> {
        let mut stmt = self.conn.prepare(
            "SELECT rowid, url, raw_html, parsed_text, title, description, h1, h2, important_text, headers, crawled_at
             FROM html_storage
             WHERE rowid > ?1 AND parsed_text IS NOT NULL
             ORDER BY rowid ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![watermark, limit as i64], |r| {
            let crawled_at: String = r.get(10)?;
            Ok((
                r.get::<_, i64>(0)?,
                StorageRecord {
                    url: r.get(1)?,
                    raw_html: r.get(2)?,
                    parsed_text: r.get(3)?,
                    title: r.get(4)?,
                    description: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    h1: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    h2: r.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    important_text: r.get::<_, Option<String>>(8)?.unwrap_or_default(),
                    headers: r.get(9)?,
                    crawled_at: DateTime::parse_from_rfc3339(&crawled_at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                },
            ))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM html_storage", [], |r| r.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str) -> StorageRecord {
        StorageRecord {
            url: url.to_string(),
            raw_html: Some(b"<html></html>".to_vec()),
            parsed_text: Some("hello world".to_string()),
            title: Some("Hello".to_string()),
            description: String::new(),
            h1: String::new(),
            h2: String::new(),
            important_text: String::new(),
            headers: None,
            crawled_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_and_rows_after() {
        let mut store = HtmlStore::open_in_memory().unwrap();
        store.upsert(&sample("https://a.test/")).unwrap();
        let rows = store.rows_after(0, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.url, "https://a.test/");
    }

    #[test]
    fn test_watermark_excludes_seen_rows() {
        let mut store = HtmlStore::open_in_memory().unwrap();
        store.upsert(&sample("https://a.test/")).unwrap();
        let max = store.max_rowid().unwrap();
        store.upsert(&sample("https://b.test/")).unwrap();

        let rows = store.rows_after(max, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.url, "https://b.test/");
    }

    #[test]
    fn test_null_parsed_text_excluded() {
        let mut store = HtmlStore::open_in_memory().unwrap();
        let mut row = sample("https://a.test/");
        row.parsed_text = None;
        store.upsert(&row).unwrap();
        assert!(store.rows_after(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_replace_on_refetch() {
        let mut store = HtmlStore::open_in_memory().unwrap();
        store.upsert(&sample("https://a.test/")).unwrap();
        let mut updated = sample("https://a.test/");
        updated.title = Some("Updated".to_string());
        store.upsert(&updated).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
