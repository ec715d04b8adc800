//! Crawl store: `frontier`, `visited`, `domain_authority` tables (§4.3).

use crate::frontier::{FrontierEntry, Status};
use crate::storage::pragma;
use crate::storage::schema::CRAWL_SCHEMA_SQL;
use crate::storage::traits::StorageResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// A fully-fetched page. Exists iff the page was downloaded successfully at
/// least once (§3).
#[derive(Debug, Clone)]
pub struct VisitedRecord {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub http_status: Option<u16>,
    pub language: Option<String>,
    pub out_links: u32,
    pub crawled_at: DateTime<Utc>,
    pub crawl_epoch: u32,
    pub last_seen_epoch: u32,
    pub domain_rank: i64,
}

/// `{domain (bare, no www), rank}`. A missing entry is treated as rank
/// 10,000,000 by [`CrawlStore::domain_rank`].
#[derive(Debug, Clone)]
pub struct DomainAuthorityRecord {
    pub domain: String,
    pub rank: i64,
}

/// Rank assigned to a domain absent from `domain_authority`.
pub const UNKNOWN_DOMAIN_RANK: i64 = 10_000_000;

/// Terminal/active state of one `run-crawler` invocation (§3.1 ambient "Run record").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "interrupted" => Self::Interrupted,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

/// One row of the `runs` table: start/finish timestamps, terminal status and
/// the config hash active for that run, read by `monitor` (§3.1, §6).
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub config_hash: String,
}

pub struct CrawlStore {
    conn: Connection,
}

impl CrawlStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        pragma::tune(&conn)?;
        conn.execute_batch(CRAWL_SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CRAWL_SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub fn checkpoint(&self) -> StorageResult<()> {
        pragma::checkpoint_truncate(&self.conn)?;
        Ok(())
    }

    /// Inserts frontier rows for URLs not already present (PK conflict is a
    /// no-op: frontier rows are created once and only updated in place, per
    /// §3's lifecycle rule "deleted never").
    pub fn insert_frontier_entries(&mut self, entries: &[FrontierEntry]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO frontier
                    (url, domain, priority, status, retry_count, reserved_at, added_at, next_crawl_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for e in entries {
                let changed = stmt.execute(params![
                    e.url,
                    e.domain,
                    e.priority,
                    e.status.as_i32(),
                    e.retry_count,
                    e.reserved_at.map(|t| t.to_rfc3339()),
                    e.added_at.to_rfc3339(),
                    e.next_crawl_time.map(|t| t.to_rfc3339()),
                ])?;
                inserted += changed;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Selects up to `limit` dispatchable rows: PENDING, or IN_FLIGHT with a
    /// stale `reserved_at` (orphan reclaim, §4.4/§8-invariant-4), ordered by
    /// priority then next_crawl_time.
    pub fn select_dispatchable(&self, limit: usize) -> StorageResult<Vec<FrontierEntry>> {
        let orphan_cutoff = (Utc::now() - chrono::Duration::seconds(crate::frontier::ORPHAN_RESERVATION_SECS))
            .to_rfc3339();
        let mut stmt = self.conn.prepare(
            "SELECT url, domain, priority, status, retry_count, reserved_at, added_at, next_crawl_time
             FROM frontier
             WHERE status = ?1
                OR (status = ?2 AND (reserved_at IS NULL OR reserved_at < ?3))
             ORDER BY priority ASC, next_crawl_time ASC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![
                Status::Pending.as_i32(),
                Status::InFlight.as_i32(),
                orphan_cutoff,
                limit as i64
            ],
            row_to_entry,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Marks `urls` IN_FLIGHT with `reserved_at = now` (dispatcher reservation, §4.4).
    pub fn mark_reserved(&mut self, urls: &[String], now: DateTime<Utc>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE frontier SET status = ?1, reserved_at = ?2 WHERE url = ?3",
            )?;
            for url in urls {
                stmt.execute(params![Status::InFlight.as_i32(), now.to_rfc3339(), url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Marks a URL DONE and schedules its next visit.
    pub fn mark_done(&mut self, url: &str, next_crawl_time: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET status = ?1, next_crawl_time = ?2, reserved_at = NULL WHERE url = ?3",
            params![Status::Done.as_i32(), next_crawl_time.to_rfc3339(), url],
        )?;
        Ok(())
    }

    /// Marks a URL DEAD: terminal, no further retries (§7).
    pub fn mark_dead(&mut self, url: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET status = ?1, reserved_at = NULL WHERE url = ?2",
            params![Status::Dead.as_i32(), url],
        )?;
        Ok(())
    }

    /// Re-queues a URL as PENDING with an incremented retry count and a
    /// priority penalty (§4.8 "retries ... priority bumped to penalise").
    pub fn mark_retry(&mut self, url: &str, priority_penalty: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier
             SET status = ?1, retry_count = retry_count + 1, priority = priority + ?2, reserved_at = NULL
             WHERE url = ?3",
            params![Status::Pending.as_i32(), priority_penalty, url],
        )?;
        Ok(())
    }

    /// Rolls every IN_FLIGHT row back to PENDING. Used on cooperative
    /// shutdown (§5) so no row is left IN_FLIGHT across a restart.
    pub fn reclaim_all_in_flight(&mut self) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE frontier SET status = ?1, reserved_at = NULL WHERE status = ?2",
            params![Status::Pending.as_i32(), Status::InFlight.as_i32()],
        )?;
        Ok(changed)
    }

    pub fn count_by_status(&self, status: Status) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE status = ?1",
            params![status.as_i32()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Frontier rows that have been retried at least once, read by `monitor`.
    pub fn count_retry_rows(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM frontier WHERE retry_count > 0", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// REPLACEs a visited row (re-fetch bumps `last_seen_epoch`, §3).
    pub fn upsert_visited(&mut self, v: &VisitedRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO visited
                (url, title, description, http_status, language, out_links, crawled_at, crawl_epoch, last_seen_epoch, domain_rank)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                http_status = excluded.http_status,
                language = excluded.language,
                out_links = excluded.out_links,
                crawled_at = excluded.crawled_at,
                last_seen_epoch = excluded.last_seen_epoch,
                domain_rank = excluded.domain_rank",
            params![
                v.url,
                v.title,
                v.description,
                v.http_status,
                v.language,
                v.out_links,
                v.crawled_at.to_rfc3339(),
                v.crawl_epoch,
                v.last_seen_epoch,
                v.domain_rank,
            ],
        )?;
        Ok(())
    }

    /// Best-effort language update pushed by the indexer (§4.9).
    pub fn update_language(&mut self, url: &str, language: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE visited SET language = ?1 WHERE url = ?2",
            params![language, url],
        )?;
        Ok(())
    }

    pub fn count_visited(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM visited", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Up to 5 title-prefix matches for `/suggest` (empty input returns none).
    pub fn suggest_titles(&self, prefix: &str, limit: usize) -> StorageResult<Vec<String>> {
        if prefix.len() < 2 {
            return Ok(Vec::new());
        }
        let pattern = format!("{}%", prefix.replace('%', ""));
        let mut stmt = self
            .conn
            .prepare("SELECT title FROM visited WHERE title LIKE ?1 LIMIT ?2")?;
        let rows = stmt.query_map(params![pattern, limit as i64], |r| r.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn domain_rank(&self, domain: &str) -> StorageResult<i64> {
        let rank: Option<i64> = self
            .conn
            .query_row(
                "SELECT rank FROM domain_authority WHERE domain = ?1",
                params![domain],
                |r| r.get(0),
            )
            .optional()?;
        Ok(rank.unwrap_or(UNKNOWN_DOMAIN_RANK))
    }

    pub fn insert_domain_authority_batch(
        &mut self,
        rows: &[DomainAuthorityRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO domain_authority (domain, rank) VALUES (?1, ?2)
                 ON CONFLICT(domain) DO UPDATE SET rank = excluded.rank",
            )?;
            for row in rows {
                stmt.execute(params![row.domain, row.rank])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Top N domains by authority (smallest rank first), used by `init-db`
    /// to seed the frontier.
    pub fn top_authority_domains(&self, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT domain FROM domain_authority ORDER BY rank ASC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |r| r.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Opens a new `runs` row with status Running, returning its id.
    pub fn start_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, finished_at, status, config_hash) VALUES (?1, NULL, ?2, ?3)",
            params![Utc::now().to_rfc3339(), RunStatus::Running.as_str(), config_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Marks a run terminal with `finished_at = now`.
    pub fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), run_id],
        )?;
        Ok(())
    }

    /// Most recent run by id, read by `monitor` (§6).
    pub fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, status, config_hash FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |r| {
                    let started_at: String = r.get(1)?;
                    let finished_at: Option<String> = r.get(2)?;
                    let status: String = r.get(3)?;
                    Ok(RunRecord {
                        id: r.get(0)?,
                        started_at: DateTime::parse_from_rfc3339(&started_at)
                            .map(|d| d.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                        finished_at: finished_at
                            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                            .map(|d| d.with_timezone(&Utc)),
                        status: RunStatus::from_str(&status),
                        config_hash: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<FrontierEntry> {
    let status_raw: i32 = row.get(3)?;
    let reserved_at: Option<String> = row.get(5)?;
    let added_at: String = row.get(6)?;
    let next_crawl_time: Option<String> = row.get(7)?;
    Ok(FrontierEntry {
        url: row.get(0)?,
        domain: row.get(1)?,
        priority: row.get(2)?,
        status: Status::from_i32(status_raw).unwrap_or(Status::Pending),
        retry_count: row.get(4)?,
        reserved_at: reserved_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
        added_at: DateTime::parse_from_rfc3339(&added_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        next_crawl_time: next_crawl_time.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(url: &str, priority: i64) -> FrontierEntry {
        FrontierEntry::new(url.to_string(), "a.test".to_string(), priority)
    }

    #[test]
    fn test_insert_and_dispatch_order() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        store
            .insert_frontier_entries(&[sample_entry("https://a.test/b", 16), sample_entry("https://a.test/", 1)])
            .unwrap();

        let batch = store.select_dispatchable(10).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].url, "https://a.test/");
    }

    #[test]
    fn test_insert_is_idempotent_on_url_pk() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        let inserted_first = store
            .insert_frontier_entries(&[sample_entry("https://a.test/", 1)])
            .unwrap();
        let inserted_second = store
            .insert_frontier_entries(&[sample_entry("https://a.test/", 1)])
            .unwrap();
        assert_eq!(inserted_first, 1);
        assert_eq!(inserted_second, 0);
    }

    #[test]
    fn test_reserve_then_done_cycle() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        store
            .insert_frontier_entries(&[sample_entry("https://a.test/", 1)])
            .unwrap();
        store
            .mark_reserved(&["https://a.test/".to_string()], Utc::now())
            .unwrap();
        assert_eq!(store.count_by_status(Status::InFlight).unwrap(), 1);

        store
            .mark_done("https://a.test/", Utc::now() + chrono::Duration::days(1))
            .unwrap();
        assert_eq!(store.count_by_status(Status::Done).unwrap(), 1);
    }

    #[test]
    fn test_orphan_reclaim_on_shutdown() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        store
            .insert_frontier_entries(&[sample_entry("https://a.test/", 1)])
            .unwrap();
        store
            .mark_reserved(&["https://a.test/".to_string()], Utc::now())
            .unwrap();

        let reclaimed = store.reclaim_all_in_flight().unwrap();
        assert_eq!(reclaimed, 1);
        assert_eq!(store.count_by_status(Status::InFlight).unwrap(), 0);
        assert_eq!(store.count_by_status(Status::Pending).unwrap(), 1);
    }

    #[test]
    fn test_missing_domain_rank_defaults() {
        let store = CrawlStore::open_in_memory().unwrap();
        assert_eq!(store.domain_rank("unknown.test").unwrap(), UNKNOWN_DOMAIN_RANK);
    }

    #[test]
    fn test_domain_authority_upsert() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        store
            .insert_domain_authority_batch(&[DomainAuthorityRecord {
                domain: "example.com".to_string(),
                rank: 42,
            }])
            .unwrap();
        assert_eq!(store.domain_rank("example.com").unwrap(), 42);
    }

    #[test]
    fn test_suggest_requires_two_chars() {
        let store = CrawlStore::open_in_memory().unwrap();
        assert!(store.suggest_titles("a", 5).unwrap().is_empty());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        let run_id = store.start_run("abc123").unwrap();
        let latest = store.latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
        assert_eq!(latest.status, RunStatus::Running);
        assert!(latest.finished_at.is_none());

        store.finish_run(run_id, RunStatus::Completed).unwrap();
        let latest = store.latest_run().unwrap().unwrap();
        assert_eq!(latest.status, RunStatus::Completed);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_latest_run_empty_when_none() {
        let store = CrawlStore::open_in_memory().unwrap();
        assert!(store.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_count_retry_rows() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        store
            .insert_frontier_entries(&[sample_entry("https://a.test/x", 10)])
            .unwrap();
        assert_eq!(store.count_retry_rows().unwrap(), 0);
        store.mark_retry("https://a.test/x", 5).unwrap();
        assert_eq!(store.count_retry_rows().unwrap(), 1);
    }

    #[test]
    fn test_retry_bumps_priority_and_count() {
        let mut store = CrawlStore::open_in_memory().unwrap();
        store
            .insert_frontier_entries(&[sample_entry("https://a.test/x", 10)])
            .unwrap();
        store.mark_retry("https://a.test/x", 5).unwrap();
        let batch = store.select_dispatchable(10).unwrap();
        assert_eq!(batch[0].priority, 15);
        assert_eq!(batch[0].retry_count, 1);
    }
}
