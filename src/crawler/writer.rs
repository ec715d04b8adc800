//! Single DB-writer task (§4.8): the only place that mutates the crawl and
//! storage stores while the pipeline is running. Everything else (dispatcher,
//! fetcher pool, parser pool) only reads or sends a [`WriteMessage`].
//!
//! Messages are drained in batches of up to `batch_size` per tick and
//! partitioned into the six vectors described by the design: visited rows,
//! storage rows, new frontier rows (bloom-filter gated), status transitions
//! to DONE, DEAD and PENDING (retry), and IN_FLIGHT reservations. A periodic
//! timer truncates both WAL files so they don't grow unbounded across a long
//! run.

use crate::bloom::RotationalBloomFilter;
use crate::frontier::{priority, FrontierEntry};
use crate::storage::{next_crawl_time_for_rank, CrawlStore, HtmlStore, StorageRecord, VisitedRecord};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

/// The full outcome of one successfully parsed page, bundled so the writer
/// can apply it as a single logical unit (visited + storage + new frontier
/// rows + DONE transition).
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub visited: VisitedRecord,
    pub storage: StorageRecord,
    /// Discovered outlinks as `(canonical url, domain)` pairs; priority is
    /// computed here at write time, not by the parser.
    pub discovered_links: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum WriteMessage {
    SavePage(PageOutcome),
    MarkDead { url: String },
    MarkRetry { url: String, priority_penalty: i64 },
    Reserve { urls: Vec<String> },
}

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

pub struct Writer {
    crawl: CrawlStore,
    html: HtmlStore,
    bloom: Arc<Mutex<RotationalBloomFilter>>,
    crawl_epoch: u32,
    batch_size: usize,
}

impl Writer {
    pub fn new(crawl: CrawlStore, html: HtmlStore, bloom: Arc<Mutex<RotationalBloomFilter>>, crawl_epoch: u32, batch_size: usize) -> Self {
        Self {
            crawl,
            html,
            bloom,
            crawl_epoch,
            batch_size,
        }
    }

    /// Drains `rx` until every sender has been dropped (the pipeline's
    /// cooperative-shutdown contract: stop producers, let this drain, then
    /// the caller reclaims IN_FLIGHT rows and checkpoints the bloom filter).
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WriteMessage>) {
        let mut ticker = interval(CHECKPOINT_INTERVAL);
        ticker.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.checkpoint();
                }
                received = rx.recv() => {
                    let Some(first) = received else {
                        break;
                    };
                    let mut batch = vec![first];
                    while batch.len() < self.batch_size {
                        match rx.try_recv() {
                            Ok(msg) => batch.push(msg),
                            Err(_) => break,
                        }
                    }
                    self.apply_batch(batch);
                }
            }
        }

        self.checkpoint();
    }

    fn checkpoint(&self) {
        if let Err(e) = self.crawl.checkpoint() {
            tracing::warn!(error = %e, "crawl store checkpoint failed");
        }
        if let Err(e) = self.html.checkpoint() {
            tracing::warn!(error = %e, "html store checkpoint failed");
        }
    }

    fn apply_batch(&mut self, batch: Vec<WriteMessage>) {
        let mut new_frontier_rows = Vec::new();
        let mut storage_rows = Vec::new();
        let mut reserve_urls = Vec::new();

        for msg in batch {
            match msg {
                WriteMessage::SavePage(outcome) => {
                    self.apply_save_page(outcome, &mut new_frontier_rows, &mut storage_rows);
                }
                WriteMessage::MarkDead { url } => {
                    if let Err(e) = self.crawl.mark_dead(&url) {
                        tracing::warn!(%url, error = %e, "failed to mark frontier row dead");
                    }
                }
                WriteMessage::MarkRetry { url, priority_penalty } => {
                    if let Err(e) = self.crawl.mark_retry(&url, priority_penalty) {
                        tracing::warn!(%url, error = %e, "failed to requeue frontier row for retry");
                    }
                }
                WriteMessage::Reserve { urls } => {
                    reserve_urls.extend(urls);
                }
            }
        }

        if !storage_rows.is_empty() {
            if let Err(e) = self.html.upsert_batch(&storage_rows) {
                tracing::warn!(error = %e, "failed to batch-write storage rows");
            }
        }

        if !new_frontier_rows.is_empty() {
            if let Err(e) = self.crawl.insert_frontier_entries(&new_frontier_rows) {
                tracing::warn!(error = %e, "failed to insert discovered frontier rows");
            }
        }

        if !reserve_urls.is_empty() {
            if let Err(e) = self.crawl.mark_reserved(&reserve_urls, Utc::now()) {
                tracing::warn!(error = %e, "failed to mark frontier rows reserved");
            }
        }
    }

    fn apply_save_page(&mut self, outcome: PageOutcome, new_frontier_rows: &mut Vec<FrontierEntry>, storage_rows: &mut Vec<StorageRecord>) {
        let PageOutcome {
            mut visited,
            storage,
            discovered_links,
        } = outcome;

        let domain = crate::url::extract_domain(&match ::url::Url::parse(&visited.url) {
            Ok(u) => u,
            Err(_) => return,
        })
        .unwrap_or_default();

        let rank = self.crawl.domain_rank(&domain).unwrap_or(crate::storage::UNKNOWN_DOMAIN_RANK);
        visited.domain_rank = rank;
        visited.crawl_epoch = self.crawl_epoch;
        visited.last_seen_epoch = self.crawl_epoch;

        let url = visited.url.clone();
        if let Err(e) = self.crawl.upsert_visited(&visited) {
            tracing::warn!(%url, error = %e, "failed to upsert visited row");
        }

        storage_rows.push(storage);

        let next_crawl_time = next_crawl_time_for_rank(rank, Utc::now());
        if let Err(e) = self.crawl.mark_done(&url, next_crawl_time) {
            tracing::warn!(%url, error = %e, "failed to mark frontier row done");
        }

        let mut bloom = self.bloom.lock().unwrap();
        for (link_url, link_domain) in discovered_links {
            if bloom.contains(&link_url) {
                continue;
            }
            bloom.add(&link_url);
            let p = priority(&link_url);
            new_frontier_rows.push(FrontierEntry::new(link_url, link_domain, p));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::RotationalBloomFilter;
    use chrono::Utc;

    fn sample_outcome(url: &str, links: &[&str]) -> PageOutcome {
        PageOutcome {
            visited: VisitedRecord {
                url: url.to_string(),
                title: Some("Title".to_string()),
                description: Some("Desc".to_string()),
                http_status: Some(200),
                language: None,
                out_links: links.len() as u32,
                crawled_at: Utc::now(),
                crawl_epoch: 0,
                last_seen_epoch: 0,
                domain_rank: 0,
            },
            storage: StorageRecord {
                url: url.to_string(),
                raw_html: Some(b"<html></html>".to_vec()),
                parsed_text: Some("text".to_string()),
                title: Some("Title".to_string()),
                description: String::new(),
                h1: String::new(),
                h2: String::new(),
                important_text: String::new(),
                headers: None,
                crawled_at: Utc::now(),
            },
            discovered_links: links.iter().map(|l| (l.to_string(), "a.test".to_string())).collect(),
        }
    }

    fn test_writer() -> Writer {
        Writer::new(
            CrawlStore::open_in_memory().unwrap(),
            HtmlStore::open_in_memory().unwrap(),
            Arc::new(Mutex::new(RotationalBloomFilter::new(1 << 16, 7))),
            1,
            2_000,
        )
    }

    #[test]
    fn test_save_page_writes_visited_and_storage() {
        let mut writer = test_writer();
        writer.apply_batch(vec![WriteMessage::SavePage(sample_outcome("https://a.test/", &[]))]);

        assert_eq!(writer.crawl.count_visited().unwrap(), 1);
        assert_eq!(writer.html.count().unwrap(), 1);
    }

    #[test]
    fn test_save_page_discovers_new_frontier_rows() {
        let mut writer = test_writer();
        writer.apply_batch(vec![WriteMessage::SavePage(sample_outcome(
            "https://a.test/",
            &["https://a.test/child"],
        ))]);

        let pending = writer.crawl.count_by_status(crate::frontier::Status::Pending).unwrap();
        assert_eq!(pending, 1);
    }

    #[test]
    fn test_save_page_skips_bloom_duplicate_links() {
        let mut writer = test_writer();
        writer.bloom.lock().unwrap().add("https://a.test/child");
        writer.apply_batch(vec![WriteMessage::SavePage(sample_outcome(
            "https://a.test/",
            &["https://a.test/child"],
        ))]);

        let pending = writer.crawl.count_by_status(crate::frontier::Status::Pending).unwrap();
        assert_eq!(pending, 0);
    }

    #[test]
    fn test_mark_dead() {
        let mut writer = test_writer();
        writer
            .crawl
            .insert_frontier_entries(&[FrontierEntry::new("https://a.test/".to_string(), "a.test".to_string(), 1)])
            .unwrap();
        writer.apply_batch(vec![WriteMessage::MarkDead { url: "https://a.test/".to_string() }]);
        assert_eq!(writer.crawl.count_by_status(crate::frontier::Status::Dead).unwrap(), 1);
    }

    #[test]
    fn test_reserve_marks_in_flight() {
        let mut writer = test_writer();
        writer
            .crawl
            .insert_frontier_entries(&[FrontierEntry::new("https://a.test/".to_string(), "a.test".to_string(), 1)])
            .unwrap();
        writer.apply_batch(vec![WriteMessage::Reserve { urls: vec!["https://a.test/".to_string()] }]);
        assert_eq!(writer.crawl.count_by_status(crate::frontier::Status::InFlight).unwrap(), 1);
    }
}
