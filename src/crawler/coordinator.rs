//! Coordinator: wires the dispatcher, fetcher pool, parser pool and DB
//! writer into one running crawl, and owns cooperative shutdown (§5, §9).
//!
//! Shutdown sequence on SIGINT: cancel the dispatcher and every fetcher/parser
//! loop, join them (so every in-flight `write_tx` clone is dropped), let the
//! writer drain the remaining queue and exit, reclaim any row still marked
//! IN_FLIGHT (a crash-safety net — the clean-shutdown path above should leave
//! none), then checkpoint the bloom filter to disk.

use crate::bloom::RotationalBloomFilter;
use crate::config::Config;
use crate::crawler::dispatcher::Dispatcher;
use crate::crawler::fetcher::{build_client_pair, fetch};
use crate::crawler::parser::{compress_html, parse_html};
use crate::crawler::writer::{PageOutcome, WriteMessage, Writer};
use crate::frontier::{priority, FrontierEntry, Status};
use crate::state::DomainGovernor;
use crate::storage::{open_stores, CrawlStore, HtmlStore, StorageRecord, Stores, VisitedRecord};
use crate::url::{extract_domain, normalize_url};
use chrono::Utc;
use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// A page handed from a fetcher to a parser: the fetched bytes plus just
/// enough provenance to build the eventual [`VisitedRecord`]/[`StorageRecord`].
struct FetchedPage {
    url: String,
    status: u16,
    body: Vec<u8>,
    headers: String,
    fetched_at: chrono::DateTime<Utc>,
}

pub struct Coordinator {
    config: Config,
    stores: Stores,
}

impl Coordinator {
    /// Opens the three stores and seeds the frontier. `fresh` forces a
    /// reseed from `config.seeds` even if the frontier already has rows
    /// (`run-crawler --fresh`); otherwise seeding only happens on an empty
    /// frontier, so resuming a prior run never re-adds the seeds.
    pub fn new(config: Config, fresh: bool) -> crate::Result<Self> {
        let stores = open_stores(&config.paths)?;
        let mut coordinator = Self { config, stores };
        coordinator.seed_frontier(fresh)?;
        Ok(coordinator)
    }

    fn seed_frontier(&mut self, fresh: bool) -> crate::Result<()> {
        if !fresh {
            let pending = self.stores.crawl.count_by_status(Status::Pending)?;
            let done = self.stores.crawl.count_by_status(Status::Done)?;
            if pending + done > 0 {
                return Ok(());
            }
        }

        let mut entries = Vec::new();
        for seed in &self.config.seeds {
            let Ok(canonical) = normalize_url(seed, None) else {
                tracing::warn!(%seed, "skipping unparseable seed URL");
                continue;
            };
            let Some(domain) = extract_domain(&canonical) else {
                continue;
            };
            let p = priority(canonical.as_str());
            entries.push(FrontierEntry::new(canonical.to_string(), domain, p));
        }

        if !entries.is_empty() {
            self.stores.crawl.insert_frontier_entries(&entries)?;
        }
        Ok(())
    }

    /// Runs the crawl pipeline until `ctrl_c`, then shuts down cooperatively.
    pub async fn run(self) -> crate::Result<()> {
        let Coordinator { config, stores } = self;
        let Stores { crawl, html, search: _ } = stores;

        let cancel = CancellationToken::new();

        let bloom_hot_path = Path::new(&config.paths.bloom_hot_path).to_path_buf();
        let bloom_cold_path = Path::new(&config.paths.bloom_cold_path).to_path_buf();
        let bloom = if bloom_hot_path.exists() || bloom_cold_path.exists() {
            RotationalBloomFilter::restore(config.bloom.bits, config.bloom.hashes, &bloom_hot_path, &bloom_cold_path)
        } else {
            RotationalBloomFilter::new(config.bloom.bits, config.bloom.hashes)
        };
        let bloom = Arc::new(StdMutex::new(bloom));

        let governor = Arc::new(DomainGovernor::new(
            config.crawler.max_pages_per_domain,
            Duration::from_secs(config.crawler.crawl_delay_secs),
        ));

        let (strict_client, permissive_client) =
            build_client_pair(&config.user_agent, config.crawler.connect_timeout_secs, config.crawler.read_timeout_secs)?;
        let strict_client = Arc::new(strict_client);
        let permissive_client = Arc::new(permissive_client);

        let (fetch_tx, fetch_rx) = mpsc::channel::<FrontierEntry>(config.crawler.fetch_queue_capacity);
        let fetch_rx = Arc::new(TokioMutex::new(fetch_rx));
        let (parse_tx, parse_rx) = mpsc::unbounded_channel::<FetchedPage>();
        let parse_rx = Arc::new(TokioMutex::new(parse_rx));
        let (write_tx, write_rx) = mpsc::unbounded_channel::<WriteMessage>();

        let dispatcher_store = CrawlStore::open(Path::new(&config.paths.crawl_db))?;
        let dispatcher = Dispatcher::new(config.crawler.dispatch_batch_size);
        let dispatcher_handle = tokio::spawn(run_dispatcher(
            dispatcher,
            dispatcher_store,
            fetch_tx.clone(),
            write_tx.clone(),
            config.crawler.fetch_queue_capacity,
            cancel.clone(),
        ));

        let user_agent_header = config.user_agent.header_value();
        let mut fetcher_handles = Vec::new();
        for _ in 0..config.crawler.fetch_threads {
            fetcher_handles.push(tokio::spawn(run_fetcher(
                fetch_rx.clone(),
                parse_tx.clone(),
                write_tx.clone(),
                governor.clone(),
                strict_client.clone(),
                permissive_client.clone(),
                user_agent_header.clone(),
                config.crawler.max_bytes,
                config.crawler.max_retries,
                cancel.clone(),
            )));
        }
        drop(parse_tx);

        let mut parser_handles = Vec::new();
        for _ in 0..config.crawler.parse_threads {
            parser_handles.push(tokio::spawn(run_parser(
                parse_rx.clone(),
                write_tx.clone(),
                fetch_tx.clone(),
                config.crawler.fetch_queue_capacity,
                config.crawler.max_text_chars,
                cancel.clone(),
            )));
        }
        drop(fetch_tx);
        drop(write_tx);

        let writer = Writer::new(crawl, html, bloom.clone(), config.crawler.crawl_epoch, config.crawler.batch_size);
        let writer_handle = tokio::spawn(writer.run(write_rx));

        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal, draining pipeline");
        cancel.cancel();

        let _ = dispatcher_handle.await;
        for handle in fetcher_handles {
            let _ = handle.await;
        }
        for handle in parser_handles {
            let _ = handle.await;
        }
        let _ = writer_handle.await;

        let mut reclaim_store = CrawlStore::open(Path::new(&config.paths.crawl_db))?;
        let reclaimed = reclaim_store.reclaim_all_in_flight()?;
        if reclaimed > 0 {
            tracing::info!(reclaimed, "reclaimed in-flight frontier rows on shutdown");
        }

        {
            let bloom_guard = bloom.lock().unwrap();
            bloom_guard.checkpoint(&bloom_hot_path, &bloom_cold_path)?;
        }

        Ok(())
    }
}

async fn run_dispatcher(
    mut dispatcher: Dispatcher,
    store: CrawlStore,
    fetch_tx: mpsc::Sender<FrontierEntry>,
    write_tx: mpsc::UnboundedSender<WriteMessage>,
    fetch_queue_capacity: usize,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let spare = fetch_tx.capacity();
        if spare <= fetch_queue_capacity / 2 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            continue;
        }

        let batch = match dispatcher.next_batch(&store, spare) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "dispatcher failed to select next batch");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        if batch.is_empty() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }

        let urls: Vec<String> = batch.iter().map(|e| e.url.clone()).collect();
        if write_tx.send(WriteMessage::Reserve { urls }).is_err() {
            return;
        }

        for entry in batch {
            if fetch_tx.send(entry).await.is_err() {
                return;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_fetcher(
    fetch_rx: Arc<TokioMutex<mpsc::Receiver<FrontierEntry>>>,
    parse_tx: mpsc::UnboundedSender<FetchedPage>,
    write_tx: mpsc::UnboundedSender<WriteMessage>,
    governor: Arc<DomainGovernor>,
    strict_client: Arc<Client>,
    permissive_client: Arc<Client>,
    user_agent: String,
    max_bytes: usize,
    max_retries: u32,
    cancel: CancellationToken,
) {
    loop {
        let entry = {
            let mut rx = fetch_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                maybe = rx.recv() => maybe,
            }
        };
        let Some(entry) = entry else {
            return;
        };

        if !governor.can_crawl(&entry.domain) {
            let _ = write_tx.send(WriteMessage::MarkRetry { url: entry.url.clone(), priority_penalty: 0 });
            continue;
        }

        let path = ::url::Url::parse(&entry.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        if !governor.check_allow(&entry.domain, &path, &user_agent).await {
            let _ = write_tx.send(WriteMessage::MarkDead { url: entry.url.clone() });
            continue;
        }

        governor.mark_access(&entry.domain);

        match fetch(&strict_client, &permissive_client, &entry.url, max_bytes).await {
            Ok(success) => {
                governor.mark_success(&entry.domain);
                let fetched = FetchedPage {
                    url: success.final_url,
                    status: success.status,
                    body: success.body,
                    headers: success.headers,
                    fetched_at: Utc::now(),
                };
                if parse_tx.send(fetched).is_err() {
                    return;
                }
            }
            Err(kind) => {
                governor.mark_failure(&entry.domain);
                if kind.is_retryable() && entry.retry_count < max_retries {
                    let _ = write_tx.send(WriteMessage::MarkRetry { url: entry.url.clone(), priority_penalty: 10 });
                } else {
                    let _ = write_tx.send(WriteMessage::MarkDead { url: entry.url.clone() });
                }
            }
        }
    }
}

async fn run_parser(
    parse_rx: Arc<TokioMutex<mpsc::UnboundedReceiver<FetchedPage>>>,
    write_tx: mpsc::UnboundedSender<WriteMessage>,
    fetch_tx_probe: mpsc::Sender<FrontierEntry>,
    fetch_queue_capacity: usize,
    max_text_chars: usize,
    cancel: CancellationToken,
) {
    loop {
        let fetched = {
            let mut rx = parse_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                maybe = rx.recv() => maybe,
            }
        };
        let Some(fetched) = fetched else {
            return;
        };

        let Ok(page_url) = ::url::Url::parse(&fetched.url) else {
            continue;
        };
        let parsed = parse_html(&fetched.body, &page_url, max_text_chars);
        let compressed = compress_html(&fetched.body).unwrap_or_default();

        let used = fetch_queue_capacity.saturating_sub(fetch_tx_probe.capacity());
        let backpressured = used as f64 / fetch_queue_capacity.max(1) as f64 > 1.0 / 1.67;

        let discovered_links: Vec<(String, String)> = if backpressured {
            Vec::new()
        } else {
            parsed
                .links
                .iter()
                .filter_map(|l| ::url::Url::parse(l).ok().map(|u| (l.clone(), extract_domain(&u).unwrap_or_default())))
                .collect()
        };

        let visited = VisitedRecord {
            url: fetched.url.clone(),
            title: parsed.title.clone(),
            description: Some(parsed.description.clone()),
            http_status: Some(fetched.status),
            language: None,
            out_links: discovered_links.len() as u32,
            crawled_at: fetched.fetched_at,
            crawl_epoch: 0,
            last_seen_epoch: 0,
            domain_rank: 0,
        };

        let storage = StorageRecord {
            url: fetched.url.clone(),
            raw_html: Some(compressed),
            parsed_text: Some(parsed.content.clone()),
            title: parsed.title,
            description: parsed.description,
            h1: parsed.h1,
            h2: parsed.h2,
            important_text: parsed.important_text,
            headers: Some(fetched.headers.clone()),
            crawled_at: fetched.fetched_at,
        };

        let _ = write_tx.send(WriteMessage::SavePage(PageOutcome {
            visited,
            storage,
            discovered_links,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BloomConfig, CrawlerConfig, PathsConfig, SearchConfig, UserAgentConfig};

    fn test_config(crawl_db: &Path, storage_db: &Path, search_db: &Path) -> Config {
        Config {
            user_agent: UserAgentConfig {
                crawler_name: "sumi-ripple".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "bot@example.com".to_string(),
            },
            crawler: CrawlerConfig {
                max_bytes: 6_000_000,
                max_text_chars: 200_000,
                max_pages_per_domain: 10_000,
                crawl_delay_secs: 0,
                crawl_epoch: 1,
                fetch_threads: 1,
                parse_threads: 1,
                batch_size: 2_000,
                fetch_queue_capacity: 100,
                connect_timeout_secs: 3,
                read_timeout_secs: 10,
                max_retries: 2,
                dispatch_batch_size: 50,
            },
            paths: PathsConfig {
                crawl_db: crawl_db.to_string_lossy().to_string(),
                storage_db: storage_db.to_string_lossy().to_string(),
                search_db: search_db.to_string_lossy().to_string(),
                log_path: "./test.log".to_string(),
                indexer_state_path: "./indexer_state.txt".to_string(),
                bloom_hot_path: "./test_bloom_hot.bin".to_string(),
                bloom_cold_path: "./test_bloom_cold.bin".to_string(),
                authority_csv: None,
            },
            search: SearchConfig::default(),
            bloom: BloomConfig::default(),
            seeds: vec!["https://example.com/".to_string()],
        }
    }

    #[test]
    fn test_seed_frontier_on_fresh_start() {
        let crawl_dir = tempfile::tempdir().unwrap();
        let crawl_db = crawl_dir.path().join("crawl.db");
        let storage_db = crawl_dir.path().join("storage.db");
        let search_db = crawl_dir.path().join("search.db");

        let config = test_config(&crawl_db, &storage_db, &search_db);
        let coordinator = Coordinator::new(config, true).unwrap();
        assert_eq!(coordinator.stores.crawl.count_by_status(Status::Pending).unwrap(), 1);
    }

    #[test]
    fn test_resume_does_not_reseed() {
        let crawl_dir = tempfile::tempdir().unwrap();
        let crawl_db = crawl_dir.path().join("crawl.db");
        let storage_db = crawl_dir.path().join("storage.db");
        let search_db = crawl_dir.path().join("search.db");

        let config = test_config(&crawl_db, &storage_db, &search_db);
        let mut coordinator = Coordinator::new(config, false).unwrap();
        coordinator.stores.crawl.mark_done("https://example.com/", Utc::now()).unwrap();

        let config2 = test_config(&crawl_db, &storage_db, &search_db);
        let coordinator2 = Coordinator::new(config2, false).unwrap();
        assert_eq!(coordinator2.stores.crawl.count_by_status(Status::Pending).unwrap(), 0);
        assert_eq!(coordinator2.stores.crawl.count_by_status(Status::Done).unwrap(), 1);
    }
}
