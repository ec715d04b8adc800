//! Offline full-text indexer (§4.9): drains newly-stored pages into the
//! search index, independent of the crawl pipeline.
//!
//! Runs as its own long-lived loop (the `indexer` CLI subcommand). Persists a
//! row-id watermark to disk so a restart resumes where the previous run left
//! off, detects language on a prefix of the extracted text and pushes a
//! best-effort language update back to the crawl store, and recycles its
//! SQLite connections periodically to bound long-run memory growth.

use crate::storage::{HtmlStore, SearchIndexRecord, SearchStore};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Rows pulled from `html_storage` per iteration.
const BATCH_LIMIT: usize = 2_500;
/// Connections are recycled every this many batches to bound memory growth
/// across a long-running indexer process.
const RECYCLE_EVERY_BATCHES: u32 = 100;
/// Language is detected on a prefix of the extracted text; short pages below
/// this length are skipped (too little signal for reliable detection).
const LANGUAGE_DETECT_CHARS: usize = 1_000;

pub struct Indexer {
    storage_db: PathBuf,
    crawl_db: PathBuf,
    search_db: PathBuf,
    watermark_path: PathBuf,
}

impl Indexer {
    pub fn new(storage_db: PathBuf, crawl_db: PathBuf, search_db: PathBuf, watermark_path: PathBuf) -> Self {
        Self {
            storage_db,
            crawl_db,
            search_db,
            watermark_path,
        }
    }

    fn load_watermark(&self, html: &HtmlStore) -> crate::Result<i64> {
        let persisted = std::fs::read_to_string(&self.watermark_path)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0);

        // §7 "watermark > MAX(rowid): reset to 0" (database was rebuilt).
        let max_rowid = html.max_rowid()?;
        if persisted > max_rowid {
            Ok(0)
        } else {
            Ok(persisted)
        }
    }

    fn save_watermark(&self, watermark: i64) -> crate::Result<()> {
        let tmp = self.watermark_path.with_extension("tmp");
        std::fs::write(&tmp, watermark.to_string())?;
        std::fs::rename(&tmp, &self.watermark_path)?;
        Ok(())
    }

    /// Runs one batch: reads up to [`BATCH_LIMIT`] unseen storage rows,
    /// builds index rows and language updates, and applies both. Returns the
    /// number of rows processed (0 means caught up).
    fn run_batch(&self, html: &HtmlStore, search: &mut SearchStore, crawl: &mut crate::storage::CrawlStore, watermark: i64) -> crate::Result<(i64, usize)> {
        let rows = html.rows_after(watermark, BATCH_LIMIT)?;
        if rows.is_empty() {
            return Ok((watermark, 0));
        }

        let mut index_rows = Vec::with_capacity(rows.len());
        let mut new_watermark = watermark;

        for (rowid, record) in &rows {
            new_watermark = new_watermark.max(*rowid);

            let Some(text) = record.parsed_text.as_deref() else {
                continue;
            };

            let title = record
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| text.lines().next().unwrap_or_default().to_string());

            index_rows.push(SearchIndexRecord {
                url: record.url.clone(),
                title,
                description: record.description.clone(),
                content: text.to_string(),
                h1: record.h1.clone(),
                h2: record.h2.clone(),
                important_text: record.important_text.clone(),
            });

            if text.chars().count() >= LANGUAGE_DETECT_CHARS {
                let prefix: String = text.chars().take(LANGUAGE_DETECT_CHARS).collect();
                if let Some(info) = whatlang::detect(&prefix) {
                    let _ = crawl.update_language(&record.url, info.lang().code());
                }
            }
        }

        if !index_rows.is_empty() {
            search.insert_batch(&index_rows)?;
        }

        Ok((new_watermark, rows.len()))
    }

    /// Runs the indexer loop until `cancel` fires. Each iteration processes
    /// one batch; an empty batch sleeps briefly before polling again.
    pub async fn run(self, cancel: CancellationToken) -> crate::Result<()> {
        let mut html = HtmlStore::open(&self.storage_db)?;
        let mut search = SearchStore::open(&self.search_db, &self.crawl_db)?;
        let mut crawl = crate::storage::CrawlStore::open(&self.crawl_db)?;

        let mut watermark = self.load_watermark(&html)?;
        let mut batches_since_recycle: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let (new_watermark, processed) = self.run_batch(&html, &mut search, &mut crawl, watermark)?;
            if processed > 0 {
                watermark = new_watermark;
                self.save_watermark(watermark)?;
                batches_since_recycle += 1;
                tracing::info!(watermark, processed, "indexer advanced watermark");
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(2)) => {}
                }
            }

            if batches_since_recycle >= RECYCLE_EVERY_BATCHES {
                html = HtmlStore::open(&self.storage_db)?;
                search = SearchStore::open(&self.search_db, &self.crawl_db)?;
                crawl = crate::storage::CrawlStore::open(&self.crawl_db)?;
                batches_since_recycle = 0;
                tracing::debug!("indexer recycled store connections");
            }
        }
    }
}

/// Builds an [`Indexer`] from config paths.
pub fn from_paths(paths: &crate::config::PathsConfig) -> Indexer {
    Indexer::new(
        Path::new(&paths.storage_db).to_path_buf(),
        Path::new(&paths.crawl_db).to_path_buf(),
        Path::new(&paths.search_db).to_path_buf(),
        Path::new(&paths.indexer_state_path).to_path_buf(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageRecord;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_row(url: &str, text: &str) -> StorageRecord {
        StorageRecord {
            url: url.to_string(),
            raw_html: None,
            parsed_text: Some(text.to_string()),
            title: Some("Title".to_string()),
            description: "a description".to_string(),
            h1: "Heading".to_string(),
            h2: String::new(),
            important_text: String::new(),
            headers: None,
            crawled_at: Utc::now(),
        }
    }

    #[test]
    fn test_watermark_resets_when_above_max_rowid() {
        let dir = tempdir().unwrap();
        let watermark_path = dir.path().join("watermark.txt");
        std::fs::write(&watermark_path, "9999").unwrap();

        let html = HtmlStore::open_in_memory().unwrap();
        let indexer = Indexer::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), watermark_path);
        assert_eq!(indexer.load_watermark(&html).unwrap(), 0);
    }

    #[test]
    fn test_watermark_persists_below_max_rowid() {
        let dir = tempdir().unwrap();
        let watermark_path = dir.path().join("watermark.txt");
        std::fs::write(&watermark_path, "1").unwrap();

        let mut html = HtmlStore::open_in_memory().unwrap();
        html.upsert(&sample_row("https://a.test/", "hello")).unwrap();
        html.upsert(&sample_row("https://b.test/", "world")).unwrap();

        let indexer = Indexer::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), watermark_path);
        assert_eq!(indexer.load_watermark(&html).unwrap(), 1);
    }

    #[test]
    fn test_run_batch_indexes_and_advances_watermark() {
        let crawl_file = tempfile::NamedTempFile::new().unwrap();
        let mut crawl = crate::storage::CrawlStore::open(crawl_file.path()).unwrap();

        let mut html = HtmlStore::open_in_memory().unwrap();
        html.upsert(&sample_row("https://a.test/", "hello world")).unwrap();

        let mut search = SearchStore::open_in_memory_with_crawl(crawl_file.path()).unwrap();

        let indexer = Indexer::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), PathBuf::new());
        let (new_watermark, processed) = indexer.run_batch(&html, &mut search, &mut crawl, 0).unwrap();

        assert_eq!(processed, 1);
        assert_eq!(new_watermark, 1);
        assert_eq!(search.count().unwrap(), 1);
    }

    #[test]
    fn test_run_batch_skips_null_parsed_text() {
        // `HtmlStore::rows_after` already filters `parsed_text IS NOT NULL`
        // at the SQL level, so a null-text row never reaches the indexer.
        let crawl_file = tempfile::NamedTempFile::new().unwrap();
        let mut crawl = crate::storage::CrawlStore::open(crawl_file.path()).unwrap();

        let mut html = HtmlStore::open_in_memory().unwrap();
        let mut row = sample_row("https://a.test/", "");
        row.parsed_text = None;
        html.upsert(&row).unwrap();

        let mut search = SearchStore::open_in_memory_with_crawl(crawl_file.path()).unwrap();
        let indexer = Indexer::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), PathBuf::new());
        let (new_watermark, processed) = indexer.run_batch(&html, &mut search, &mut crawl, 0).unwrap();

        assert_eq!(processed, 0);
        assert_eq!(new_watermark, 0);
        assert_eq!(search.count().unwrap(), 0);
    }

    #[test]
    fn test_run_batch_empty_when_caught_up() {
        let crawl_file = tempfile::NamedTempFile::new().unwrap();
        let mut crawl = crate::storage::CrawlStore::open(crawl_file.path()).unwrap();
        let html = HtmlStore::open_in_memory().unwrap();
        let mut search = SearchStore::open_in_memory_with_crawl(crawl_file.path()).unwrap();

        let indexer = Indexer::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), PathBuf::new());
        let (watermark, processed) = indexer.run_batch(&html, &mut search, &mut crawl, 0).unwrap();
        assert_eq!(watermark, 0);
        assert_eq!(processed, 0);
    }

    #[test]
    fn test_title_falls_back_to_first_line_of_text() {
        let crawl_file = tempfile::NamedTempFile::new().unwrap();
        let mut crawl = crate::storage::CrawlStore::open(crawl_file.path()).unwrap();

        let mut html = HtmlStore::open_in_memory().unwrap();
        let mut row = sample_row("https://a.test/", "First line of content\nmore text");
        row.title = None;
        html.upsert(&row).unwrap();

        let mut search = SearchStore::open_in_memory_with_crawl(crawl_file.path()).unwrap();
        let indexer = Indexer::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), PathBuf::new());
        indexer.run_batch(&html, &mut search, &mut crawl, 0).unwrap();

        let candidates = search.candidates("content", 10).unwrap();
        assert_eq!(candidates[0].title, "First line of content");
    }
}
