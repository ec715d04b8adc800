//! Read-only terminal dashboard (§6 `monitor`): periodically reads counts
//! from the three stores and the `runs` table and renders pipeline status.
//!
//! Grounded in the original crawler's own monitor: a plain clear-screen
//! print loop, not a TUI framework. No crate in this workspace pulls in a
//! TUI dependency, so neither does this module.

use crate::frontier::Status;
use crate::storage::{CrawlStore, RunStatus, SearchStore};
use std::collections::VecDeque;
use std::path::Path;
use tokio_util::sync::CancellationToken;

const REFRESH_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_secs(2);
/// Rolling window used to smooth the pages-per-minute readout.
const SPEED_WINDOW: usize = 30;

fn file_size_mb(path: &str) -> f64 {
    std::fs::metadata(path).map(|m| m.len() as f64 / (1024.0 * 1024.0)).unwrap_or(0.0)
}

struct Snapshot {
    crawled: u64,
    pending: u64,
    in_flight: u64,
    retrying: u64,
    indexed: u64,
}

fn read_snapshot(crawl: &CrawlStore, search: &SearchStore) -> Snapshot {
    Snapshot {
        crawled: crawl.count_visited().unwrap_or(0),
        pending: crawl.count_by_status(Status::Pending).unwrap_or(0),
        in_flight: crawl.count_by_status(Status::InFlight).unwrap_or(0),
        retrying: crawl.count_retry_rows().unwrap_or(0),
        indexed: search.count().unwrap_or(0),
    }
}

fn render(paths: &crate::config::PathsConfig, snapshot: &Snapshot, avg_ppm: f64, run_status: Option<RunStatus>) {
    print!("\x1B[2J\x1B[1;1H"); // clear screen, home cursor

    let db_mb = file_size_mb(&paths.crawl_db) + file_size_mb(&paths.storage_db) + file_size_mb(&paths.search_db);
    let wal_mb = file_size_mb(&format!("{}-wal", paths.crawl_db))
        + file_size_mb(&format!("{}-wal", paths.storage_db))
        + file_size_mb(&format!("{}-wal", paths.search_db));

    let daily_vol = avg_ppm * 60.0 * 24.0;

    println!("================== SUMI-RIPPLE MONITOR =================");
    println!();
    println!("  RUN");
    println!("  ---");
    println!("  Status:         {}", run_status.map(run_status_label).unwrap_or("no run recorded"));
    println!();
    println!("  PERFORMANCE");
    println!("  -----------");
    println!("  Speed:          {} PPM", avg_ppm as u64);
    println!("  Daily Vol:      {:.0} pages/24H", daily_vol);
    println!();
    println!("  STORAGE");
    println!("  -------");
    println!("  DB Size:        {db_mb:.1} MB");
    println!("  WAL Buffer:     {wal_mb:.1} MB  <-- (writes pending)");
    println!();
    println!("  PIPELINE STATUS");
    println!("  ---------------");
    println!("  1. Pending:     {}  (waiting in frontier)", snapshot.pending);
    println!("  2. In-Flight:   {}  (active fetches)", snapshot.in_flight);
    println!("  3. Crawled:     {}  (downloaded)", snapshot.crawled);
    println!("  4. Indexed:     {}  (searchable)", snapshot.indexed);
    println!();
    println!("  Errors/Retries: {}", snapshot.retrying);
    println!();
    println!("=========================================================");
    println!(" Press Ctrl+C to exit monitor");
}

fn run_status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Interrupted => "interrupted",
        RunStatus::Failed => "failed",
    }
}

/// Runs the dashboard loop until `cancel` fires.
pub async fn run(paths: crate::config::PathsConfig, cancel: CancellationToken) -> crate::Result<()> {
    println!("Initialising monitor...");

    let mut crawl = CrawlStore::open(Path::new(&paths.crawl_db))?;
    let search = SearchStore::open(Path::new(&paths.search_db), Path::new(&paths.crawl_db))?;

    let mut speed_history: VecDeque<f64> = VecDeque::with_capacity(SPEED_WINDOW);
    let mut last_crawled = crawl.count_visited().unwrap_or(0);
    let mut last_tick = tokio::time::Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let snapshot = read_snapshot(&crawl, &search);

        let now = tokio::time::Instant::now();
        let elapsed_secs = now.duration_since(last_tick).as_secs_f64();
        if elapsed_secs > 0.0 {
            let delta = snapshot.crawled.saturating_sub(last_crawled) as f64;
            let instant_ppm = (delta / elapsed_secs) * 60.0;
            if speed_history.len() == SPEED_WINDOW {
                speed_history.pop_front();
            }
            speed_history.push_back(instant_ppm);
        }
        last_crawled = snapshot.crawled;
        last_tick = now;

        let avg_ppm = if speed_history.is_empty() {
            0.0
        } else {
            speed_history.iter().sum::<f64>() / speed_history.len() as f64
        };

        let run_status = crawl.latest_run().ok().flatten().map(|r| r.status);
        render(&paths, &snapshot, avg_ppm, run_status);

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
        }
    }
}
