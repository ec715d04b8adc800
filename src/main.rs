//! Sumi-Ripple: a polite, single-host web crawler and its companion search stack
//!
//! This is the command-line front-door: `run-crawler`, `indexer`, `init-db`,
//! `monitor` and `search-server` all share one TOML configuration file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sumi_ripple::config::{compute_config_hash, load_config_with_hash, Config};
use sumi_ripple::storage::{CrawlStore, DomainAuthorityRecord, RunStatus};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sumi-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A polite single-host web crawler and search stack", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output.
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the crawl engine; resumes an interrupted run unless `--fresh` is given.
    RunCrawler {
        /// Ignore any previous frontier state and reseed from the config's seed list.
        #[arg(long)]
        fresh: bool,
    },
    /// Run the offline full-text indexer loop until Ctrl+C.
    Indexer,
    /// Create fresh schemas, load the authority CSV, and seed the frontier.
    InitDb,
    /// Read-only terminal dashboard over the three stores.
    Monitor,
    /// Start the JSON search API service.
    SearchServer,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing::info!(config = %cli.config.display(), "loading configuration");
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    // The file-appender guard must outlive every subcommand below, or buffered
    // log lines never reach `paths.log_path` before the process exits.
    let _log_guard = setup_logging(cli.verbose, cli.quiet, &config.paths.log_path);
    tracing::info!(hash = %config_hash, "configuration loaded");

    match cli.command {
        Command::RunCrawler { fresh } => run_crawler(config, config_hash, fresh).await,
        Command::Indexer => run_indexer(config).await,
        Command::InitDb => run_init_db(config),
        Command::Monitor => run_monitor(config).await,
        Command::SearchServer => run_search_server(config).await,
    }
}

/// Installs a stdout layer plus a non-blocking file layer over `log_path`.
/// The returned guard flushes the file writer on drop; callers must hold it
/// for the lifetime of `main`.
fn setup_logging(verbose: u8, quiet: bool, log_path: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_ripple=info,warn"),
            1 => EnvFilter::new("sumi_ripple=debug,info"),
            2 => EnvFilter::new("sumi_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let log_path = std::path::Path::new(log_path);
    let directory = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("sumi-ripple.log"));
    let file_appender = tracing_appender::rolling::daily(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).with_thread_ids(false).with_file(false);
    let file_layer = tracing_subscriber::fmt::layer().with_target(false).with_ansi(false).with_writer(non_blocking);

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();

    guard
}

async fn run_crawler(config: Config, config_hash: String, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let crawl_db_path = std::path::Path::new(&config.paths.crawl_db).to_path_buf();
    let mut run_tracker = CrawlStore::open(&crawl_db_path)?;
    let run_id = run_tracker.start_run(&config_hash)?;
    drop(run_tracker);

    tracing::info!(run_id, fresh, "starting crawl run");
    let coordinator = sumi_ripple::crawler::Coordinator::new(config, fresh)?;
    let result = coordinator.run().await;

    let mut run_tracker = CrawlStore::open(&crawl_db_path)?;
    let status = match &result {
        Ok(()) => RunStatus::Completed,
        Err(_) => RunStatus::Failed,
    };
    run_tracker.finish_run(run_id, status)?;

    result?;
    Ok(())
}

async fn run_indexer(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let indexer = sumi_ripple::indexer::from_paths(&config.paths);
    let cancel = tokio_util::sync::CancellationToken::new();
    let cancel_for_signal = cancel.clone();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal, stopping indexer");
        cancel_for_signal.cancel();
    });

    indexer.run(cancel).await?;
    Ok(())
}

fn run_init_db(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let stores = sumi_ripple::storage::open_stores(&config.paths)?;
    let mut crawl = stores.crawl;
    drop(stores.html);
    drop(stores.search);
    tracing::info!("schemas created");

    if let Some(csv_path) = &config.paths.authority_csv {
        tracing::info!(path = %csv_path, "loading domain authority list");
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(csv_path)?;
        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let (Some(domain), Some(rank)) = (record.get(0), record.get(1)) else {
                continue;
            };
            let Ok(rank) = rank.trim().parse::<i64>() else {
                continue;
            };
            records.push(DomainAuthorityRecord { domain: domain.trim().to_lowercase(), rank });
        }
        tracing::info!(count = records.len(), "parsed authority rows");
        crawl.insert_domain_authority_batch(&records)?;
    } else {
        tracing::warn!("no authority-csv configured; domain_authority left empty");
    }

    let top_domains = crawl.top_authority_domains(5_000)?;
    let mut entries: Vec<sumi_ripple::frontier::FrontierEntry> = top_domains
        .into_iter()
        .map(|domain| {
            let seed_url = format!("https://{domain}/");
            let priority = sumi_ripple::frontier::priority(&seed_url);
            sumi_ripple::frontier::FrontierEntry::new(seed_url, domain, priority)
        })
        .collect();

    for seed in &config.seeds {
        if let Ok(canonical) = sumi_ripple::normalize_url(seed, None) {
            if let Some(domain) = sumi_ripple::extract_domain(&canonical) {
                let priority = sumi_ripple::frontier::priority(canonical.as_str());
                entries.push(sumi_ripple::frontier::FrontierEntry::new(canonical.to_string(), domain, priority));
            }
        }
    }

    let inserted = crawl.insert_frontier_entries(&entries)?;
    tracing::info!(inserted, "seeded frontier");

    Ok(())
}

async fn run_monitor(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = tokio_util::sync::CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_for_signal.cancel();
    });

    sumi_ripple::monitor::run(config.paths, cancel).await?;
    println!("\nMonitor closed.");
    Ok(())
}

async fn run_search_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let app = sumi_ripple::search::build_app(&config.search, &config.paths)?;
    let addr: std::net::SocketAddr = config.search.bind_addr.parse()?;

    tracing::info!(%addr, "starting search API");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
