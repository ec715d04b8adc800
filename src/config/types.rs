use serde::Deserialize;

/// Top-level engine configuration, loaded from a single TOML file and shared
/// by every subcommand (`run-crawler`, `indexer`, `init-db`, `monitor`,
/// `search-server`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub crawler: CrawlerConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub bloom: BloomConfig,
    /// Built-in seed URLs injected into the frontier on first run.
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// User agent identification, sent on every outbound request and used to
/// evaluate robots.txt rules.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Renders the `User-Agent` header value: `Name/Version (+ContactURL; ContactEmail)`.
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Engine-wide tuning knobs enumerated in the environment/configuration section:
/// byte/char caps, per-domain cap, politeness delay, crawl epoch, thread
/// counts, batch size, timeouts and queue capacity.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// MAX_BYTES: hard cap on a fetched response body, default ~6MB.
    #[serde(rename = "max-bytes", default = "default_max_bytes")]
    pub max_bytes: usize,

    /// MAX_TEXT_CHARS: truncation length for extracted page text.
    #[serde(rename = "max-text-chars", default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// MAX_PAGES_PER_DOMAIN: per-domain crawl cap enforced by the domain governor.
    #[serde(rename = "max-pages-per-domain", default = "default_max_pages_per_domain")]
    pub max_pages_per_domain: u32,

    /// CRAWL_DELAY: minimum seconds between fetches to the same domain,
    /// absent an explicit robots.txt `Crawl-delay`.
    #[serde(rename = "crawl-delay", default = "default_crawl_delay")]
    pub crawl_delay_secs: u64,

    /// CRAWL_EPOCH: integer label for the current crawl campaign.
    #[serde(rename = "crawl-epoch", default)]
    pub crawl_epoch: u32,

    /// FETCH_THREADS: number of concurrent fetch workers.
    #[serde(rename = "fetch-threads", default = "default_fetch_threads")]
    pub fetch_threads: usize,

    /// PARSE_THREADS: number of concurrent parse workers.
    #[serde(rename = "parse-threads", default = "default_parse_threads")]
    pub parse_threads: usize,

    /// BATCH_SIZE: maximum write-queue messages drained per DB writer tick.
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Bounded fetch queue capacity (dispatcher backpressure signal).
    #[serde(rename = "fetch-queue-capacity", default = "default_fetch_queue_capacity")]
    pub fetch_queue_capacity: usize,

    /// Per-request TCP connect timeout in seconds.
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request body read timeout in seconds.
    #[serde(rename = "read-timeout-secs", default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Maximum retries for transient network errors before a URL is marked DEAD.
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Dispatcher batch size (rows reserved per `next_batch()` call).
    #[serde(rename = "dispatch-batch-size", default = "default_dispatch_batch_size")]
    pub dispatch_batch_size: usize,
}

fn default_max_bytes() -> usize {
    6_000_000
}
fn default_max_text_chars() -> usize {
    200_000
}
fn default_max_pages_per_domain() -> u32 {
    10_000
}
fn default_crawl_delay() -> u64 {
    1
}
fn default_fetch_threads() -> usize {
    200
}
fn default_parse_threads() -> usize {
    75
}
fn default_batch_size() -> usize {
    2_000
}
fn default_fetch_queue_capacity() -> usize {
    5_000
}
fn default_connect_timeout() -> u64 {
    3
}
fn default_read_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_dispatch_batch_size() -> usize {
    500
}

/// Filesystem locations for the three SQLite stores and auxiliary state files.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(rename = "crawl-db")]
    pub crawl_db: String,

    #[serde(rename = "storage-db")]
    pub storage_db: String,

    #[serde(rename = "search-db")]
    pub search_db: String,

    #[serde(rename = "log-path", default = "default_log_path")]
    pub log_path: String,

    #[serde(rename = "indexer-state-path", default = "default_indexer_state_path")]
    pub indexer_state_path: String,

    #[serde(rename = "bloom-hot-path", default = "default_bloom_hot_path")]
    pub bloom_hot_path: String,

    #[serde(rename = "bloom-cold-path", default = "default_bloom_cold_path")]
    pub bloom_cold_path: String,

    /// CSV file of `domain,rank` rows used by `init-db` to seed
    /// `domain_authority`. The Tranco CSV/zip export itself is an external
    /// collaborator; this path points at the already-unzipped CSV.
    #[serde(rename = "authority-csv")]
    pub authority_csv: Option<String>,
}

fn default_log_path() -> String {
    "./sumi-ripple.log".to_string()
}
fn default_indexer_state_path() -> String {
    "./indexer_state.txt".to_string()
}
fn default_bloom_hot_path() -> String {
    "./bloom_hot.bin".to_string()
}
fn default_bloom_cold_path() -> String {
    "./bloom_cold.bin".to_string()
}

/// Search API tuning: bind address and the per-source-IP sliding-window rate limit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(rename = "bind-addr", default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(rename = "rate-limit-requests", default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    #[serde(rename = "rate-limit-window-secs", default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,

    #[serde(rename = "results-per-page", default = "default_results_per_page")]
    pub results_per_page: usize,

    #[serde(rename = "max-candidates", default = "default_max_candidates")]
    pub max_candidates: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_rate_limit_requests() -> u32 {
    30
}
fn default_rate_limit_window() -> u64 {
    60
}
fn default_results_per_page() -> usize {
    20
}
fn default_max_candidates() -> usize {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window(),
            results_per_page: default_results_per_page(),
            max_candidates: default_max_candidates(),
        }
    }
}

/// Rotational bloom filter sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct BloomConfig {
    #[serde(default = "default_bloom_bits")]
    pub bits: usize,
    #[serde(default = "default_bloom_hashes")]
    pub hashes: u32,
}

fn default_bloom_bits() -> usize {
    crate::bloom::DEFAULT_BITS
}
fn default_bloom_hashes() -> u32 {
    crate::bloom::DEFAULT_HASHES
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            bits: default_bloom_bits(),
            hashes: default_bloom_hashes(),
        }
    }
}
