//! Integration tests for the crawl pipeline.
//!
//! These use wiremock to stand up a mock HTTP server and drive the full
//! dispatcher/fetcher/parser/writer pipeline through [`Coordinator::run`].
//! `run()` only returns on SIGINT, so each test spawns it, gives the
//! pipeline time to drain a small, fully-mocked site, then aborts the task
//! and inspects the stores directly through fresh connections.

use sumi_ripple::config::{BloomConfig, Config, CrawlerConfig, PathsConfig, SearchConfig, UserAgentConfig};
use sumi_ripple::crawler::Coordinator;
use sumi_ripple::frontier::Status;
use sumi_ripple::storage::{CrawlStore, HtmlStore};
use tokio::time::{sleep, Duration};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Time given to the pipeline to drain a small, fully in-memory-served site.
const SETTLE_TIME: Duration = Duration::from_millis(800);

struct TestPaths {
    _dir: tempfile::TempDir,
    crawl_db: String,
    storage_db: String,
    search_db: String,
}

fn test_paths() -> TestPaths {
    let dir = tempfile::tempdir().unwrap();
    TestPaths {
        crawl_db: dir.path().join("crawl.db").to_string_lossy().to_string(),
        storage_db: dir.path().join("storage.db").to_string_lossy().to_string(),
        search_db: dir.path().join("search.db").to_string_lossy().to_string(),
        _dir: dir,
    }
}

fn test_config(seeds: Vec<String>, paths: &TestPaths) -> Config {
    Config {
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        crawler: CrawlerConfig {
            max_bytes: 6_000_000,
            max_text_chars: 200_000,
            max_pages_per_domain: 10_000,
            crawl_delay_secs: 0,
            crawl_epoch: 1,
            fetch_threads: 4,
            parse_threads: 2,
            batch_size: 2_000,
            fetch_queue_capacity: 100,
            connect_timeout_secs: 3,
            read_timeout_secs: 10,
            max_retries: 0,
            dispatch_batch_size: 50,
        },
        paths: PathsConfig {
            crawl_db: paths.crawl_db.clone(),
            storage_db: paths.storage_db.clone(),
            search_db: paths.search_db.clone(),
            log_path: "./test.log".to_string(),
            indexer_state_path: "./test_indexer_state.txt".to_string(),
            bloom_hot_path: format!("{}.bloom_hot", paths.crawl_db),
            bloom_cold_path: format!("{}.bloom_cold", paths.crawl_db),
            authority_csv: None,
        },
        search: SearchConfig::default(),
        bloom: BloomConfig::default(),
        seeds,
    }
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="{base_url}/page1">Page 1</a>
                    <a href="{base_url}/page2">Page 2</a>
                    </body></html>"#
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><head><title>Page 1</title></head><body>Content 1</body></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><head><title>Page 2</title></head><body>Content 2</body></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let paths = test_paths();
    let config = test_config(vec![format!("{base_url}/")], &paths);

    let coordinator = Coordinator::new(config, true).expect("failed to build coordinator");
    let handle = tokio::spawn(coordinator.run());
    sleep(SETTLE_TIME).await;
    handle.abort();

    let crawl = CrawlStore::open(std::path::Path::new(&paths.crawl_db)).unwrap();
    let html = HtmlStore::open(std::path::Path::new(&paths.storage_db)).unwrap();

    let visited = crawl.count_visited().unwrap();
    assert!(visited >= 3, "expected at least 3 visited pages, got {visited}");

    let stored = html.count().unwrap();
    assert!(stored >= 3, "expected at least 3 stored pages, got {stored}");
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="{base_url}/allowed">Allowed</a>
                    <a href="{base_url}/admin">Admin</a>
                    </body></html>"#
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/allowed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><head><title>Allowed</title></head><body>Allowed content</body></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><head><title>Admin</title></head><body>Admin content</body></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .expect(0)
        .mount(&mock_server)
        .await;

    let paths = test_paths();
    let config = test_config(vec![format!("{base_url}/")], &paths);

    let coordinator = Coordinator::new(config, true).expect("failed to build coordinator");
    let handle = tokio::spawn(coordinator.run());
    sleep(SETTLE_TIME).await;
    handle.abort();

    let crawl = CrawlStore::open(std::path::Path::new(&paths.crawl_db)).unwrap();

    let visited = crawl.count_visited().unwrap();
    assert!(visited >= 2, "expected / and /allowed to be visited, got {visited}");

    let dead = crawl.count_by_status(Status::Dead).unwrap();
    assert!(dead >= 1, "expected /admin to be marked dead (robots disallow), got {dead}");
}

#[tokio::test]
async fn test_content_type_mismatch_marks_dead() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="{base_url}/document.pdf">PDF</a>
                    </body></html>"#
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/document.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46])
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&mock_server)
        .await;

    let paths = test_paths();
    let config = test_config(vec![format!("{base_url}/")], &paths);

    let coordinator = Coordinator::new(config, true).expect("failed to build coordinator");
    let handle = tokio::spawn(coordinator.run());
    sleep(SETTLE_TIME).await;
    handle.abort();

    let crawl = CrawlStore::open(std::path::Path::new(&paths.crawl_db)).unwrap();

    let visited = crawl.count_visited().unwrap();
    assert!(visited >= 1, "expected the homepage to be visited, got {visited}");

    let dead = crawl.count_by_status(Status::Dead).unwrap();
    assert!(dead >= 1, "expected the PDF link to be marked dead (not-HTML), got {dead}");
}
