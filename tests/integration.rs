#[path = "integration/crawl_tests.rs"]
mod crawl_tests;
