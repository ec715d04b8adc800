//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when crawling websites, failing open (allow) whenever
//! the robots.txt document itself cannot be retrieved.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use std::time::Duration;

/// Fetches and parses `http://{domain}/robots.txt`.
///
/// Any network failure (DNS, connect, timeout, non-2xx status) is treated as
/// an implicit allow-all: robots.txt is fail-open by explicit spec decision,
/// so this function never surfaces an error to its caller.
pub async fn fetch_robots(domain: &str, user_agent: &str) -> ParsedRobots {
    let url = format!("http://{}/robots.txt", domain);

    let client = match reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(_) => return ParsedRobots::allow_all(),
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(_) => ParsedRobots::allow_all(),
        },
        _ => ParsedRobots::allow_all(),
    }
}

/// Checks if a URL path is allowed by a previously-fetched robots.txt document.
pub fn is_allowed(robots: &ParsedRobots, url: &str, user_agent: &str) -> bool {
    robots.is_allowed(url, user_agent)
}
