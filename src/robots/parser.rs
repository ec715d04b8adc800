//! Robots.txt parser implementation
//!
//! This module provides functionality for parsing robots.txt content using the robotstxt crate.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
///
/// This is a wrapper around the robotstxt crate's types, providing a simplified
/// interface for checking if URLs are allowed.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything.
    ///
    /// Used both as the pre-fetch default and as the result of a failed
    /// fetch (robots.txt is fail-open by explicit decision: a network
    /// failure never blocks a URL).
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Extracts the `Crawl-delay` directive (in seconds) applicable to
    /// `user_agent`, preferring a block whose `User-agent` line matches the
    /// agent over the wildcard `*` block. Manual line scan: the `robotstxt`
    /// crate only exposes allow/disallow matching, not crawl-delay.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let user_agent_lower = user_agent.to_lowercase();
        let mut current_agents: Vec<String> = Vec::new();
        let mut matched_delay: Option<f64> = None;
        let mut wildcard_delay: Option<f64> = None;

        for raw_line in self.content.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    current_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    let Ok(secs) = value.parse::<f64>() else {
                        continue;
                    };
                    let is_wildcard_block = current_agents.iter().any(|a| a == "*");
                    let is_matching_block = current_agents
                        .iter()
                        .any(|a| a != "*" && user_agent_lower.contains(a.as_str()));
                    if is_matching_block {
                        matched_delay = Some(secs);
                    } else if is_wildcard_block {
                        wildcard_delay = Some(secs);
                    }
                }
                "disallow" | "allow" | "sitemap" => {
                    current_agents.clear();
                }
                _ => {}
            }
        }

        matched_delay.or(wildcard_delay)
    }
}
