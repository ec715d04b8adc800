//! Domain governor: per-domain politeness, failure penalties, the per-domain
//! page cap, and the robots.txt cache.
//!
//! Each domain's bookkeeping lives behind one shared map; `can_crawl` is a
//! read over a handful of fields and `mark_*` is a single critical section
//! per domain, so contention stays proportional to the number of distinct
//! domains in flight rather than total fetcher count.

use crate::robots::{self, CachedRobots, ParsedRobots};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A domain enters the penalty box once consecutive failures exceed this count.
const PENALTY_BOX_FAILURE_THRESHOLD: u32 = 10;
/// Penalty box duration: a domain that tripped the failure threshold is
/// skipped for this long since its last access.
const PENALTY_BOX_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct DomainRecord {
    last_access: Option<Instant>,
    consecutive_failures: u32,
    page_count: u32,
}

/// Per-domain politeness, failure-penalty and robots.txt cache state shared
/// by every fetcher in the pool.
pub struct DomainGovernor {
    domains: Mutex<HashMap<String, DomainRecord>>,
    robots: Mutex<HashMap<String, CachedRobots>>,
    max_pages_per_domain: u32,
    crawl_delay: Duration,
}

impl DomainGovernor {
    pub fn new(max_pages_per_domain: u32, crawl_delay: Duration) -> Self {
        Self {
            domains: Mutex::new(HashMap::new()),
            robots: Mutex::new(HashMap::new()),
            max_pages_per_domain,
            crawl_delay,
        }
    }

    /// `can_crawl(domain)` is false if the domain hit its page cap, is in
    /// the failure penalty box, or had a request less than the effective
    /// crawl delay ago.
    pub fn can_crawl(&self, domain: &str) -> bool {
        let domains = self.domains.lock().unwrap();
        let Some(record) = domains.get(domain) else {
            return true;
        };

        if record.page_count >= self.max_pages_per_domain {
            return false;
        }

        if record.consecutive_failures > PENALTY_BOX_FAILURE_THRESHOLD {
            if let Some(last) = record.last_access {
                if last.elapsed() < PENALTY_BOX_DURATION {
                    return false;
                }
            }
        }

        if let Some(last) = record.last_access {
            drop(domains);
            if last.elapsed() < self.effective_delay(domain) {
                return false;
            }
        }

        true
    }

    /// The politeness delay for `domain`: the robots.txt `Crawl-delay` if
    /// cached and larger than the configured minimum, else the configured
    /// minimum.
    fn effective_delay(&self, domain: &str) -> Duration {
        let robots = self.robots.lock().unwrap();
        if let Some(cached) = robots.get(domain) {
            if let Some(secs) = cached.crawl_delay("*") {
                let robots_delay = Duration::from_secs_f64(secs.max(0.0));
                return robots_delay.max(self.crawl_delay);
            }
        }
        self.crawl_delay
    }

    /// Records that a request is about to be made to `domain`.
    pub fn mark_access(&self, domain: &str) {
        let mut domains = self.domains.lock().unwrap();
        domains.entry(domain.to_string()).or_default().last_access = Some(Instant::now());
    }

    /// Records a successful fetch: resets the failure streak, bumps the page count.
    pub fn mark_success(&self, domain: &str) {
        let mut domains = self.domains.lock().unwrap();
        let record = domains.entry(domain.to_string()).or_default();
        record.consecutive_failures = 0;
        record.page_count += 1;
    }

    /// Records a failed fetch attempt.
    pub fn mark_failure(&self, domain: &str) {
        let mut domains = self.domains.lock().unwrap();
        domains
            .entry(domain.to_string())
            .or_default()
            .consecutive_failures += 1;
    }

    pub fn page_count(&self, domain: &str) -> u32 {
        self.domains
            .lock()
            .unwrap()
            .get(domain)
            .map(|r| r.page_count)
            .unwrap_or(0)
    }

    pub fn consecutive_failures(&self, domain: &str) -> u32 {
        self.domains
            .lock()
            .unwrap()
            .get(domain)
            .map(|r| r.consecutive_failures)
            .unwrap_or(0)
    }

    /// `check_allow(domain, path)` consults the robots.txt cache (24h TTL);
    /// on a miss or stale entry, fetches (fail-open) and repopulates the
    /// cache before evaluating.
    pub async fn check_allow(&self, domain: &str, path: &str, user_agent: &str) -> bool {
        let cached = {
            let robots = self.robots.lock().unwrap();
            robots.get(domain).filter(|c| !c.is_stale()).cloned()
        };

        let cached = match cached {
            Some(c) => c,
            None => {
                let parsed = robots::fetch_robots(domain, user_agent).await;
                let fresh = CachedRobots::new(parsed);
                self.robots
                    .lock()
                    .unwrap()
                    .insert(domain.to_string(), fresh.clone());
                fresh
            }
        };

        cached.is_allowed(path, user_agent)
    }

    /// Pre-seeds the robots cache. Used by tests and by warm restarts that
    /// persist the cache across runs.
    pub fn seed_robots(&self, domain: &str, parsed: ParsedRobots) {
        self.robots
            .lock()
            .unwrap()
            .insert(domain.to_string(), CachedRobots::new(parsed));
    }
}
