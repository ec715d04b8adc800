//! Per-source-IP sliding-window rate limiter (§4.12), the same one-map
//! one-mutex shape as [`crate::state::DomainGovernor`]'s per-domain
//! bookkeeping, keyed on socket address instead of domain.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records one request from `ip` and returns whether it is allowed
    /// under the sliding window (entries older than the window are dropped
    /// first).
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let entries = windows.entry(ip).or_default();
        entries.retain(|t| now.duration_since(*t) < self.window);

        if entries.len() as u32 >= self.max_requests {
            return false;
        }

        entries.push(now);
        true
    }
}
