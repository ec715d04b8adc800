//! Frontier row types.

use chrono::{DateTime, Utc};

/// Lifecycle state of a frontier row. Transitions: PENDING → IN_FLIGHT →
/// {DONE, PENDING (retry), DEAD}. An IN_FLIGHT row whose `reserved_at` is
/// older than [`ORPHAN_RESERVATION_SECS`] is considered abandoned and
/// reclaimed to PENDING by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Pending = 0,
    InFlight = 1,
    Done = 2,
    Dead = 3,
}

impl Status {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::InFlight),
            2 => Some(Self::Done),
            3 => Some(Self::Dead),
            _ => None,
        }
    }
}

/// Seconds an IN_FLIGHT row may sit reserved before the dispatcher treats it
/// as orphaned (fetcher crashed, process died, etc.) and reclaims it.
pub const ORPHAN_RESERVATION_SECS: i64 = 15 * 60;

/// A single frontier row: url, domain, priority, status, retry_count,
/// reserved_at, added_at and next_crawl_time.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: String,
    pub domain: String,
    pub priority: i64,
    pub status: Status,
    pub retry_count: u32,
    pub reserved_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub next_crawl_time: Option<DateTime<Utc>>,
}

impl FrontierEntry {
    /// A freshly-discovered row: PENDING, unreserved, due immediately.
    pub fn new(url: String, domain: String, priority: i64) -> Self {
        Self {
            url,
            domain,
            priority,
            status: Status::Pending,
            retry_count: 0,
            reserved_at: None,
            added_at: Utc::now(),
            next_crawl_time: None,
        }
    }

    /// True if an IN_FLIGHT row has been reserved longer than the orphan threshold.
    pub fn is_orphaned(&self, now: DateTime<Utc>) -> bool {
        self.status == Status::InFlight
            && self
                .reserved_at
                .map(|r| (now - r).num_seconds() >= ORPHAN_RESERVATION_SECS)
                .unwrap_or(false)
    }
}
