//! Persistent priority URL frontier shared by every fetcher.
//!
//! The frontier itself is a table in the crawl store (see [`crate::storage`]);
//! this module owns the row type, the status lifecycle and the priority
//! function computed on insertion (§4.4). Reservation/dispatch logic lives in
//! [`crate::crawler::dispatcher`].

mod entry;
mod priority;

pub use entry::{FrontierEntry, Status, ORPHAN_RESERVATION_SECS};
pub use priority::priority;
