//! Frontier dispatcher: turns dispatchable frontier rows into a batch handed
//! to the fetch queue (§4.4).
//!
//! The dispatcher only *reads* the frontier (via its own connection — SQLite
//! WAL lets readers proceed without blocking the writer); the actual
//! `IN_FLIGHT` status flip is applied by the single DB-writer task from a
//! [`crate::crawler::writer::WriteMessage::Reserve`] message. Because that
//! flip is asynchronous, the dispatcher keeps a short-lived in-memory set of
//! URLs it has already handed out — a thundering-herd filter that stops the
//! same row from being dispatched twice in the window between "selected
//! here" and "marked IN_FLIGHT by the writer".

use crate::frontier::FrontierEntry;
use crate::storage::CrawlStore;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// How long a URL stays in the thundering-herd filter. Comfortably longer
/// than a writer tick, so the reservation is durable in the DB well before
/// the entry ages out and could be re-selected.
const PENDING_RESERVATION_TTL: Duration = Duration::from_secs(30);

pub struct Dispatcher {
    dispatch_batch_size: usize,
    pending: VecDeque<(String, Instant)>,
    pending_set: HashSet<String>,
}

impl Dispatcher {
    pub fn new(dispatch_batch_size: usize) -> Self {
        Self {
            dispatch_batch_size,
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
        }
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        while let Some((url, at)) = self.pending.front() {
            if now.duration_since(*at) > PENDING_RESERVATION_TTL {
                self.pending_set.remove(url);
                self.pending.pop_front();
            } else {
                break;
            }
        }
    }

    /// Selects the next batch of frontier rows to dispatch, excluding any URL
    /// still inside the thundering-herd window. `spare_capacity` caps how
    /// many rows are selected, so the dispatcher never floods a fetch queue
    /// that already has work queued.
    pub fn next_batch(&mut self, store: &CrawlStore, spare_capacity: usize) -> crate::storage::StorageResult<Vec<FrontierEntry>> {
        self.evict_expired();

        let limit = self.dispatch_batch_size.min(spare_capacity).max(1);
        let overfetch = store.select_dispatchable(limit * 2)?;

        let mut batch = Vec::with_capacity(limit);
        for entry in overfetch {
            if batch.len() >= limit {
                break;
            }
            if self.pending_set.contains(&entry.url) {
                continue;
            }
            self.pending_set.insert(entry.url.clone());
            self.pending.push_back((entry.url.clone(), Instant::now()));
            batch.push(entry);
        }

        // Reserved in priority order; shuffle before it reaches the fetch
        // queue so fetchers don't hammer the same few domains back to back.
        batch.shuffle(&mut rand::thread_rng());

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::FrontierEntry;

    fn store_with(urls: &[&str]) -> CrawlStore {
        let mut store = CrawlStore::open_in_memory().unwrap();
        let entries: Vec<FrontierEntry> = urls
            .iter()
            .map(|u| FrontierEntry::new(u.to_string(), "a.test".to_string(), 1))
            .collect();
        store.insert_frontier_entries(&entries).unwrap();
        store
    }

    #[test]
    fn test_dispatches_available_rows() {
        let store = store_with(&["https://a.test/1", "https://a.test/2"]);
        let mut dispatcher = Dispatcher::new(10);
        let batch = dispatcher.next_batch(&store, 10).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_does_not_redispatch_pending_urls() {
        let store = store_with(&["https://a.test/1"]);
        let mut dispatcher = Dispatcher::new(10);
        let first = dispatcher.next_batch(&store, 10).unwrap();
        assert_eq!(first.len(), 1);

        // Row is still PENDING in the DB (writer hasn't applied the
        // reservation yet), but the dispatcher must not hand it out twice.
        let second = dispatcher.next_batch(&store, 10).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_respects_spare_capacity() {
        let store = store_with(&["https://a.test/1", "https://a.test/2", "https://a.test/3"]);
        let mut dispatcher = Dispatcher::new(10);
        let batch = dispatcher.next_batch(&store, 2).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_expired_pending_entry_can_be_redispatched() {
        let store = store_with(&["https://a.test/1"]);
        let mut dispatcher = Dispatcher::new(10);
        dispatcher.next_batch(&store, 10).unwrap();

        // Simulate the TTL having elapsed.
        dispatcher.pending.iter_mut().for_each(|(_, at)| *at = Instant::now() - PENDING_RESERVATION_TTL - Duration::from_secs(1));

        let batch = dispatcher.next_batch(&store, 10).unwrap();
        assert_eq!(batch.len(), 1);
    }
}
