//! Crawl frontier: visited set, pending queue, and fetch counter
//!
//! The frontier is the single source of truth for "what has been fetched" and
//! "what remains". Every operation takes one lock over the whole aggregate
//! (visited set + pending queue + in-flight set + counter). Splitting that
//! lock is exactly the bug that produces duplicate fetches: a membership check
//! and a queue append done under separate locks let two workers enqueue the
//! same URL. All lock holds are O(1) queue/set work.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Outcome of an `enqueue` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// URL added to the pending queue
    Queued,
    /// URL already visited, pending, or in flight
    AlreadyKnown,
    /// Pending queue is at capacity; URL dropped
    Dropped,
}

/// Outcome of a `mark_visited` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitOutcome {
    /// True the first time this URL is marked; false on repeat calls
    pub newly_visited: bool,
    /// True when the fetch counter crossed a checkpoint boundary
    pub checkpoint_due: bool,
}

/// Immutable snapshot of frontier state, used for checkpointing
///
/// In-flight URLs are folded back into `pending`, so a snapshot taken while
/// fetches are mid-air (or right after cancellation) is always resumable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierSnapshot {
    /// Visited URLs, sorted for deterministic serialization
    pub visited: Vec<String>,
    /// URLs still awaiting fetch, in dispatch order
    pub pending: Vec<String>,
    /// Number of pages fetched so far
    pub pages_fetched: u64,
}

struct FrontierInner {
    visited: HashSet<String>,
    pending: VecDeque<String>,
    pending_set: HashSet<String>,
    in_flight: HashSet<String>,
    pages_fetched: u64,
    dropped_links: u64,
}

/// Lock-guarded crawl frontier shared by all workers of one job
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    /// Maximum pending queue length; discoveries past this are dropped
    pending_limit: usize,
    /// Maximum pages to fetch; 0 means unlimited
    page_cap: u64,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(pending_limit: usize, page_cap: u64) -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                visited: HashSet::new(),
                pending: VecDeque::new(),
                pending_set: HashSet::new(),
                in_flight: HashSet::new(),
                pages_fetched: 0,
                dropped_links: 0,
            }),
            pending_limit,
            page_cap,
        }
    }

    /// Restores a frontier from a checkpoint snapshot
    pub fn from_snapshot(snapshot: FrontierSnapshot, pending_limit: usize, page_cap: u64) -> Self {
        let visited: HashSet<String> = snapshot.visited.into_iter().collect();
        let pending: VecDeque<String> = snapshot
            .pending
            .into_iter()
            .filter(|url| !visited.contains(url))
            .collect();
        let pending_set: HashSet<String> = pending.iter().cloned().collect();

        Self {
            inner: Mutex::new(FrontierInner {
                visited,
                pending,
                pending_set,
                in_flight: HashSet::new(),
                pages_fetched: snapshot.pages_fetched,
                dropped_links: 0,
            }),
            pending_limit,
            page_cap,
        }
    }

    /// Adds a URL to the pending queue
    ///
    /// No-op if the URL was already visited, is pending, or is being fetched.
    /// When the queue is at capacity the URL is dropped with a warning rather
    /// than queued, which bounds memory when discovery outpaces fetching.
    pub fn enqueue(&self, url: &str) -> EnqueueOutcome {
        let mut inner = self.inner.lock().unwrap();

        if inner.visited.contains(url)
            || inner.pending_set.contains(url)
            || inner.in_flight.contains(url)
        {
            return EnqueueOutcome::AlreadyKnown;
        }

        if inner.pending.len() >= self.pending_limit {
            inner.dropped_links += 1;
            tracing::warn!(
                url,
                limit = self.pending_limit,
                "pending queue full, dropping discovered link"
            );
            return EnqueueOutcome::Dropped;
        }

        inner.pending.push_back(url.to_string());
        inner.pending_set.insert(url.to_string());
        EnqueueOutcome::Queued
    }

    /// Dequeues up to `n` URLs, marking them in flight
    ///
    /// Returns an empty vector when the queue is empty or the page cap
    /// (counting in-flight fetches) has been reached.
    pub fn next_batch(&self, n: usize) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap();
        let mut batch = Vec::new();

        while batch.len() < n {
            if self.page_cap > 0
                && inner.pages_fetched + inner.in_flight.len() as u64 + batch.len() as u64
                    >= self.page_cap
            {
                break;
            }

            let url = match inner.pending.pop_front() {
                Some(url) => url,
                None => break,
            };
            inner.pending_set.remove(&url);

            // A visited URL can linger in pending when restored from an old
            // checkpoint; skip it instead of dispatching twice.
            if inner.visited.contains(&url) {
                continue;
            }

            inner.in_flight.insert(url.clone());
            batch.push(url);
        }

        batch
    }

    /// Moves a URL from in-flight to visited and counts the fetch
    ///
    /// Called exactly once per URL after a fetch attempt completes, success or
    /// failure. Idempotent-safe: repeat calls for the same URL neither corrupt
    /// the counter nor re-trigger a checkpoint. The counter is advanced under
    /// the same lock as the set mutation so checkpoint cadence never skips.
    pub fn mark_visited(&self, url: &str, checkpoint_interval: u64) -> VisitOutcome {
        let mut inner = self.inner.lock().unwrap();

        inner.in_flight.remove(url);

        if !inner.visited.insert(url.to_string()) {
            return VisitOutcome {
                newly_visited: false,
                checkpoint_due: false,
            };
        }

        inner.pages_fetched += 1;
        let checkpoint_due =
            checkpoint_interval > 0 && inner.pages_fetched % checkpoint_interval == 0;

        VisitOutcome {
            newly_visited: true,
            checkpoint_due,
        }
    }

    /// Returns an immutable snapshot of the frontier for checkpointing
    pub fn snapshot(&self) -> FrontierSnapshot {
        let inner = self.inner.lock().unwrap();

        let mut visited: Vec<String> = inner.visited.iter().cloned().collect();
        visited.sort();

        // In-flight fetches have not completed; they go back to the head of
        // the pending list so a resumed job picks them up first.
        let mut pending: Vec<String> = inner.in_flight.iter().cloned().collect();
        pending.sort();
        pending.extend(inner.pending.iter().cloned());

        FrontierSnapshot {
            visited,
            pending,
            pages_fetched: inner.pages_fetched,
        }
    }

    /// True when nothing is pending and nothing is in flight
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.pending.is_empty() && inner.in_flight.is_empty()
    }

    /// True when the page cap has been reached
    pub fn cap_reached(&self) -> bool {
        if self.page_cap == 0 {
            return false;
        }
        let inner = self.inner.lock().unwrap();
        inner.pages_fetched >= self.page_cap
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> u64 {
        self.inner.lock().unwrap().pages_fetched
    }

    /// Number of visited URLs
    pub fn visited_count(&self) -> usize {
        self.inner.lock().unwrap().visited.len()
    }

    /// Number of URLs awaiting dispatch
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Number of discovered links dropped at the queue bound
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().unwrap().dropped_links
    }
}
