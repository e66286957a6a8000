/// Time-bounded accumulator shared by the rain and wind trackers
use log::warn;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::{Duration, OffsetDateTime};

/// Upper bound on retained records if the reader stops draining the window.
pub const DEFAULT_CAPACITY: usize = 16_384;

struct Entry<T> {
    timestamp: OffsetDateTime,
    value: T,
}

/// Insertion-ordered multiset of timestamped values covering a trailing
/// retention period.
///
/// Writers (edge callbacks) and readers (the polling loop) share the window
/// through `&self`. Every operation holds the lock only for a push or one
/// linear scan, never across I/O. Timestamps need not arrive in order, so
/// eviction scans the whole deque instead of popping from the front.
pub struct EventWindow<T> {
    entries: Mutex<VecDeque<Entry<T>>>,
    retention: Duration,
    capacity: usize,
}

impl<T> EventWindow<T> {
    pub fn new(retention: Duration) -> Self {
        Self::with_capacity(retention, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(retention: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            retention,
            capacity: capacity.max(1),
        }
    }

    // A panic while holding the lock cannot leave a half-written entry behind,
    // so a poisoned deque is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record. Never scans; only drops the oldest arrival when the
    /// capacity bound is hit.
    pub fn push(&self, timestamp: OffsetDateTime, value: T) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
            warn!(
                "Event window full ({} records), dropping oldest arrival",
                self.capacity
            );
        }
        entries.push_back(Entry { timestamp, value });
    }

    /// Evict records older than the retention period and fold over those
    /// stamped at or after `now - duration`.
    ///
    /// # Arguments
    /// * `now` - Reference instant for the trailing window
    /// * `duration` - Length of the queried window, at most the retention
    /// * `init` - Initial accumulator
    /// * `f` - Folding function applied to each matching value
    pub fn fold_since<A, F>(
        &self,
        now: OffsetDateTime,
        duration: Duration,
        init: A,
        mut f: F,
    ) -> A
    where
        F: FnMut(A, &T) -> A,
    {
        let cutoff = now - duration;
        let eviction_cutoff = now - self.retention;

        let mut entries = self.lock();
        entries.retain(|entry| entry.timestamp >= eviction_cutoff);

        entries
            .iter()
            .filter(|entry| entry.timestamp >= cutoff)
            .fold(init, |acc, entry| f(acc, &entry.value))
    }

    /// Number of retained records, including ones not yet evicted.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventWindow<f64> {
    pub fn add(&self, amount: f64, timestamp: OffsetDateTime) {
        self.push(timestamp, amount);
    }

    /// Sum of all amounts stamped at or after `now - duration`, `0.0` when
    /// the window is empty.
    pub fn sum_since(&self, now: OffsetDateTime, duration: Duration) -> f64 {
        self.fold_since(now, duration, 0.0, |sum, amount| sum + amount)
    }
}
