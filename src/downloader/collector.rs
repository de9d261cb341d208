//! Thread-safe, append-only collection of retrieved entries

use crate::Entry;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    days: HashSet<u32>,
}

/// Shared store of successfully retrieved entries.
///
/// Cloning yields another handle to the same store. Entries are never removed
/// or modified once appended, and at most one entry is kept per day offset.
#[derive(Debug, Clone, Default)]
pub struct ResultCollector {
    inner: Arc<Mutex<Inner>>,
}

impl ResultCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    // Appends are all-or-nothing, so a panic elsewhere cannot leave the data
    // half-written and a poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry.
    ///
    /// Returns `false`, leaving the collector unchanged, when an entry for the
    /// same day is already present.
    pub fn append(&self, entry: Entry) -> bool {
        let mut inner = self.lock();
        if !inner.days.insert(entry.day()) {
            return false;
        }
        inner.entries.push(entry);
        true
    }

    /// Number of entries appended so far
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no entry has been appended yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry for `day` is present
    pub fn contains_day(&self, day: u32) -> bool {
        self.lock().days.contains(&day)
    }

    /// Copy of every entry appended before this call, in append order
    pub fn snapshot(&self) -> Vec<Entry> {
        self.lock().entries.clone()
    }

    /// Rates of every entry appended before this call
    pub fn rates(&self) -> Vec<f64> {
        self.lock().entries.iter().map(Entry::rate).collect()
    }
}
