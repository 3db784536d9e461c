//! Per-run duplicate tracking.

use crate::record::Record;
use std::collections::HashSet;

/// Set of record ids observed during one run.
///
/// Created empty at run start, grows monotonically and is dropped with the
/// run. Never shared between runs.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids from `ids` that were not seen before, and marks all of
    /// them as seen.
    pub fn admit<'a, I>(&mut self, ids: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fresh = HashSet::new();
        for id in ids {
            if !self.seen.contains(id) {
                self.seen.insert(id.to_string());
                fresh.insert(id.to_string());
            }
        }
        fresh
    }

    /// Filters a page down to records with ids not seen before.
    ///
    /// Order is preserved; an id repeated within the page keeps only its first
    /// occurrence.
    pub fn filter_new(&mut self, records: Vec<Record>) -> Vec<Record> {
        let mut fresh = self.admit(records.iter().map(|r| r.id.as_str()));
        records
            .into_iter()
            .filter(|r| fresh.remove(&r.id))
            .collect()
    }

    /// Returns true if `id` has been seen in this run.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of distinct ids seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
