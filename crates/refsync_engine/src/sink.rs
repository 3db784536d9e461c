//! Sink abstraction over the local store.

use crate::error::{SyncError, SyncResult};
use crate::record::Record;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Durable record set for one entity type.
///
/// The engine calls [`clear`](Sink::clear) once at the start of every run and
/// [`insert_batch`](Sink::insert_batch) once per page with new records.
/// Implementations provide their own write isolation.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deletes every stored record.
    async fn clear(&self) -> SyncResult<()>;

    /// Appends records. Fails if the store's uniqueness rule on `id` is violated.
    async fn insert_batch(&self, records: &[Record]) -> SyncResult<()>;

    /// Number of stored records.
    async fn count(&self) -> SyncResult<u64>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    async fn clear(&self) -> SyncResult<()> {
        (**self).clear().await
    }

    async fn insert_batch(&self, records: &[Record]) -> SyncResult<()> {
        (**self).insert_batch(records).await
    }

    async fn count(&self) -> SyncResult<u64> {
        (**self).count().await
    }
}

/// An in-memory sink for testing.
///
/// Enforces id uniqueness like a primary key would, and can be told to fail
/// clears or inserts.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<Record>>,
    fail_clear: AtomicBool,
    fail_insert_after: RwLock<Option<usize>>,
    batches: AtomicUsize,
    clears: AtomicUsize,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink pre-populated with records, as left by an earlier run.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Makes every subsequent `clear` fail.
    pub fn set_fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    /// Makes inserts fail once `n` batches have succeeded.
    pub fn fail_insert_after(&self, n: usize) {
        *self.fail_insert_after.write() = Some(n);
    }

    /// Snapshot of the stored records.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Stored ids, in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.records.read().iter().map(|r| r.id.clone()).collect()
    }

    /// Number of successful `insert_batch` calls.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Number of successful `clear` calls.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn clear(&self) -> SyncResult<()> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(SyncError::Sink("clear rejected".into()));
        }
        self.records.write().clear();
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_batch(&self, records: &[Record]) -> SyncResult<()> {
        if let Some(limit) = *self.fail_insert_after.read() {
            if self.batches.load(Ordering::SeqCst) >= limit {
                return Err(SyncError::Sink("insert rejected".into()));
            }
        }

        let mut stored = self.records.write();
        for record in records {
            if stored.iter().any(|r| r.id == record.id) {
                return Err(SyncError::Sink(format!("duplicate id {}", record.id)));
            }
        }
        stored.extend(records.iter().cloned());
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count(&self) -> SyncResult<u64> {
        Ok(self.records.read().len() as u64)
    }
}
