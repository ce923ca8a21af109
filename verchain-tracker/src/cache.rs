//! Bounded in-memory chain record cache.
//!
//! All operations are synchronous and hold the mutex only for the duration of
//! one map operation, so a record can never be observed half-mutated across
//! an await point. Callers receive clones; mutation goes through closures.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;
use verchain_core::{ChainRecord, Pid};

/// Counters kept by [`RecordCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU map of pid to [`ChainRecord`], bounded by record count.
pub struct RecordCache {
    records: Mutex<LruCache<Pid, ChainRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl RecordCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            records: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.lock().cap().get()
    }

    /// Return the record for `pid`, marking it most recently used.
    ///
    /// Counts a hit or a miss.
    pub fn get(&self, pid: &str) -> Option<ChainRecord> {
        let found = self.records.lock().get(pid).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Return the record for `pid` without touching recency or counters.
    pub fn peek(&self, pid: &str) -> Option<ChainRecord> {
        self.records.lock().peek(pid).cloned()
    }

    pub fn contains(&self, pid: &str) -> bool {
        self.records.lock().contains(pid)
    }

    /// Insert a blank record for `pid` unless one exists. Returns the
    /// current record either way and marks it most recently used.
    pub fn get_or_insert_blank(&self, pid: &str) -> ChainRecord {
        self.get_or_insert(pid, &ChainRecord::new())
    }

    /// Insert a copy of `record` for `pid` unless one exists. Returns the
    /// current record either way and marks it most recently used.
    pub fn get_or_insert(&self, pid: &str, record: &ChainRecord) -> ChainRecord {
        self.update_or_insert(pid, record, |_| ()).0
    }

    /// Apply `f` to the record for `pid`, inserting a copy of `fallback`
    /// first when `pid` is not in memory.
    ///
    /// Returns the record after `f` ran, plus whatever `f` returned.
    pub fn update_or_insert<F, R>(&self, pid: &str, fallback: &ChainRecord, f: F) -> (ChainRecord, R)
    where
        F: FnOnce(&mut ChainRecord) -> R,
    {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(pid) {
            let out = f(record);
            return (record.clone(), out);
        }

        let mut record = fallback.clone();
        let out = f(&mut record);
        if let Some((evicted, _)) = records.push(pid.to_string(), record.clone()) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(pid = %evicted, "Evicted chain record from memory");
        }
        (record, out)
    }

    pub fn remove(&self, pid: &str) -> Option<ChainRecord> {
        self.records.lock().pop(pid)
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counters(&self) -> CacheCounters {
        CacheCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
