//! In-memory record store.
//!
//! Several namespaces can share one backing map via [`InMemoryRecordStore::scoped`],
//! which mirrors how a single durable store is shared by several trackers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::RwLock as AsyncRwLock;
use verchain_core::{Pid, StoreError, StoredRecord, VerchainResult};

use super::traits::{RecordStore, StoreStats};

type Namespaces = HashMap<String, HashMap<Pid, StoredRecord>>;

/// Process-local record store.
///
/// Uses tokio::sync::RwLock for the records so reads and writes go through
/// real suspension points, like a durable backend would.
#[derive(Debug, Clone)]
pub struct InMemoryRecordStore {
    namespace: String,
    records: Arc<AsyncRwLock<Namespaces>>,
    stats: Arc<RwLock<StoreStats>>,
}

impl InMemoryRecordStore {
    /// Create an empty store bound to `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: Arc::new(AsyncRwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(StoreStats::default())),
        }
    }

    /// A view of the same backing map bound to another namespace.
    pub fn scoped(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: Arc::clone(&self.records),
            stats: Arc::new(RwLock::new(StoreStats::default())),
        }
    }

    /// Number of records in this namespace.
    pub async fn len(&self) -> usize {
        self.records
            .read()
            .await
            .get(&self.namespace)
            .map(|ns| ns.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn with_stats<F: FnOnce(&mut StoreStats)>(&self, f: F) -> VerchainResult<()> {
        let mut stats = self.stats.write().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut stats);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_item(&self, key: &str) -> VerchainResult<Option<StoredRecord>> {
        let found = self
            .records
            .read()
            .await
            .get(&self.namespace)
            .and_then(|ns| ns.get(key))
            .cloned();
        self.with_stats(|s| {
            if found.is_some() {
                s.hits += 1;
            } else {
                s.misses += 1;
            }
        })?;
        Ok(found)
    }

    async fn set_item(&self, key: &str, value: &StoredRecord) -> VerchainResult<()> {
        let mut records = self.records.write().await;
        let ns = records.entry(self.namespace.clone()).or_default();
        ns.insert(key.to_string(), value.clone());
        let count = ns.len() as u64;
        drop(records);
        self.with_stats(|s| {
            s.writes += 1;
            s.entry_count = count;
        })
    }

    async fn remove_item(&self, key: &str) -> VerchainResult<bool> {
        let mut records = self.records.write().await;
        let (removed, count) = match records.get_mut(&self.namespace) {
            Some(ns) => (ns.remove(key).is_some(), ns.len() as u64),
            None => (false, 0),
        };
        drop(records);
        self.with_stats(|s| s.entry_count = count)?;
        Ok(removed)
    }

    async fn clear(&self) -> VerchainResult<u64> {
        let removed = self
            .records
            .write()
            .await
            .remove(&self.namespace)
            .map(|ns| ns.len() as u64)
            .unwrap_or(0);
        self.with_stats(|s| s.entry_count = 0)?;
        Ok(removed)
    }

    async fn stats(&self) -> VerchainResult<StoreStats> {
        Ok(self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(next: &[&str]) -> StoredRecord {
        StoredRecord {
            next: next.iter().map(|s| s.to_string()).collect(),
            prev: vec![],
            end_next: false,
            end_prev: false,
            sys_meta: None,
            ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = InMemoryRecordStore::new("vt_test");
        assert!(store.get_item("p.1").await.unwrap().is_none());

        store.set_item("p.1", &stored(&["p.2"])).await.unwrap();
        let back = store.get_item("p.1").await.unwrap().expect("record present");
        assert_eq!(back.next, vec!["p.2"]);

        assert!(store.remove_item("p.1").await.unwrap());
        assert!(!store.remove_item("p.1").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let a = InMemoryRecordStore::new("vt_a");
        let b = a.scoped("vt_b");

        a.set_item("p.1", &stored(&["x"])).await.unwrap();
        b.set_item("p.1", &stored(&["y"])).await.unwrap();

        assert_eq!(a.get_item("p.1").await.unwrap().unwrap().next, vec!["x"]);
        assert_eq!(b.get_item("p.1").await.unwrap().unwrap().next, vec!["y"]);

        assert_eq!(a.clear().await.unwrap(), 1);
        assert!(a.get_item("p.1").await.unwrap().is_none());
        assert!(b.get_item("p.1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scoped_same_namespace_sees_records() {
        let first = InMemoryRecordStore::new("vt_a");
        first.set_item("p.1", &stored(&["x"])).await.unwrap();

        let second = first.scoped("vt_a");
        assert!(second.get_item("p.1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryRecordStore::new("vt_stats");
        let _ = store.get_item("missing").await.unwrap();
        store.set_item("p.1", &stored(&[])).await.unwrap();
        let _ = store.get_item("p.1").await.unwrap();
        let _ = store.get_item("p.1").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.entry_count, 1);
    }
}
