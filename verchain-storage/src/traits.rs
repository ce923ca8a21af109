//! Record store trait and statistics.

use async_trait::async_trait;
use verchain_core::{ConfigError, StoredRecord, VerchainResult};

/// A namespaced, asynchronous key-value store for chain records.
///
/// Keys are pids. Every instance is bound to a single namespace and all
/// operations, including `clear()`, are confined to it. Writes are
/// last-writer-wins per key; there are no cross-key transactions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The namespace this store instance reads and writes.
    fn namespace(&self) -> &str;

    /// Read the record stored under `key`, if any.
    async fn get_item(&self, key: &str) -> VerchainResult<Option<StoredRecord>>;

    /// Write `value` under `key`, replacing any previous record.
    async fn set_item(&self, key: &str, value: &StoredRecord) -> VerchainResult<()>;

    /// Remove the record under `key`. Returns true if one existed.
    async fn remove_item(&self, key: &str) -> VerchainResult<bool>;

    /// Remove every record in this namespace. Returns the number removed.
    async fn clear(&self) -> VerchainResult<u64>;

    /// Usage statistics for this namespace.
    async fn stats(&self) -> VerchainResult<StoreStats>;
}

/// Check that a store can back a tracker.
///
/// The trait guarantees the method surface; this checks the namespace the
/// instance is bound to.
pub fn validate_store(store: &dyn RecordStore) -> VerchainResult<()> {
    let namespace = store.namespace();
    if namespace.is_empty() {
        return Err(ConfigError::InvalidStore {
            reason: "store namespace must not be empty".to_string(),
        }
        .into());
    }
    if !namespace.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ConfigError::InvalidStore {
            reason: format!(
                "store namespace {:?} must contain only printable ASCII",
                namespace
            ),
        }
        .into());
    }
    Ok(())
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Reads that found a record.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Number of records currently stored.
    pub entry_count: u64,
    /// Number of successful writes.
    pub writes: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
