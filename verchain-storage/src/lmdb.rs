//! LMDB-backed record store with namespace isolation.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a durable, memory-mapped
//! key-value store that survives process restarts.
//!
//! # Namespace Isolation
//!
//! All operations go through [`NamespacedKey`], so:
//! - Records of different namespaces are stored under different key prefixes
//! - `clear()` only removes keys carrying this store's prefix
//! - Several stores can share one environment via [`LmdbRecordStore::scoped`]
//!
//! # Value Format
//!
//! Values are the JSON encoding of [`StoredRecord`] (which carries its own
//! `ts`).

use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use verchain_core::{StoreError, StoredRecord, VerchainError, VerchainResult};

use super::key::NamespacedKey;
use super::traits::{RecordStore, StoreStats};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for VerchainError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Serialization(reason) => StoreError::Serialization { reason }.into(),
            LmdbStoreError::Deserialization(reason) => {
                StoreError::Deserialization { reason }.into()
            }
            other => StoreError::Backend {
                reason: other.to_string(),
            }
            .into(),
        }
    }
}

/// LMDB-backed record store bound to one namespace.
///
/// # Example
///
/// ```ignore
/// use verchain_storage::{LmdbRecordStore, RecordStore};
///
/// let store = LmdbRecordStore::open("/tmp/verchain", 64, "vt_0123")?;
/// let other = store.scoped("vt_4567"); // same file, different namespace
/// ```
pub struct LmdbRecordStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    namespace: String,
    stats: Arc<RwLock<StoreStats>>,
}

impl LmdbRecordStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    /// * `namespace` - Namespace this instance is bound to
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        namespace: impl Into<String>,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process and
        // shared through `scoped()` rather than reopened.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            namespace: namespace.into(),
            stats: Arc::new(RwLock::new(StoreStats::default())),
        })
    }

    /// A store on the same environment bound to another namespace.
    pub fn scoped(&self, namespace: impl Into<String>) -> Self {
        Self {
            env: self.env.clone(),
            db: self.db,
            namespace: namespace.into(),
            stats: Arc::new(RwLock::new(StoreStats::default())),
        }
    }

    fn key(&self, pid: &str) -> Vec<u8> {
        NamespacedKey::new(self.namespace.as_str(), pid).encode()
    }

    fn record_read(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.write() {
            if hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
    }

    fn count_entries(&self) -> Result<u64, LmdbStoreError> {
        Ok(self
            .collect_keys_with_prefix(&NamespacedKey::namespace_prefix(&self.namespace))?
            .len() as u64)
    }

    fn refresh_entry_count(&self) -> Result<(), LmdbStoreError> {
        let count = self.count_entries()?;
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = count;
        }
        Ok(())
    }

    /// Iterate over keys matching a prefix and collect them.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, LmdbStoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        for result in iter {
            match result {
                Ok((key, _)) => {
                    if key.starts_with(prefix) {
                        keys.push(key.to_vec());
                    }
                }
                Err(_) => continue,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl RecordStore for LmdbRecordStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_item(&self, key: &str) -> VerchainResult<Option<StoredRecord>> {
        let encoded_key = self.key(key);

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, &encoded_key) {
            Ok(Some(bytes)) => {
                self.record_read(true);
                let value: StoredRecord = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbStoreError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => {
                self.record_read(false);
                Ok(None)
            }
            Err(e) => {
                self.record_read(false);
                Err(LmdbStoreError::Transaction(e.to_string()).into())
            }
        }
    }

    async fn set_item(&self, key: &str, value: &StoredRecord) -> VerchainResult<()> {
        let encoded_key = self.key(key);
        let bytes =
            serde_json::to_vec(value).map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, &encoded_key, &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        if let Ok(mut stats) = self.stats.write() {
            stats.writes += 1;
        }
        self.refresh_entry_count()?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> VerchainResult<bool> {
        let encoded_key = self.key(key);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, &encoded_key)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        if deleted {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry_count = stats.entry_count.saturating_sub(1);
            }
        }
        Ok(deleted)
    }

    async fn clear(&self) -> VerchainResult<u64> {
        let prefix = NamespacedKey::namespace_prefix(&self.namespace);
        let keys_to_delete = self.collect_keys_with_prefix(&prefix)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &keys_to_delete {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(namespace = %self.namespace, deleted, "Cleared LMDB namespace");

        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = 0;
        }
        Ok(deleted)
    }

    async fn stats(&self) -> VerchainResult<StoreStats> {
        Ok(self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}
