//! Persistent record stores with namespace isolation.
//!
//! A [`RecordStore`] is an asynchronous key-value store scoped to exactly one
//! namespace. Each version tracker owns one namespace (derived from its
//! endpoint URL), so several trackers can share one physical store without
//! ever seeing each other's records.
//!
//! # Backends
//!
//! - [`LmdbRecordStore`]: durable, memory-mapped LMDB via heed. Many
//!   namespaces share one environment; keys are prefixed with the namespace.
//! - [`InMemoryRecordStore`]: process-local, for tests and ephemeral use.
//!
//! # Example
//!
//! ```ignore
//! let store = LmdbRecordStore::open("/var/cache/verchain", 64, namespace_for(url))?;
//! store.set_item("pid.1", &stored).await?;
//! let back = store.get_item("pid.1").await?;
//! ```

pub mod key;
pub mod lmdb;
pub mod memory;
pub mod traits;

pub use key::NamespacedKey;
pub use lmdb::{LmdbRecordStore, LmdbStoreError};
pub use memory::InMemoryRecordStore;
pub use traits::{validate_store, RecordStore, StoreStats};
