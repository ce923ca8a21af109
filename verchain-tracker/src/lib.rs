//! VERCHAIN Tracker - Version Chain Cache and Traversal
//!
//! Answers "what is N versions ahead of or behind this object?" for objects
//! whose metadata documents point at the version they obsolete and the
//! version that obsoletes them.
//!
//! # Architecture
//!
//! ```text
//! caller → VersionTracker ─ LockTable (per root pid)
//!                │
//!                ├─ RecordCache (LRU) ── RecordStore (namespaced, TTL)
//!                │
//!                └─ RequestCoalescer ── MetadataSource (remote)
//! ```
//!
//! Every record mutation is persisted and announced through an
//! [`verchain_events::UpdateNotifier`].
//!
//! # Example
//!
//! Give each endpoint its own [`verchain_events::UpdateHub`]: `clear()`
//! empties the whole notifier, and `update:<pid>` names are only unique
//! within one endpoint.
//!
//! ```ignore
//! let hubs: Arc<Mutex<HashMap<String, Arc<UpdateHub>>>> = Arc::default();
//! let registry = TrackerRegistry::new(TrackerConfig::from_env(), {
//!     let hubs = Arc::clone(&hubs);
//!     move |config| {
//!         let hub = Arc::clone(hubs.lock().entry(config.meta_service_url.clone()).or_default());
//!         VersionTracker::new(
//!             config.clone(),
//!             Arc::new(HttpSource::new(&config.meta_service_url)),
//!             Arc::new(lmdb.scoped(namespace_for(&config.meta_service_url))),
//!             hub,
//!         )
//!     }
//! });
//! let tracker = registry.get("https://cn.dataone.org/cn/v2/meta")?;
//! let newer = tracker.get_nth("doi:10.5063/F1", 1).await?;
//! ```

pub mod cache;
pub mod coalescer;
pub mod locks;
pub mod registry;
pub mod stats;
pub mod tracker;

pub use cache::{CacheCounters, RecordCache};
pub use coalescer::RequestCoalescer;
pub use locks::{ChainLockGuard, LockTable};
pub use registry::{TrackerFactory, TrackerRegistry};
pub use stats::TrackerStats;
pub use tracker::{NthOptions, VersionTracker};

// Re-export core types for convenience
pub use verchain_core::{
    namespace_for, ChainError, ChainRecord, Direction, FullChain, MetadataSource, Pid,
    SystemMetadata, TrackerConfig, VerchainError, VerchainResult, VersionResult,
};
