//! Shared harness for tracker integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use verchain_core::{namespace_for, TrackerConfig};
use verchain_events::UpdateHub;
use verchain_storage::{InMemoryRecordStore, RecordStore};
use verchain_test_utils::{init_tracing, test_config, ChainSource};
use verchain_tracker::VersionTracker;

pub struct Harness {
    pub tracker: VersionTracker,
    pub source: Arc<ChainSource>,
    pub store: InMemoryRecordStore,
    pub hub: Arc<UpdateHub>,
}

impl Harness {
    pub fn new(source: ChainSource) -> Self {
        Self::with_config(source, test_config())
    }

    pub fn with_config(source: ChainSource, config: TrackerConfig) -> Self {
        let store = InMemoryRecordStore::new(namespace_for(&config.meta_service_url));
        Self::with_store(source, config, store)
    }

    /// Build a tracker over an existing store, e.g. one shared with another
    /// tracker to simulate a process restart.
    pub fn with_store(source: ChainSource, config: TrackerConfig, store: InMemoryRecordStore) -> Self {
        init_tracing();
        let source = Arc::new(source);
        let hub = Arc::new(UpdateHub::default());
        let tracker = VersionTracker::new(
            config,
            source.clone(),
            Arc::new(store.clone()) as Arc<dyn RecordStore>,
            hub.clone(),
        )
        .expect("valid tracker");
        Self {
            tracker,
            source,
            store,
            hub,
        }
    }
}
