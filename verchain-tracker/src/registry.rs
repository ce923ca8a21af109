//! Registry of trackers keyed by metadata endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;
use verchain_core::{normalize_meta_service_url, TrackerConfig, VerchainResult};

use crate::tracker::VersionTracker;

/// Builds the tracker for one endpoint. Receives the base config with the
/// normalized endpoint URL filled in.
pub type TrackerFactory =
    dyn Fn(&TrackerConfig) -> VerchainResult<VersionTracker> + Send + Sync;

/// One tracker per normalized endpoint URL, constructed on first use.
///
/// Owned by whoever wires up the application; dropping the registry (or
/// calling [`TrackerRegistry::clear`]) releases the trackers.
pub struct TrackerRegistry {
    base_config: TrackerConfig,
    factory: Box<TrackerFactory>,
    instances: Mutex<HashMap<String, Arc<VersionTracker>>>,
}

impl TrackerRegistry {
    pub fn new<F>(base_config: TrackerConfig, factory: F) -> Self
    where
        F: Fn(&TrackerConfig) -> VerchainResult<VersionTracker> + Send + Sync + 'static,
    {
        Self {
            base_config,
            factory: Box::new(factory),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// The tracker for `meta_service_url`, building it on first request.
    ///
    /// URLs are normalized first, so `https://x/meta` and `https://x/meta/`
    /// share one tracker. A failed construction is not remembered.
    pub fn get(&self, meta_service_url: &str) -> VerchainResult<Arc<VersionTracker>> {
        let url = normalize_meta_service_url(meta_service_url);
        let mut instances = self.instances.lock();
        if let Some(tracker) = instances.get(&url) {
            return Ok(Arc::clone(tracker));
        }

        let config = self.base_config.clone().with_meta_service_url(&url);
        let tracker = Arc::new((self.factory)(&config)?);
        info!(meta_service_url = %url, namespace = %tracker.namespace(), "Registered version tracker");
        instances.insert(url, Arc::clone(&tracker));
        Ok(tracker)
    }

    /// Unregister the tracker for `meta_service_url`.
    pub fn remove(&self, meta_service_url: &str) -> Option<Arc<VersionTracker>> {
        let url = normalize_meta_service_url(meta_service_url);
        self.instances.lock().remove(&url)
    }

    pub fn contains(&self, meta_service_url: &str) -> bool {
        let url = normalize_meta_service_url(meta_service_url);
        self.instances.lock().contains_key(&url)
    }

    /// Unregister every tracker. Persistent records are left untouched.
    pub fn clear(&self) {
        self.instances.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
