//! VERCHAIN Test Utilities
//!
//! Centralized test infrastructure for the VERCHAIN workspace:
//! - A scripted metadata source for building version chains
//! - Proptest generators for pids and chains
//! - Fixtures for common chain shapes
//! - Tracing setup for tests

// Re-export core types for convenience
pub use verchain_core::{
    ChainError, ChainRecord, Direction, MetadataSource, Pid, RemoteError, StoredRecord,
    SystemMetadata, TrackerConfig, VerchainError, VerchainResult,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

// ============================================================================
// SCRIPTED METADATA SOURCE
// ============================================================================

/// In-memory metadata source backed by scripted documents.
///
/// Counts every call per pid so tests can assert on request coalescing, and
/// can inject latency and failures.
#[derive(Debug, Default)]
pub struct ChainSource {
    docs: Mutex<HashMap<Pid, SystemMetadata>>,
    calls: Mutex<HashMap<Pid, usize>>,
    fail_next: Mutex<HashMap<Pid, usize>>,
    fail_always: Mutex<HashSet<Pid>>,
    latency: Option<Duration>,
    strict: bool,
}

impl ChainSource {
    /// An empty source. Unknown pids resolve to documents with no neighbours.
    pub fn new() -> Self {
        Self::default()
    }

    /// A source holding one linear chain, oldest first.
    pub fn with_chain(pids: &[&str]) -> Self {
        let source = Self::new();
        source.add_chain(pids);
        source
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Unknown pids fail with `NotFound` instead of resolving as isolated.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Script a linear chain, oldest first, overwriting existing documents
    /// for those pids.
    pub fn add_chain(&self, pids: &[&str]) {
        let mut docs = self.docs.lock();
        for (i, pid) in pids.iter().enumerate() {
            let mut doc = SystemMetadata::new(*pid)
                .with_field("formatId", serde_json::json!("text/plain"))
                .with_field("size", serde_json::json!(i as u64 + 1));
            if i > 0 {
                doc = doc.with_obsoletes(pids[i - 1]);
            }
            if let Some(next) = pids.get(i + 1) {
                doc = doc.with_obsoleted_by(*next);
            }
            docs.insert(pid.to_string(), doc);
        }
    }

    /// Replace the document for one pid.
    pub fn set_doc(&self, doc: SystemMetadata) {
        self.docs.lock().insert(doc.identifier.clone(), doc);
    }

    /// Link `new` after `prev` on the remote side only, the way an external
    /// writer would.
    pub fn link(&self, prev: &str, new: &str) {
        let mut docs = self.docs.lock();
        let prev_doc = docs
            .remove(prev)
            .unwrap_or_else(|| SystemMetadata::new(prev))
            .with_obsoleted_by(new);
        docs.insert(prev.to_string(), prev_doc);
        let new_doc = docs
            .remove(new)
            .unwrap_or_else(|| SystemMetadata::new(new))
            .with_obsoletes(prev);
        docs.insert(new.to_string(), new_doc);
    }

    /// Fail the next `times` fetches of `pid`.
    pub fn fail_next(&self, pid: &str, times: usize) {
        self.fail_next.lock().insert(pid.to_string(), times);
    }

    /// Fail every fetch of `pid` until [`ChainSource::heal`] is called.
    pub fn fail_always(&self, pid: &str) {
        self.fail_always.lock().insert(pid.to_string());
    }

    pub fn heal(&self, pid: &str) {
        self.fail_always.lock().remove(pid);
        self.fail_next.lock().remove(pid);
    }

    /// Number of fetches issued for `pid`.
    pub fn calls(&self, pid: &str) -> usize {
        self.calls.lock().get(pid).copied().unwrap_or(0)
    }

    /// Number of fetches issued in total.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    fn should_fail(&self, pid: &str) -> bool {
        if self.fail_always.lock().contains(pid) {
            return true;
        }
        let mut pending = self.fail_next.lock();
        match pending.get_mut(pid) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl MetadataSource for ChainSource {
    async fn fetch(&self, pid: &str) -> VerchainResult<SystemMetadata> {
        *self.calls.lock().entry(pid.to_string()).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.should_fail(pid) {
            return Err(RemoteError::FetchFailed {
                pid: pid.to_string(),
                reason: "Network error".to_string(),
            }
            .into());
        }

        let doc = self.docs.lock().get(pid).cloned();
        match doc {
            Some(doc) => Ok(doc),
            None if self.strict => Err(RemoteError::NotFound {
                pid: pid.to_string(),
            }
            .into()),
            None => Ok(SystemMetadata::new(pid)),
        }
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Pids `{prefix}.1` through `{prefix}.{len}`, oldest first.
pub fn linear_chain(prefix: &str, len: usize) -> Vec<String> {
    (1..=len).map(|i| format!("{}.{}", prefix, i)).collect()
}

/// Borrow a list of owned pids as `&str`s.
pub fn as_strs(pids: &[String]) -> Vec<&str> {
    pids.iter().map(String::as_str).collect()
}

/// A small config suitable for tests.
pub fn test_config() -> TrackerConfig {
    TrackerConfig::new("https://test.example.org/cn/v2/meta/")
        .with_max_chain_hops(50)
        .with_max_cache_records(100)
}

/// Install a tracing subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for pids and version chains.

    use proptest::prelude::*;

    /// Generate a pid in the `prefix.N` style.
    pub fn arb_pid() -> impl Strategy<Value = String> {
        "[a-z]{2,6}\\.[0-9]{1,4}"
    }

    /// Generate a chain of distinct pids, oldest first.
    pub fn arb_chain(max_len: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::hash_set(arb_pid(), 1..=max_len.max(1))
            .prop_map(|pids| pids.into_iter().collect::<Vec<_>>())
    }
}
