//! In-flight request coalescing over a [`MetadataSource`].
//!
//! Concurrent fetches for the same pid share one [`Shared`] future, so the
//! remote source is invoked once per burst. The entry is dropped as soon as
//! the fetch settles, which means failures are never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};
use verchain_core::{MetadataSource, Pid, RemoteError, SystemMetadata, VerchainResult};

type FetchFuture = Shared<BoxFuture<'static, VerchainResult<Arc<SystemMetadata>>>>;

struct InFlight {
    id: u64,
    future: FetchFuture,
}

/// Deduplicates concurrent remote fetches per pid.
pub struct RequestCoalescer {
    source: Arc<dyn MetadataSource>,
    in_flight: Arc<Mutex<HashMap<Pid, InFlight>>>,
    next_id: AtomicU64,
    remote_fetches: AtomicU64,
    coalesced_fetches: AtomicU64,
}

impl RequestCoalescer {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            remote_fetches: AtomicU64::new(0),
            coalesced_fetches: AtomicU64::new(0),
        }
    }

    /// Fetch metadata for `pid`, joining an in-flight request if one exists.
    ///
    /// Every waiter of a shared request receives the same `Arc` on success
    /// and a clone of the same error on failure.
    pub async fn fetch(&self, pid: &str) -> VerchainResult<Arc<SystemMetadata>> {
        let future = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(pid) {
                Some(entry) => {
                    self.coalesced_fetches.fetch_add(1, Ordering::Relaxed);
                    debug!(pid = %pid, "Joining in-flight metadata fetch");
                    entry.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.start(pid, id);
                    in_flight.insert(
                        pid.to_string(),
                        InFlight {
                            id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };
        future.await
    }

    fn start(&self, pid: &str, id: u64) -> FetchFuture {
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);

        let source = Arc::clone(&self.source);
        let in_flight = Arc::clone(&self.in_flight);
        let pid = pid.to_string();

        async move {
            debug!(pid = %pid, "Fetching system metadata");
            let result = source.fetch(&pid).await.and_then(|doc| {
                if doc.identifier != pid {
                    return Err(RemoteError::Malformed {
                        pid: pid.clone(),
                        reason: format!("document identifier is {}", doc.identifier),
                    }
                    .into());
                }
                Ok(Arc::new(doc))
            });

            if let Err(e) = &result {
                warn!(pid = %pid, error = %e, "System metadata fetch failed");
            }

            // Only remove our own entry; clear() may have let a newer one in.
            {
                let mut in_flight = in_flight.lock();
                if in_flight.get(&pid).map(|entry| entry.id) == Some(id) {
                    in_flight.remove(&pid);
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Forget all in-flight bookkeeping. Running fetches still complete for
    /// their current waiters.
    pub fn clear(&self) {
        self.in_flight.lock().clear();
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, pid: &str) -> bool {
        self.in_flight.lock().contains_key(pid)
    }

    pub fn remote_fetches(&self) -> u64 {
        self.remote_fetches.load(Ordering::Relaxed)
    }

    pub fn coalesced_fetches(&self) -> u64 {
        self.coalesced_fetches.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use verchain_core::VerchainError;
    use verchain_test_utils::ChainSource;

    fn coalescer(source: &Arc<ChainSource>) -> RequestCoalescer {
        RequestCoalescer::new(Arc::clone(source) as Arc<dyn MetadataSource>)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_fetches_share_one_request() {
        let source = Arc::new(
            ChainSource::with_chain(&["p.1", "p.2"]).with_latency(Duration::from_millis(20)),
        );
        let coalescer = coalescer(&source);

        let (a, b, c) = tokio::join!(
            coalescer.fetch("p.1"),
            coalescer.fetch("p.1"),
            coalescer.fetch("p.1")
        );

        let a = a.expect("fetch a");
        let b = b.expect("fetch b");
        let c = c.expect("fetch c");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(source.calls("p.1"), 1);
        assert_eq!(coalescer.remote_fetches(), 1);
        assert_eq!(coalescer.coalesced_fetches(), 2);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_sequential_fetches_hit_remote_each_time() {
        let source = Arc::new(ChainSource::with_chain(&["p.1"]));
        let coalescer = coalescer(&source);

        coalescer.fetch("p.1").await.expect("first");
        coalescer.fetch("p.1").await.expect("second");
        assert_eq!(source.calls("p.1"), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failure_reaches_all_waiters_and_is_not_cached() {
        let source = Arc::new(
            ChainSource::with_chain(&["p.1"]).with_latency(Duration::from_millis(10)),
        );
        source.fail_next("p.1", 1);
        let coalescer = coalescer(&source);

        let (a, b) = tokio::join!(coalescer.fetch("p.1"), coalescer.fetch("p.1"));
        assert!(matches!(a, Err(VerchainError::Remote(_))));
        assert_eq!(a, b);
        assert_eq!(source.calls("p.1"), 1);
        assert!(!coalescer.is_in_flight("p.1"));

        coalescer.fetch("p.1").await.expect("retry succeeds");
        assert_eq!(source.calls("p.1"), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_identifier_mismatch_is_malformed() {
        let source = Arc::new(ChainSource::new());
        source.set_doc(SystemMetadata::new("other"));

        // Answers every request with the document for "other".
        struct Misrouted(Arc<ChainSource>);
        #[async_trait::async_trait]
        impl MetadataSource for Misrouted {
            async fn fetch(&self, _pid: &str) -> VerchainResult<SystemMetadata> {
                self.0.fetch("other").await
            }
        }
        let coalescer = RequestCoalescer::new(Arc::new(Misrouted(source)));
        assert!(matches!(
            coalescer.fetch("p.1").await,
            Err(VerchainError::Remote(RemoteError::Malformed { .. }))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_distinct_pids_are_not_coalesced() {
        let source = Arc::new(
            ChainSource::with_chain(&["p.1", "p.2"]).with_latency(Duration::from_millis(5)),
        );
        let coalescer = coalescer(&source);
        let (a, b) = tokio::join!(coalescer.fetch("p.1"), coalescer.fetch("p.2"));
        assert_eq!(a.expect("p.1").identifier, "p.1");
        assert_eq!(b.expect("p.2").identifier, "p.2");
        assert_eq!(coalescer.remote_fetches(), 2);
        assert_eq!(coalescer.coalesced_fetches(), 0);
    }
}
