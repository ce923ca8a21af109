//! Request coalescing and per-pid locking seen through the public API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::Harness;
use verchain_core::{namespace_for, ChainRecord, Direction, StoredRecord, VerchainResult};
use verchain_events::NoopNotifier;
use verchain_storage::{InMemoryRecordStore, RecordStore, StoreStats};
use verchain_test_utils::{as_strs, linear_chain, test_config, ChainSource};
use verchain_tracker::VersionTracker;

/// A store whose reads take `delay`.
struct SlowStore {
    inner: InMemoryRecordStore,
    delay: Duration,
}

#[async_trait]
impl RecordStore for SlowStore {
    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    async fn get_item(&self, key: &str) -> VerchainResult<Option<StoredRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &StoredRecord) -> VerchainResult<()> {
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> VerchainResult<bool> {
        self.inner.remove_item(key).await
    }

    async fn clear(&self) -> VerchainResult<u64> {
        self.inner.clear().await
    }

    async fn stats(&self) -> VerchainResult<StoreStats> {
        self.inner.stats().await
    }
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_get_sys_meta_fetches_once() {
    let h = Harness::new(
        ChainSource::with_chain(&["p.1", "p.2"]).with_latency(Duration::from_millis(20)),
    );

    let (a, b, c) = tokio::join!(
        h.tracker.get_sys_meta("p.1"),
        h.tracker.get_sys_meta("p.1"),
        h.tracker.get_sys_meta("p.1"),
    );
    let a = a.expect("a");
    assert!(Arc::ptr_eq(&a, &b.expect("b")));
    assert!(Arc::ptr_eq(&a, &c.expect("c")));
    assert_eq!(h.source.calls("p.1"), 1);
    assert_eq!(h.tracker.in_flight_count(), 0);

    // Cached afterwards: same document, no new fetch.
    let again = h.tracker.get_sys_meta("p.1").await.expect("again");
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(h.source.calls("p.1"), 1);

    let stats = h.tracker.stats();
    assert_eq!(stats.remote_fetches, 1);
    assert_eq!(stats.coalesced_fetches, 2);
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_failure_rejects_every_waiter() {
    let source = ChainSource::with_chain(&["p.1"]).with_latency(Duration::from_millis(10));
    source.fail_next("p.1", 1);
    let h = Harness::new(source);

    let (a, b) = tokio::join!(h.tracker.get_sys_meta("p.1"), h.tracker.get_sys_meta("p.1"));
    assert!(a.is_err());
    assert_eq!(a.map(|_| ()), b.map(|_| ()));
    assert_eq!(h.source.calls("p.1"), 1);

    // Failure was not cached.
    h.tracker.get_sys_meta("p.1").await.expect("retry");
    assert_eq!(h.source.calls("p.1"), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_fills_walk_once() {
    let pids = linear_chain("p", 6);
    let h = Harness::new(
        ChainSource::with_chain(&as_strs(&pids)).with_latency(Duration::from_millis(5)),
    );

    let (a, b, c) = tokio::join!(
        h.tracker.get_nth("p.1", 5),
        h.tracker.get_nth("p.1", 5),
        h.tracker.fill_version_chain("p.1", 5, Direction::Forward, false),
    );
    assert_eq!(a.expect("a"), "p.6");
    assert_eq!(b.expect("b"), "p.6");
    c.expect("c");

    for pid in &pids[..5] {
        assert_eq!(h.source.calls(pid), 1, "{} fetched more than once", pid);
    }
    assert!(!h.tracker.is_locked("p.1"));
}

#[tokio::test(flavor = "current_thread")]
async fn lock_is_visible_during_fill() {
    let h = Harness::new(
        ChainSource::with_chain(&["p.1", "p.2"]).with_latency(Duration::from_millis(20)),
    );

    let probe = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        (h.tracker.is_locked("p.1"), h.tracker.in_flight_count())
    };
    let (filled, (locked, in_flight)) = tokio::join!(
        h.tracker.fill_version_chain("p.1", 1, Direction::Forward, false),
        probe
    );
    filled.expect("fill");
    assert!(locked);
    assert_eq!(in_flight, 1);
    assert!(!h.tracker.is_locked("p.1"));
}

#[tokio::test(flavor = "current_thread")]
async fn opposing_add_versions_do_not_deadlock() {
    let h = Harness::new(ChainSource::new().with_latency(Duration::from_millis(2)));

    let result = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            h.tracker.add_version("a.1", "b.1"),
            h.tracker.add_version("b.1", "a.1"),
        )
    })
    .await
    .expect("no deadlock");

    // Exactly one direction wins.
    assert_ne!(result.0.is_ok(), result.1.is_ok());
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_miss_waits_for_store_resurrection() {
    let config = test_config();
    let inner = InMemoryRecordStore::new(namespace_for(&config.meta_service_url));
    let mut saved = ChainRecord::new();
    saved.next = vec!["p.2".to_string(), "p.3".to_string()];
    saved.end_next = true;
    inner
        .set_item("p.1", &StoredRecord::from_record(&saved, Utc::now()))
        .await
        .expect("set");

    let source = Arc::new(ChainSource::new().strict());
    let tracker = VersionTracker::new(
        config,
        source.clone(),
        Arc::new(SlowStore {
            inner,
            delay: Duration::from_millis(10),
        }),
        Arc::new(NoopNotifier),
    )
    .expect("tracker");

    let (record, nth) = tokio::join!(tracker.record("p.1"), tracker.get_nth("p.1", 1));
    assert_eq!(record.expect("record").next, vec!["p.2", "p.3"]);
    assert_eq!(nth.expect("nth"), "p.2");
    assert_eq!(source.total_calls(), 0);

    let (a, b) = tokio::join!(tracker.record("q.1"), tracker.record("q.1"));
    assert!(a.expect("a").is_blank());
    assert!(b.expect("b").is_blank());
    assert_eq!(tracker.stats().cached_records, 2);
}
