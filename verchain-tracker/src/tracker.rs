//! The version tracker: cache, persistence glue, traversal and public API.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use verchain_core::{
    is_valid_pid, validate_ttl_ms, ChainError, ChainRecord, ConfigError, Direction, DurationMs,
    FullChain, MetadataSource, Pid, RemoteError, StoredRecord, SystemMetadata, TrackerConfig,
    VerchainResult, VersionResult,
};
use verchain_events::{ChainUpdate, UpdateNotifier};
use verchain_storage::{validate_store, RecordStore};

use crate::cache::RecordCache;
use crate::coalescer::RequestCoalescer;
use crate::locks::LockTable;
use crate::stats::TrackerStats;

/// Options for [`VersionTracker::get_nth_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NthOptions {
    /// Walk past cached end flags to re-check for newer/older versions.
    pub ignore_end: bool,
    /// Attach the target's metadata, fetching it if needed.
    pub with_meta: bool,
}

impl NthOptions {
    pub fn ignore_end(mut self) -> Self {
        self.ignore_end = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.with_meta = true;
        self
    }
}

/// Cache and traversal engine for the version chains of one metadata
/// endpoint.
///
/// Records live in a bounded LRU map backed by a namespaced [`RecordStore`].
/// Remote fetches are coalesced per pid and chain expansion is serialized per
/// root pid.
pub struct VersionTracker {
    meta_service_url: String,
    ttl_ms: AtomicI64,
    max_chain_hops: usize,
    cache: RecordCache,
    store: Arc<dyn RecordStore>,
    coalescer: RequestCoalescer,
    locks: Arc<LockTable>,
    loads: Arc<LockTable>,
    notifier: Arc<dyn UpdateNotifier>,
}

impl VersionTracker {
    /// Build a tracker.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config does not validate or the store is
    /// not usable.
    pub fn new(
        config: TrackerConfig,
        source: Arc<dyn MetadataSource>,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn UpdateNotifier>,
    ) -> VerchainResult<Self> {
        config.validate()?;
        validate_store(store.as_ref())?;

        let max_chain_hops = to_usize("max_chain_hops", config.max_chain_hops)?;
        let capacity = NonZeroUsize::new(to_usize("max_cache_records", config.max_cache_records)?)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "max_cache_records".to_string(),
                value: config.max_cache_records.to_string(),
                reason: "max_cache_records must be greater than 0".to_string(),
            })?;

        info!(
            meta_service_url = %config.meta_service_url,
            namespace = %store.namespace(),
            ttl_ms = config.ttl_ms,
            max_chain_hops,
            max_cache_records = capacity.get(),
            "Version tracker created"
        );

        Ok(Self {
            meta_service_url: config.meta_service_url,
            ttl_ms: AtomicI64::new(config.ttl_ms),
            max_chain_hops,
            cache: RecordCache::new(capacity),
            store,
            coalescer: RequestCoalescer::new(source),
            locks: Arc::new(LockTable::new()),
            loads: Arc::new(LockTable::new()),
            notifier,
        })
    }

    pub fn meta_service_url(&self) -> &str {
        &self.meta_service_url
    }

    /// The persistent-store namespace this tracker reads and writes.
    pub fn namespace(&self) -> &str {
        self.store.namespace()
    }

    pub fn max_chain_hops(&self) -> usize {
        self.max_chain_hops
    }

    pub fn ttl_ms(&self) -> DurationMs {
        self.ttl_ms.load(Ordering::Relaxed)
    }

    /// Change the staleness threshold for subsequent store reads. Records
    /// already in memory are not re-validated.
    pub fn set_ttl(&self, ttl_ms: DurationMs) -> VerchainResult<()> {
        validate_ttl_ms(ttl_ms)?;
        self.ttl_ms.store(ttl_ms, Ordering::Relaxed);
        debug!(ttl_ms, "TTL updated");
        Ok(())
    }

    // ========================================================================
    // CACHE AND PERSISTENCE
    // ========================================================================

    /// The record for `pid`, marked most recently used.
    ///
    /// On a memory miss the fresh persisted copy is resurrected if one
    /// exists, otherwise a blank record is inserted (evicting the least
    /// recently used one if needed). Concurrent misses for the same pid wait
    /// for a single store read and all see its result.
    pub async fn record(&self, pid: &str) -> VerchainResult<ChainRecord> {
        ensure_pid(pid)?;
        if let Some(record) = self.cache.get(pid) {
            return Ok(record);
        }

        let _loading = self.loads.acquire(pid).await;
        // Filled in by the load we waited for.
        if self.cache.contains(pid) {
            return Ok(self.cache.get_or_insert_blank(pid));
        }

        let record = match self.load(pid).await? {
            Some(saved) => {
                debug!(pid = %pid, "Resurrected chain record from store");
                saved
            }
            None => ChainRecord::new(),
        };
        Ok(self.cache.get_or_insert(pid, &record))
    }

    /// Read the persisted record for `pid`.
    ///
    /// Returns `None` when nothing is stored or the stored copy is older
    /// than the TTL; a stale copy is removed from the store.
    pub async fn load(&self, pid: &str) -> VerchainResult<Option<ChainRecord>> {
        ensure_pid(pid)?;
        let Some(saved) = self.store.get_item(pid).await? else {
            return Ok(None);
        };

        let ttl_ms = self.ttl_ms();
        let now = Utc::now();
        if saved.is_stale(ttl_ms, now) {
            warn!(
                pid = %pid,
                age_ms = saved.age_ms(now),
                ttl_ms,
                "Removing stale chain record"
            );
            self.store.remove_item(pid).await?;
            return Ok(None);
        }

        Ok(Some(saved.into_record(pid)))
    }

    /// Write `record` to the store under `pid`, stamped with the current time.
    pub async fn persist(&self, pid: &str, record: &ChainRecord) -> VerchainResult<()> {
        ensure_pid(pid)?;
        let stored = StoredRecord::from_record(record, Utc::now());
        self.store.set_item(pid, &stored).await
    }

    // ========================================================================
    // REMOTE FETCH
    // ========================================================================

    /// Metadata for `pid`.
    ///
    /// Served from the record when it already carries a document; otherwise
    /// fetched through the coalescer, attached to the record and persisted,
    /// so later calls return the same `Arc` and an evicted record keeps its
    /// lean copy.
    pub async fn get_sys_meta(&self, pid: &str) -> VerchainResult<Arc<SystemMetadata>> {
        let record = self.record(pid).await?;
        if let Some(doc) = record.sys_meta {
            return Ok(doc);
        }

        let doc = self.coalescer.fetch(pid).await?;
        let fallback = self.cache.peek(pid).unwrap_or(record);
        let (updated, (kept, attached)) =
            self.cache
                .update_or_insert(pid, &fallback, |r| match &r.sys_meta {
                    Some(existing) => (Arc::clone(existing), false),
                    None => {
                        r.sys_meta = Some(Arc::clone(&doc));
                        (doc, true)
                    }
                });
        if attached {
            self.persist(pid, &updated).await?;
        }
        Ok(kept)
    }

    /// Fetch metadata for `pid` from the remote even if a document is cached,
    /// replacing and persisting the cached one.
    async fn refetch_sys_meta(&self, pid: &str) -> VerchainResult<Arc<SystemMetadata>> {
        let record = self.record(pid).await?;
        let doc = self.coalescer.fetch(pid).await?;
        let fallback = self.cache.peek(pid).unwrap_or(record);
        let (updated, _) = self.cache.update_or_insert(pid, &fallback, |r| {
            r.sys_meta = Some(Arc::clone(&doc));
        });
        self.persist(pid, &updated).await?;
        Ok(doc)
    }

    /// The neighbour of `frontier` in `direction`.
    ///
    /// A link already on the frontier's own record wins over its document,
    /// which may predate an `add_version`. A forced walk asks the remote first
    /// and falls back to the recorded link.
    async fn next_hop(
        &self,
        root: &str,
        frontier: &str,
        direction: Direction,
        force: bool,
    ) -> VerchainResult<Option<Pid>> {
        let known = if frontier == root {
            None
        } else {
            self.record(frontier).await?.links(direction).first().cloned()
        };
        if let (false, Some(known)) = (force, &known) {
            return Ok(Some(known.clone()));
        }

        let doc = if force {
            self.refetch_sys_meta(frontier).await?
        } else {
            self.get_sys_meta(frontier).await?
        };
        Ok(doc.neighbour(direction).map(str::to_string).or(known))
    }

    // ========================================================================
    // TRAVERSAL
    // ========================================================================

    /// Make sure at least `max_hops` links are known in `direction` from
    /// `pid`, or that the chain end in that direction is confirmed.
    ///
    /// The walk is bounded by `min(max_hops, max_chain_hops)`. A confirmed end
    /// flag short-circuits the walk unless `force` is set; a forced walk
    /// re-fetches every document it visits and appends only new pids.
    /// Links already recorded on a visited pid are followed without a fetch.
    ///
    /// On a remote failure the hops discovered so far are persisted and the
    /// error is returned.
    pub async fn fill_version_chain(
        &self,
        pid: &str,
        max_hops: usize,
        direction: Direction,
        force: bool,
    ) -> VerchainResult<()> {
        ensure_pid(pid)?;
        let budget = max_hops.min(self.max_chain_hops);

        let _guard = self.locks.acquire(pid).await;
        let mut record = self.record(pid).await?;
        let mut changed = false;

        let outcome = loop {
            let links = record.links(direction);
            if links.len() >= budget || (record.is_end(direction) && !force) {
                break Ok(());
            }

            let frontier = links.last().cloned().unwrap_or_else(|| pid.to_string());
            let hop = match self.next_hop(pid, &frontier, direction, force).await {
                Ok(hop) => hop,
                Err(e) => break Err(e),
            };

            let Some(adjacent) = hop else {
                if !record.is_end(direction) {
                    record = self
                        .cache
                        .update_or_insert(pid, &record, |r| r.set_end(direction, true))
                        .0;
                    changed = true;
                }
                debug!(pid = %pid, %direction, hops = record.links(direction).len(), "Reached chain end");
                break Ok(());
            };

            if adjacent == pid || record.contains(&adjacent) {
                break Err(RemoteError::Malformed {
                    pid: frontier,
                    reason: format!("version chain loops back to {}", adjacent),
                }
                .into());
            }

            record = self
                .cache
                .update_or_insert(pid, &record, |r| {
                    r.push_link(pid, direction, &adjacent);
                    r.set_end(direction, false);
                })
                .0;
            changed = true;
            debug!(pid = %pid, %direction, adjacent = %adjacent, "Discovered version");

            if let Err(e) = self.link_back(pid, &record, direction, &adjacent).await {
                break Err(e);
            }
        };

        if changed {
            let latest = self.cache.peek(pid).unwrap_or(record);
            self.persist(pid, &latest).await?;
            self.notifier.emit(ChainUpdate::new(pid, latest));
        }
        outcome
    }

    /// Populate the reverse links on a pid discovered by a walk from `start`.
    ///
    /// The neighbour's opposite list is extended only when its current
    /// content is a prefix of what the walk implies.
    async fn link_back(
        &self,
        start: &str,
        start_record: &ChainRecord,
        direction: Direction,
        adjacent: &str,
    ) -> VerchainResult<()> {
        let opposite = direction.opposite();
        let links = start_record.links(direction);
        let Some(index) = links.iter().position(|p| p == adjacent) else {
            return Ok(());
        };

        let expected: Vec<Pid> = links[..index]
            .iter()
            .rev()
            .cloned()
            .chain(std::iter::once(start.to_string()))
            .chain(start_record.links(opposite).iter().cloned())
            .collect();
        let start_end = start_record.is_end(opposite);

        let current = self.record(adjacent).await?;
        let (updated, changed) = self.cache.update_or_insert(adjacent, &current, |r| {
            let existing = r.links(opposite);
            if existing.len() > expected.len() || expected[..existing.len()] != *existing {
                return false;
            }
            let mut changed = false;
            for p in &expected[existing.len()..] {
                changed |= r.push_link(adjacent, opposite, p);
            }
            if r.links(opposite).len() == expected.len() && r.is_end(opposite) != start_end {
                r.set_end(opposite, start_end);
                changed = true;
            }
            changed
        });

        if changed {
            self.persist(adjacent, &updated).await?;
            self.notifier.emit(ChainUpdate::new(adjacent, updated));
        }
        Ok(())
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    /// The pid `offset` versions away from `pid`: positive is newer, negative
    /// is older, zero is `pid` itself.
    pub async fn get_nth(&self, pid: &str, offset: i64) -> VerchainResult<Pid> {
        Ok(self.get_nth_with(pid, offset, NthOptions::default()).await?.pid)
    }

    /// [`VersionTracker::get_nth`] with options.
    ///
    /// # Errors
    ///
    /// - `ChainError::InvalidPid` for an empty pid
    /// - `ChainError::OffsetOutOfRange` when `|offset|` exceeds `max_chain_hops`
    /// - `ChainError::ChainEnded` when the chain is shorter than `|offset|`
    pub async fn get_nth_with(
        &self,
        pid: &str,
        offset: i64,
        options: NthOptions,
    ) -> VerchainResult<VersionResult> {
        ensure_pid(pid)?;
        let steps = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
        if steps > self.max_chain_hops {
            return Err(ChainError::OffsetOutOfRange {
                offset,
                max: self.max_chain_hops,
            }
            .into());
        }

        let Some(direction) = Direction::from_offset(offset) else {
            self.record(pid).await?;
            return self.version_result(pid, options.with_meta).await;
        };

        self.fill_version_chain(pid, steps, direction, options.ignore_end)
            .await?;
        let record = self.record(pid).await?;
        let links = record.links(direction);
        let Some(target) = links.get(steps - 1) else {
            return Err(ChainError::ChainEnded {
                pid: pid.to_string(),
                offset,
                available: links.len(),
            }
            .into());
        };

        self.version_result(target, options.with_meta).await
    }

    async fn version_result(&self, pid: &str, with_meta: bool) -> VerchainResult<VersionResult> {
        let sys_meta = if with_meta {
            Some(self.get_sys_meta(pid).await?)
        } else {
            None
        };
        Ok(VersionResult {
            pid: pid.to_string(),
            sys_meta,
        })
    }

    /// Fill both directions up to the hop ceiling and return the record.
    pub async fn get_full_chain(&self, pid: &str) -> VerchainResult<ChainRecord> {
        self.get_full_chain_with(pid, false).await
    }

    /// [`VersionTracker::get_full_chain`], optionally re-probing past cached
    /// end flags.
    pub async fn get_full_chain_with(
        &self,
        pid: &str,
        ignore_end: bool,
    ) -> VerchainResult<ChainRecord> {
        self.fill_version_chain(pid, self.max_chain_hops, Direction::Forward, ignore_end)
            .await?;
        self.fill_version_chain(pid, self.max_chain_hops, Direction::Backward, ignore_end)
            .await?;
        self.record(pid).await
    }

    /// The full chain with each member's cached metadata attached.
    ///
    /// Metadata is taken from the members' records as they stand after the
    /// walk; nothing extra is fetched.
    pub async fn get_full_chain_with_meta(&self, pid: &str) -> VerchainResult<FullChain> {
        let record = self.get_full_chain(pid).await?;
        let prev = self.attach_meta(&record.prev).await?;
        let next = self.attach_meta(&record.next).await?;
        Ok(FullChain {
            prev,
            next,
            end_prev: record.end_prev,
            end_next: record.end_next,
            sys_meta: record.sys_meta,
        })
    }

    async fn attach_meta(&self, pids: &[Pid]) -> VerchainResult<Vec<VersionResult>> {
        let mut out = Vec::with_capacity(pids.len());
        for pid in pids {
            let record = self.record(pid).await?;
            out.push(VersionResult {
                pid: pid.clone(),
                sys_meta: record.sys_meta,
            });
        }
        Ok(out)
    }

    /// Forget everything known about `pid` and re-derive its full chain from
    /// the remote.
    pub async fn refresh(&self, pid: &str) -> VerchainResult<ChainRecord> {
        ensure_pid(pid)?;
        info!(pid = %pid, "Refreshing version chain");
        self.store.remove_item(pid).await?;
        self.cache.remove(pid);
        self.get_full_chain_with(pid, true).await
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Record that `new` obsoletes `prev`.
    pub async fn add_version(&self, prev: &str, new: &str) -> VerchainResult<()> {
        self.add_version_with_meta(prev, new, None).await
    }

    /// Record that `new` obsoletes `prev`, attaching a known metadata document
    /// to the new version.
    ///
    /// `prev` must be the confirmed newest version of its chain and `new` must
    /// have no known history. Nothing is mutated when a check fails.
    pub async fn add_version_with_meta(
        &self,
        prev: &str,
        new: &str,
        sys_meta: Option<SystemMetadata>,
    ) -> VerchainResult<()> {
        ensure_pid(prev)?;
        ensure_pid(new)?;
        if prev == new {
            return Err(ChainError::SelfLink {
                pid: prev.to_string(),
            }
            .into());
        }
        if let Some(doc) = &sys_meta {
            if doc.identifier != new {
                return Err(RemoteError::Malformed {
                    pid: new.to_string(),
                    reason: format!("document identifier is {}", doc.identifier),
                }
                .into());
            }
        }

        self.fill_version_chain(prev, 1, Direction::Forward, false)
            .await?;
        self.fill_version_chain(new, 1, Direction::Backward, false)
            .await?;

        // Sorted order so two opposing add_version calls cannot deadlock.
        let (first, second) = if prev < new { (prev, new) } else { (new, prev) };
        let _first = self.locks.acquire(first).await;
        let _second = self.locks.acquire(second).await;

        let prev_record = self.record(prev).await?;
        let new_record = self.record(new).await?;

        if prev_record.contains(new) || new_record.contains(prev) {
            return Err(ChainError::AlreadyLinked {
                prev: prev.to_string(),
                new: new.to_string(),
            }
            .into());
        }
        if !prev_record.is_tip() {
            return Err(ChainError::NotTip {
                prev: prev.to_string(),
            }
            .into());
        }
        if !new_record.is_isolated() {
            return Err(ChainError::NotIsolated {
                new: new.to_string(),
            }
            .into());
        }

        // Cached documents must agree with the new links, or a later walk
        // through either pid would see a stale chain end.
        let (prev_updated, _) = self.cache.update_or_insert(prev, &prev_record, |r| {
            r.next = vec![new.to_string()];
            r.end_next = true;
            if let Some(existing) = r.sys_meta.as_mut() {
                Arc::make_mut(existing).set_neighbour(Direction::Forward, new);
            }
        });

        let doc = sys_meta.map(|mut doc| {
            doc.set_neighbour(Direction::Backward, prev);
            Arc::new(doc)
        });
        let (new_updated, _) = self.cache.update_or_insert(new, &new_record, |r| {
            r.prev.clear();
            r.push_link(new, Direction::Backward, prev);
            for p in &prev_updated.prev {
                r.push_link(new, Direction::Backward, p);
            }
            r.end_prev = prev_updated.end_prev;
            r.end_next = true;
            match doc {
                Some(doc) => r.sys_meta = Some(doc),
                None => {
                    if let Some(existing) = r.sys_meta.as_mut() {
                        Arc::make_mut(existing).set_neighbour(Direction::Backward, prev);
                    }
                }
            }
        });

        self.persist(prev, &prev_updated).await?;
        self.persist(new, &new_updated).await?;

        info!(prev = %prev, new = %new, "Added version");
        self.notifier.emit(ChainUpdate::new(prev, prev_updated));
        self.notifier.emit(ChainUpdate::new(new, new_updated));
        Ok(())
    }

    // ========================================================================
    // LIFECYCLE AND INTROSPECTION
    // ========================================================================

    /// Empty the in-memory cache and this tracker's store namespace, and drop
    /// in-flight bookkeeping, locks and subscribers.
    ///
    /// The whole notifier is cleared, so a notifier shared with trackers for
    /// other endpoints loses their subscribers too.
    pub async fn clear(&self) -> VerchainResult<bool> {
        let removed = self.store.clear().await?;
        self.cache.clear();
        self.coalescer.clear();
        self.locks.clear();
        self.loads.clear();
        self.notifier.clear();
        info!(namespace = %self.namespace(), removed, "Cleared version tracker");
        Ok(true)
    }

    /// True while a traversal holds the lock for `pid`.
    pub fn is_locked(&self, pid: &str) -> bool {
        self.locks.is_locked(pid)
    }

    /// Number of remote fetches currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.coalescer.in_flight_count()
    }

    /// True if `pid` currently has a record in memory.
    pub fn is_cached(&self, pid: &str) -> bool {
        self.cache.contains(pid)
    }

    pub fn stats(&self) -> TrackerStats {
        let counters = self.cache.counters();
        TrackerStats {
            cache_hits: counters.hits,
            cache_misses: counters.misses,
            evictions: counters.evictions,
            remote_fetches: self.coalescer.remote_fetches(),
            coalesced_fetches: self.coalescer.coalesced_fetches(),
            cached_records: self.cache.len(),
        }
    }
}

fn ensure_pid(pid: &str) -> VerchainResult<()> {
    if is_valid_pid(pid) {
        Ok(())
    } else {
        Err(ChainError::InvalidPid.into())
    }
}

fn to_usize(field: &str, value: i64) -> VerchainResult<usize> {
    usize::try_from(value).map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("{} does not fit in usize", field),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use verchain_core::{namespace_for, VerchainError};
    use verchain_events::NoopNotifier;
    use verchain_storage::InMemoryRecordStore;
    use verchain_test_utils::{test_config, ChainSource};

    fn tracker(source: ChainSource, config: TrackerConfig) -> VersionTracker {
        let store = InMemoryRecordStore::new(namespace_for(&config.meta_service_url));
        VersionTracker::new(
            config,
            Arc::new(source),
            Arc::new(store),
            Arc::new(NoopNotifier),
        )
        .expect("valid tracker")
    }

    #[test]
    fn test_rejects_invalid_config() {
        for config in [
            test_config().with_ttl_ms(-1),
            test_config().with_max_chain_hops(-5),
            test_config().with_max_cache_records(-10),
        ] {
            let result = VersionTracker::new(
                config,
                Arc::new(ChainSource::new()),
                Arc::new(InMemoryRecordStore::new("vt_x")),
                Arc::new(NoopNotifier),
            );
            assert!(matches!(result, Err(VerchainError::Config(_))));
        }
    }

    #[test]
    fn test_rejects_invalid_store() {
        let result = VersionTracker::new(
            test_config(),
            Arc::new(ChainSource::new()),
            Arc::new(InMemoryRecordStore::new("")),
            Arc::new(NoopNotifier),
        );
        assert!(matches!(
            result,
            Err(VerchainError::Config(ConfigError::InvalidStore { .. }))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_record_creates_blank_default() {
        let t = tracker(ChainSource::new(), test_config());
        let rec = t.record("p.1").await.expect("record");
        assert!(rec.is_blank());
        assert!(t.is_cached("p.1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_fill_forward_scenario() {
        let t = tracker(ChainSource::with_chain(&["p.1", "p.2", "p.3"]), test_config());
        t.fill_version_chain("p.1", 3, Direction::Forward, false)
            .await
            .expect("fill");
        let rec = t.record("p.1").await.expect("record");
        assert_eq!(rec.next, vec!["p.2", "p.3"]);
        assert!(rec.end_next);
        assert!(!t.is_locked("p.1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_fill_populates_reverse_links() {
        let t = tracker(ChainSource::with_chain(&["p.1", "p.2", "p.3"]), test_config());
        t.fill_version_chain("p.1", 3, Direction::Forward, false)
            .await
            .expect("fill");
        assert_eq!(t.record("p.2").await.expect("p.2").prev, vec!["p.1"]);
        assert_eq!(t.record("p.3").await.expect("p.3").prev, vec!["p.2", "p.1"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cycle_is_malformed() {
        let source = ChainSource::new();
        source.set_doc(SystemMetadata::new("a").with_obsoleted_by("b"));
        source.set_doc(SystemMetadata::new("b").with_obsoleted_by("a"));
        let t = tracker(source, test_config());

        let err = t
            .fill_version_chain("a", 10, Direction::Forward, false)
            .await
            .expect_err("cycle");
        assert!(matches!(
            err,
            VerchainError::Remote(RemoteError::Malformed { .. })
        ));
        assert_eq!(t.record("a").await.expect("a").next, vec!["b"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_set_ttl_validation() {
        let t = tracker(ChainSource::new(), test_config());
        assert!(t.set_ttl(0).is_err());
        assert!(t.set_ttl(-1).is_err());
        t.set_ttl(5_000).expect("positive ttl");
        assert_eq!(t.ttl_ms(), 5_000);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_invalid_pid() {
        let t = tracker(ChainSource::new(), test_config());
        assert_eq!(
            t.get_nth("", 1).await,
            Err(VerchainError::Chain(ChainError::InvalidPid))
        );
        assert!(t.record("  ").await.is_err());
    }
}
