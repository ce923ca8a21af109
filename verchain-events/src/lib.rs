//! VERCHAIN Events - Per-pid Update Notifications
//!
//! A version tracker raises one `update:<pid>` notification every time the
//! record of `pid` is mutated by a traversal or by adding a version. This
//! crate provides the injectable notifier interface and a pub/sub hub built
//! on tokio broadcast channels.
//!
//! # Key Types
//!
//! - `ChainUpdate`: the payload, a snapshot of the mutated record
//! - `UpdateNotifier`: what a tracker needs (emit, clear)
//! - `UpdateHub`: per-pid subscriptions over `tokio::sync::broadcast`
//! - `NoopNotifier`: for trackers nobody listens to

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use verchain_core::{ChainRecord, Pid};

/// Default per-pid channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Notification that the record of `pid` changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainUpdate {
    pub pid: Pid,
    /// The record as it was right after the mutation.
    pub record: ChainRecord,
}

impl ChainUpdate {
    pub fn new(pid: impl Into<Pid>, record: ChainRecord) -> Self {
        Self {
            pid: pid.into(),
            record,
        }
    }

    /// The event name, `update:<pid>`.
    pub fn event_name(&self) -> String {
        format!("update:{}", self.pid)
    }
}

/// Sink for record-change notifications.
pub trait UpdateNotifier: Send + Sync {
    /// Deliver `update` to whoever listens for its pid. Never blocks.
    fn emit(&self, update: ChainUpdate);

    /// Drop every subscription.
    fn clear(&self);
}

/// Notifier that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl UpdateNotifier for NoopNotifier {
    fn emit(&self, _update: ChainUpdate) {}

    fn clear(&self) {}
}

/// Per-pid pub/sub hub.
///
/// Each pid gets its own broadcast channel, created on first subscription.
/// Emitting for a pid nobody subscribed to is a no-op.
pub struct UpdateHub {
    capacity: usize,
    channels: Mutex<HashMap<Pid, broadcast::Sender<ChainUpdate>>>,
}

impl Default for UpdateHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl UpdateHub {
    /// Create a hub whose per-pid channels buffer `capacity` updates.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to updates of `pid`.
    ///
    /// The receiver must be polled; a slow receiver lags and misses updates
    /// rather than blocking the tracker.
    pub fn subscribe(&self, pid: &str) -> broadcast::Receiver<ChainUpdate> {
        let mut channels = self.channels.lock();
        channels
            .entry(pid.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Remove every subscription for `pid`. Existing receivers see `Closed`.
    pub fn off(&self, pid: &str) -> bool {
        self.channels.lock().remove(pid).is_some()
    }

    /// Number of live receivers for `pid`.
    pub fn subscriber_count(&self, pid: &str) -> usize {
        self.channels
            .lock()
            .get(pid)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of pids with a channel.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}

impl UpdateNotifier for UpdateHub {
    fn emit(&self, update: ChainUpdate) {
        let mut channels = self.channels.lock();
        let Some(tx) = channels.get(&update.pid) else {
            return;
        };
        let pid = update.pid.clone();
        match tx.send(update) {
            Ok(receivers) => {
                debug!(pid = %pid, receivers, "Emitted chain update");
            }
            Err(_) => {
                // Every receiver was dropped; forget the channel.
                channels.remove(&pid);
                debug!(pid = %pid, "No receivers for chain update");
            }
        }
    }

    fn clear(&self) {
        self.channels.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(pid: &str) -> ChainUpdate {
        let mut record = ChainRecord::new();
        record.next.push(format!("{}-next", pid));
        ChainUpdate::new(pid, record)
    }

    #[test]
    fn test_event_name() {
        assert_eq!(update("abc.1").event_name(), "update:abc.1");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let hub = UpdateHub::default();
        hub.emit(update("p.1"));
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_only_its_pid() {
        let hub = UpdateHub::default();
        let mut rx = hub.subscribe("p.1");

        hub.emit(update("p.2"));
        hub.emit(update("p.1"));

        let received = rx.try_recv().expect("should receive update");
        assert_eq!(received.pid, "p.1");
        assert_eq!(received.record.next, vec!["p.1-next"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_off_closes_receivers() {
        let hub = UpdateHub::default();
        let mut rx = hub.subscribe("p.1");
        assert_eq!(hub.subscriber_count("p.1"), 1);

        assert!(hub.off("p.1"));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
        assert_eq!(hub.subscriber_count("p.1"), 0);
    }

    #[test]
    fn test_clear_drops_everything() {
        let hub = UpdateHub::default();
        let _a = hub.subscribe("a");
        let _b = hub.subscribe("b");
        assert_eq!(hub.channel_count(), 2);
        UpdateNotifier::clear(&hub);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_dropped_receivers_release_channel() {
        let hub = UpdateHub::default();
        drop(hub.subscribe("p.1"));
        hub.emit(update("p.1"));
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_async_receive() {
        let hub = UpdateHub::new(4);
        let mut rx = hub.subscribe("p.9");
        hub.emit(update("p.9"));
        let got = rx.recv().await.expect("update delivered");
        assert_eq!(got.event_name(), "update:p.9");
    }
}
