//! Per-pid advisory locks.
//!
//! A lock is an entry in a map from pid to a completion signal. Acquiring
//! inserts the entry, releasing removes it and wakes everyone waiting on the
//! signal; waiters then race to insert a fresh entry.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use verchain_core::Pid;

/// Table of per-pid locks.
#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<Pid, Arc<Notify>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `pid`, waiting for the current holder if any.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(self: &Arc<Self>, pid: &str) -> ChainLockGuard {
        loop {
            let held = {
                let mut locks = self.locks.lock();
                match locks.get(pid) {
                    Some(signal) => Arc::clone(signal),
                    None => {
                        let signal = Arc::new(Notify::new());
                        locks.insert(pid.to_string(), Arc::clone(&signal));
                        return ChainLockGuard {
                            table: Arc::clone(self),
                            pid: pid.to_string(),
                            signal,
                        };
                    }
                }
            };

            let mut notified = pin!(held.notified());
            notified.as_mut().enable();

            // The holder may have released between our map lookup and
            // enable(); notify_waiters() does not reach unregistered waiters.
            if !self.is_held_by(pid, &held) {
                continue;
            }

            debug!(pid = %pid, "Waiting for chain lock");
            notified.await;
        }
    }

    /// True while some traversal holds the lock for `pid`.
    pub fn is_locked(&self, pid: &str) -> bool {
        self.locks.lock().contains_key(pid)
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Current holders keep running; their release then
    /// only wakes their own waiters.
    pub fn clear(&self) {
        self.locks.lock().clear();
    }

    fn is_held_by(&self, pid: &str, signal: &Arc<Notify>) -> bool {
        self.locks
            .lock()
            .get(pid)
            .is_some_and(|current| Arc::ptr_eq(current, signal))
    }
}

/// Proof of holding the lock for one pid.
pub struct ChainLockGuard {
    table: Arc<LockTable>,
    pid: Pid,
    signal: Arc<Notify>,
}

impl ChainLockGuard {
    pub fn pid(&self) -> &str {
        &self.pid
    }
}

impl Drop for ChainLockGuard {
    fn drop(&mut self) {
        {
            let mut locks = self.table.locks.lock();
            if locks
                .get(&self.pid)
                .is_some_and(|current| Arc::ptr_eq(current, &self.signal))
            {
                locks.remove(&self.pid);
            }
        }
        self.signal.notify_waiters();
    }
}
