//! Chain records: the unit of caching and persistence.

use crate::{LeanSysMeta, Pid, SystemMetadata, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// DIRECTION
// ============================================================================

/// Direction of travel along a version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards newer versions (`obsoletedBy`).
    Forward,
    /// Towards older versions (`obsoletes`).
    Backward,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// Direction implied by a signed offset; `None` for zero.
    pub fn from_offset(offset: i64) -> Option<Self> {
        match offset {
            0 => None,
            o if o > 0 => Some(Direction::Forward),
            _ => Some(Direction::Backward),
        }
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

// ============================================================================
// CHAIN RECORD
// ============================================================================

/// The known fragment of a version chain around one pid.
///
/// Invariants:
/// - `next` and `prev` never contain the record's own pid, nor duplicates.
/// - `end_next` / `end_prev` are only true once the remote source confirmed
///   that no further neighbour exists beyond the last list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRecord {
    /// Successors, nearest first (`next[0]` obsoletes this version).
    pub next: Vec<Pid>,
    /// Predecessors, nearest first (`prev[0]` is obsoleted by this version).
    pub prev: Vec<Pid>,
    pub end_next: bool,
    pub end_prev: bool,
    /// Last metadata document fetched directly for this pid.
    pub sys_meta: Option<Arc<SystemMetadata>>,
    /// Creation or last persistence time.
    pub ts: Timestamp,
}

impl Default for ChainRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainRecord {
    /// An empty record stamped with the current time.
    pub fn new() -> Self {
        Self {
            next: Vec::new(),
            prev: Vec::new(),
            end_next: false,
            end_prev: false,
            sys_meta: None,
            ts: Utc::now(),
        }
    }

    pub fn links(&self, direction: Direction) -> &[Pid] {
        match direction {
            Direction::Forward => &self.next,
            Direction::Backward => &self.prev,
        }
    }

    pub fn links_mut(&mut self, direction: Direction) -> &mut Vec<Pid> {
        match direction {
            Direction::Forward => &mut self.next,
            Direction::Backward => &mut self.prev,
        }
    }

    pub fn is_end(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.end_next,
            Direction::Backward => self.end_prev,
        }
    }

    pub fn set_end(&mut self, direction: Direction, end: bool) {
        match direction {
            Direction::Forward => self.end_next = end,
            Direction::Backward => self.end_prev = end,
        }
    }

    /// True if `pid` appears in either direction.
    pub fn contains(&self, pid: &str) -> bool {
        self.next.iter().any(|p| p == pid) || self.prev.iter().any(|p| p == pid)
    }

    /// Confirmed newest version of its chain.
    pub fn is_tip(&self) -> bool {
        self.end_next && self.next.is_empty()
    }

    /// Confirmed to have no older versions and no known newer ones.
    pub fn is_isolated(&self) -> bool {
        self.end_prev && self.prev.is_empty() && self.next.is_empty()
    }

    /// Nothing has been learned about this pid yet.
    pub fn is_blank(&self) -> bool {
        self.next.is_empty()
            && self.prev.is_empty()
            && !self.end_next
            && !self.end_prev
            && self.sys_meta.is_none()
    }

    /// Append `pid` to the list in `direction`.
    ///
    /// Returns false (and leaves the record untouched) if `pid` is the
    /// record's own pid or already present in that list.
    pub fn push_link(&mut self, own_pid: &str, direction: Direction, pid: &str) -> bool {
        if pid == own_pid || self.links(direction).iter().any(|p| p == pid) {
            return false;
        }
        self.links_mut(direction).push(pid.to_string());
        true
    }
}

// ============================================================================
// STORED RECORD
// ============================================================================

/// The persisted form of a [`ChainRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    #[serde(default)]
    pub next: Vec<Pid>,
    #[serde(default)]
    pub prev: Vec<Pid>,
    #[serde(default)]
    pub end_next: bool,
    #[serde(default)]
    pub end_prev: bool,
    #[serde(default)]
    pub sys_meta: Option<LeanSysMeta>,
    pub ts: Timestamp,
}

impl StoredRecord {
    /// Snapshot `record` for persistence, stamped with `ts`.
    pub fn from_record(record: &ChainRecord, ts: Timestamp) -> Self {
        Self {
            next: record.next.clone(),
            prev: record.prev.clone(),
            end_next: record.end_next,
            end_prev: record.end_prev,
            sys_meta: record.sys_meta.as_ref().map(|meta| meta.lean()),
            ts,
        }
    }

    /// Age in milliseconds relative to `now` (never negative).
    pub fn age_ms(&self, now: Timestamp) -> i64 {
        (now - self.ts).num_milliseconds().max(0)
    }

    /// A record is stale once it is strictly older than `ttl_ms`.
    pub fn is_stale(&self, ttl_ms: i64, now: Timestamp) -> bool {
        self.age_ms(now) > ttl_ms
    }

    /// Resurrect an in-memory record for `pid`.
    ///
    /// Blank entries, the record's own pid and duplicates are dropped so that
    /// records written by older or foreign writers still honour the
    /// [`ChainRecord`] invariants.
    pub fn into_record(self, pid: &str) -> ChainRecord {
        let mut record = ChainRecord {
            next: Vec::with_capacity(self.next.len()),
            prev: Vec::with_capacity(self.prev.len()),
            end_next: self.end_next,
            end_prev: self.end_prev,
            sys_meta: self
                .sys_meta
                .map(|lean| Arc::new(lean.into_system_metadata(pid))),
            ts: self.ts,
        };
        for p in self.next.iter().filter(|p| !p.is_empty()) {
            record.push_link(pid, Direction::Forward, p);
        }
        for p in self.prev.iter().filter(|p| !p.is_empty()) {
            record.push_link(pid, Direction::Backward, p);
        }
        record
    }
}

// ============================================================================
// API RESULT TYPES
// ============================================================================

/// A pid together with its metadata, when requested.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionResult {
    pub pid: Pid,
    pub sys_meta: Option<Arc<SystemMetadata>>,
}

/// A full chain with metadata attached to every member.
#[derive(Debug, Clone, PartialEq)]
pub struct FullChain {
    pub prev: Vec<VersionResult>,
    pub next: Vec<VersionResult>,
    pub end_prev: bool,
    pub end_next: bool,
    pub sys_meta: Option<Arc<SystemMetadata>>,
}
