//! Tracker statistics.

/// Snapshot of a tracker's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// `record()` calls served from memory.
    pub cache_hits: u64,
    /// `record()` calls that had to create or resurrect a record.
    pub cache_misses: u64,
    /// Records dropped from memory by LRU pressure.
    pub evictions: u64,
    /// Remote fetches actually issued.
    pub remote_fetches: u64,
    /// Fetches that joined an in-flight request instead.
    pub coalesced_fetches: u64,
    /// Records currently held in memory.
    pub cached_records: usize,
}

impl TrackerStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
