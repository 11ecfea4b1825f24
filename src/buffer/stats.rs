//! Buffer cache statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by the buffer cache.
///
/// All fields are atomic for lock-free updates. We use `Ordering::Relaxed`
/// throughout: counters are independent and only need atomicity.
///
/// # Example
/// ```
/// use blocktree::CacheStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = CacheStats::new();
/// stats.cache_hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.cache_hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    /// Number of times a block was found in the cache.
    pub cache_hits: AtomicU64,

    /// Number of times a block had to be read from disk.
    pub cache_misses: AtomicU64,

    /// Number of times a block was evicted from the cache.
    pub evictions: AtomicU64,

    /// Number of blocks read from disk.
    pub blocks_read: AtomicU64,

    /// Number of blocks written to disk.
    pub blocks_written: AtomicU64,

    /// Allocation notifications received from the tree.
    pub blocks_allocated: AtomicU64,

    /// Deallocation notifications received from the tree.
    pub blocks_deallocated: AtomicU64,
}

impl CacheStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            blocks_read: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
            blocks_allocated: AtomicU64::new(0),
            blocks_deallocated: AtomicU64::new(0),
        }
    }

    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Get a non-atomic copy of current statistics for display/logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            blocks_allocated: self.blocks_allocated.load(Ordering::Relaxed),
            blocks_deallocated: self.blocks_deallocated.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.blocks_read,
            &self.blocks_written,
            &self.blocks_allocated,
            &self.blocks_deallocated,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of buffer cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub blocks_read: u64,
    pub blocks_written: u64,
    pub blocks_allocated: u64,
    pub blocks_deallocated: u64,
}

impl StatsSnapshot {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Blocks currently held by the tree, as seen through notifications.
    pub fn net_allocated(&self) -> i64 {
        self.blocks_allocated as i64 - self.blocks_deallocated as i64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, hit_rate: {:.2}%, allocated: {}, deallocated: {} }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.hit_rate() * 100.0,
            self.blocks_allocated,
            self.blocks_deallocated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.cache_hits.load(Ordering::Relaxed), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = CacheStats::new();
        stats.cache_hits.fetch_add(7, Ordering::Relaxed);
        stats.cache_misses.fetch_add(3, Ordering::Relaxed);
        stats.blocks_allocated.fetch_add(5, Ordering::Relaxed);
        stats.blocks_deallocated.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 7);
        assert_eq!(snapshot.hit_rate(), 0.7);
        assert_eq!(snapshot.net_allocated(), 3);
    }

    #[test]
    fn test_stats_reset() {
        let stats = CacheStats::new();
        stats.cache_hits.fetch_add(100, Ordering::Relaxed);
        stats.blocks_written.fetch_add(4, Ordering::Relaxed);

        stats.reset();

        assert_eq!(stats.snapshot().cache_hits, 0);
        assert_eq!(stats.snapshot().blocks_written, 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = CacheStats::new();
        stats.cache_hits.fetch_add(80, Ordering::Relaxed);
        stats.cache_misses.fetch_add(20, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());
        assert!(display.contains("hits: 80"));
        assert!(display.contains("80.00%"));
    }
}
