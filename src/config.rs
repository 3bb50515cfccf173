//! Engine configuration.
//!
//! Shard and stripe counts are fixed for the lifetime of the structures built
//! from a config. Out-of-range values are clamped rather than rejected.

use std::time::Duration;

/// Upper bound for shard and lock stripe counts.
pub const MAX_SHARDS: usize = 65_536;

/// Default number of store shards.
pub const DEFAULT_SHARD_COUNT: usize = 64;

/// Default timer wheel tick.
pub const DEFAULT_TIMER_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of timer wheel slots (one hour at the default tick).
pub const DEFAULT_TIMER_SLOTS: usize = 3600;

/// Largest skip list level count.
pub const SKIPLIST_MAX_LEVEL: usize = 64;

/// Smallest configurable skip list level count.
pub const SKIPLIST_MIN_LEVEL: usize = 16;

/// Configuration for a [`Keyspace`](crate::keyspace::Keyspace) and its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of shards in each store (default: 64)
    pub shard_count: usize,

    /// Number of key lock stripes (default: twice the shard count)
    pub lock_stripes: usize,

    /// Timer wheel tick (default: 100ms)
    pub timer_interval: Duration,

    /// Timer wheel slot count (default: 3600)
    pub timer_slots: usize,

    /// Maximum skip list level for new sorted sets (default: 64)
    pub skiplist_max_level: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            lock_stripes: DEFAULT_SHARD_COUNT * 2,
            timer_interval: DEFAULT_TIMER_INTERVAL,
            timer_slots: DEFAULT_TIMER_SLOTS,
            skiplist_max_level: SKIPLIST_MAX_LEVEL,
        }
    }
}

impl EngineConfig {
    /// Sets the shard count and keeps lock stripes at twice that number.
    pub fn with_shards(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self.lock_stripes = shard_count.saturating_mul(2);
        self
    }

    pub fn with_lock_stripes(mut self, lock_stripes: usize) -> Self {
        self.lock_stripes = lock_stripes;
        self
    }

    pub fn with_timer(mut self, interval: Duration, slots: usize) -> Self {
        self.timer_interval = interval;
        self.timer_slots = slots;
        self
    }

    pub fn with_skiplist_max_level(mut self, level: usize) -> Self {
        self.skiplist_max_level = level;
        self
    }

    /// Returns a copy with every field clamped into its valid range.
    pub fn normalized(&self) -> Self {
        Self {
            shard_count: clamp_shards(self.shard_count),
            lock_stripes: clamp_shards(self.lock_stripes),
            timer_interval: self.timer_interval.max(Duration::from_millis(1)),
            timer_slots: self.timer_slots.max(1),
            skiplist_max_level: clamp_level(self.skiplist_max_level),
        }
    }
}

/// Clamps a shard or stripe count into `[1, MAX_SHARDS]`.
#[inline]
pub fn clamp_shards(count: usize) -> usize {
    count.clamp(1, MAX_SHARDS)
}

/// Clamps a skip list level count into `[SKIPLIST_MIN_LEVEL, SKIPLIST_MAX_LEVEL]`.
#[inline]
pub fn clamp_level(level: usize) -> usize {
    level.clamp(SKIPLIST_MIN_LEVEL, SKIPLIST_MAX_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.shard_count, 64);
        assert_eq!(config.lock_stripes, 128);
        assert_eq!(config.timer_interval, Duration::from_millis(100));
        assert_eq!(config.timer_slots, 3600);
        assert_eq!(config.skiplist_max_level, 64);
    }

    #[test]
    fn test_normalized_clamps() {
        let config = EngineConfig::default()
            .with_shards(0)
            .with_timer(Duration::ZERO, 0)
            .with_skiplist_max_level(3)
            .normalized();

        assert_eq!(config.shard_count, 1);
        assert_eq!(config.lock_stripes, 1);
        assert_eq!(config.timer_interval, Duration::from_millis(1));
        assert_eq!(config.timer_slots, 1);
        assert_eq!(config.skiplist_max_level, SKIPLIST_MIN_LEVEL);

        let config = EngineConfig::default()
            .with_shards(usize::MAX)
            .with_skiplist_max_level(1000)
            .normalized();
        assert_eq!(config.shard_count, MAX_SHARDS);
        assert_eq!(config.lock_stripes, MAX_SHARDS);
        assert_eq!(config.skiplist_max_level, SKIPLIST_MAX_LEVEL);
    }
}
