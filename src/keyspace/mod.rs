//! Keyspace
//!
//! The typed command surface over the storage engine. A [`Keyspace`] owns the
//! data store, the key lock table and the expiration service, and every method
//! follows the same protocol:
//!
//! 1. `check_ttl` every key the command touches (lazy expiry, no lock held)
//! 2. take the key lock(s) in the right mode
//! 3. read or modify the store, keeping TTL records in step
//!
//! Methods are split by value kind:
//!
//! - [`keys`]: `DEL`, `EXISTS`, `KEYS`, `EXPIRE`, `PERSIST`, `TTL`, `TYPE`, `RENAME`
//! - [`strings`]: `SET`, `SETEX`, `SETNX`, `GET`
//! - [`zset`]: the `Z*` sorted-set commands
//!
//! ## Example
//!
//! ```
//! use shardkv::keyspace::{Keyspace, ZAddOptions};
//! use bytes::Bytes;
//!
//! let keyspace = Keyspace::new();
//! keyspace
//!     .zadd(b"board", &[(10.0, Bytes::from("ann")), (20.0, Bytes::from("bob"))], ZAddOptions::default())
//!     .unwrap();
//!
//! assert_eq!(keyspace.zrank(b"board", b"bob").unwrap(), Some(1));
//! assert_eq!(keyspace.zcard(b"board").unwrap(), 2);
//! ```

pub mod keys;
pub mod strings;
pub mod zset;

pub use keys::{ExpireCondition, Ttl};
pub use zset::{Aggregate, Limit, ZAddOptions};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::storage::{ExpirationService, KeyLocks, ShardedStore};
use crate::zset::SortedSet;
use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// The kind of value stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    String,
    SortedSet,
}

impl KeyType {
    /// Name reported by `TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::SortedSet => "zset",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value.
///
/// Sorted sets are shared behind an `Arc` so a store lookup does not copy the
/// whole set. The inner lock is uncontended for writers, who already hold the
/// key's write lock.
#[derive(Debug, Clone)]
pub enum Value {
    String(Bytes),
    SortedSet(Arc<RwLock<SortedSet>>),
}

impl Value {
    pub fn key_type(&self) -> KeyType {
        match self {
            Value::String(_) => KeyType::String,
            Value::SortedSet(_) => KeyType::SortedSet,
        }
    }

    fn sorted_set(set: SortedSet) -> Self {
        Value::SortedSet(Arc::new(RwLock::new(set)))
    }
}

/// A concurrent keyspace of strings and sorted sets with TTL support.
pub struct Keyspace {
    config: EngineConfig,
    data: Arc<ShardedStore<Value>>,
    locks: Arc<KeyLocks>,
    expiry: ExpirationService<Value>,
}

impl fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyspace")
            .field("keys", &self.data.len())
            .field("shards", &self.data.shard_count())
            .field("lock_stripes", &self.locks.stripe_count())
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyspace {
    /// Creates a keyspace with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let config = config.normalized();
        let data = Arc::new(ShardedStore::new(config.shard_count));
        let locks = Arc::new(KeyLocks::new(config.lock_stripes));
        let expiry = ExpirationService::new(Arc::clone(&data), Arc::clone(&locks), &config);

        Self {
            config,
            data,
            locks,
            expiry,
        }
    }

    /// Starts active expiry. Without it, expired keys are only removed when
    /// touched.
    pub fn start(&self) -> Result<()> {
        self.expiry.start()?;
        info!(
            shards = self.config.shard_count,
            lock_stripes = self.config.lock_stripes,
            "Keyspace started"
        );
        Ok(())
    }

    pub fn stop(&self) {
        self.expiry.stop();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The key lock table, for callers composing their own critical sections.
    pub fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    pub fn expiry(&self) -> &ExpirationService<Value> {
        &self.expiry
    }

    /// Number of keys, including expired keys not yet removed.
    pub fn dbsize(&self) -> usize {
        self.data.len()
    }

    /// Removes every key and TTL.
    pub fn flush(&self) {
        self.data.clear();
        self.expiry.clear();
        info!("Keyspace flushed");
    }

    /// Sorted set stored at `key`. The caller holds the key's lock.
    fn sorted_set(&self, key: &[u8]) -> Result<Option<Arc<RwLock<SortedSet>>>> {
        match self.data.get(key)? {
            Some(Value::SortedSet(set)) => Ok(Some(set)),
            Some(Value::String(_)) => Err(EngineError::WrongType),
            None => Ok(None),
        }
    }

    fn new_sorted_set(&self) -> SortedSet {
        SortedSet::with_max_level(self.config.skiplist_max_level)
    }

    /// Deletes `key` and its TTL. The caller holds the key's write lock.
    fn remove_key(&self, key: &[u8]) -> Result<bool> {
        self.expiry.del_ttl(key)?;
        self.data.delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_names() {
        assert_eq!(KeyType::String.to_string(), "string");
        assert_eq!(KeyType::SortedSet.as_str(), "zset");
        assert_eq!(Value::String(Bytes::from("v")).key_type(), KeyType::String);
        assert_eq!(Value::sorted_set(SortedSet::new()).key_type(), KeyType::SortedSet);
    }

    #[test]
    fn test_flush_and_dbsize() {
        let keyspace = Keyspace::with_config(EngineConfig::default().with_shards(4));
        keyspace.set(b"a", Bytes::from("1")).unwrap();
        keyspace.set(b"b", Bytes::from("2")).unwrap();
        keyspace.expire(b"a", 60, ExpireCondition::Always).unwrap();
        assert_eq!(keyspace.dbsize(), 2);
        assert_eq!(keyspace.expiry().len(), 1);

        keyspace.flush();
        assert_eq!(keyspace.dbsize(), 0);
        assert!(keyspace.expiry().is_empty());
    }

    #[test]
    fn test_config_is_normalized() {
        let keyspace = Keyspace::with_config(EngineConfig::default().with_shards(0));
        assert_eq!(keyspace.config().shard_count, 1);
        assert_eq!(keyspace.locks().stripe_count(), 1);
    }
}
