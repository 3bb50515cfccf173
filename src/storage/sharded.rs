//! Sharded Key-Value Store
//!
//! A hash-partitioned map from key to an arbitrary value. Each shard is an
//! independent `HashMap` behind its own read-write lock, so operations on keys in
//! different shards never contend.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShardedStore<V>                         │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads take the shard's read lock, mutations its write lock. The key counter
//! is updated under the shard lock but is not globally atomic, and [`keys`]
//! visits the shards one at a time. Both are weakly consistent under concurrent
//! writers.
//!
//! [`keys`]: ShardedStore::keys

use crate::config::clamp_shards;
use crate::error::Result;
use crate::storage::router::KeyRouter;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A single shard containing a portion of the keyspace.
#[derive(Debug)]
struct Shard<V> {
    data: RwLock<HashMap<Bytes, V>>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

/// Hash-partitioned concurrent map.
///
/// Values are returned by clone, so large values are usually stored behind an
/// `Arc`.
///
/// # Example
///
/// ```
/// use shardkv::storage::ShardedStore;
/// use bytes::Bytes;
///
/// let store: ShardedStore<Bytes> = ShardedStore::new(16);
/// assert!(store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap());
/// assert_eq!(store.get(b"name").unwrap(), Some(Bytes::from("Ariz")));
/// assert!(store.delete(b"name").unwrap());
/// ```
pub struct ShardedStore<V> {
    shards: Vec<Shard<V>>,
    router: KeyRouter,
    /// Approximate number of keys
    count: AtomicUsize,
}

impl<V> std::fmt::Debug for ShardedStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shards", &self.shards.len())
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V: Clone> ShardedStore<V> {
    /// Creates a store with `shard_count` shards, clamped to `[1, MAX_SHARDS]`.
    pub fn new(shard_count: usize) -> Self {
        let shard_count = clamp_shards(shard_count);
        let shards = (0..shard_count).map(|_| Shard::new()).collect();

        Self {
            shards,
            router: KeyRouter::new(shard_count),
            count: AtomicUsize::new(0),
        }
    }

    /// Number of shards. Fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `key`.
    #[inline]
    pub fn shard_index(&self, key: &[u8]) -> Result<usize> {
        self.router.route(key)
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> Result<&Shard<V>> {
        Ok(&self.shards[self.shard_index(key)?])
    }

    /// Inserts or overwrites a value.
    ///
    /// Returns `true` if the key was newly inserted.
    pub fn set(&self, key: Bytes, value: V) -> Result<bool> {
        let shard = self.shard(&key)?;
        let mut data = shard.data.write();

        let is_new = data.insert(key, value).is_none();
        if is_new {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(is_new)
    }

    /// Overwrites the value only if the key already exists.
    pub fn set_if_exist(&self, key: Bytes, value: V) -> Result<bool> {
        let shard = self.shard(&key)?;
        let mut data = shard.data.write();

        match data.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Inserts the value only if the key is absent.
    pub fn set_if_not_exist(&self, key: Bytes, value: V) -> Result<bool> {
        let shard = self.shard(&key)?;
        let mut data = shard.data.write();

        if data.contains_key(&key) {
            return Ok(false);
        }
        data.insert(key, value);
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<V>> {
        let shard = self.shard(key)?;
        let data = shard.data.read();
        Ok(data.get(key).cloned())
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        let shard = self.shard(key)?;
        Ok(shard.data.read().contains_key(key))
    }

    /// Removes a key.
    ///
    /// Returns `true` if the key was present.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let shard = self.shard(key)?;
        let mut data = shard.data.write();

        if data.remove(key).is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Removes a key and returns its value.
    pub fn take(&self, key: &[u8]) -> Result<Option<V>> {
        let shard = self.shard(key)?;
        let mut data = shard.data.write();

        let removed = data.remove(key);
        if removed.is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Replaces every shard with an empty one and resets the counter.
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut data = shard.data.write();
            *data = HashMap::new();
        }
        self.count.store(0, Ordering::Relaxed);
    }

    /// Collects every key, one shard at a time.
    ///
    /// Not a consistent snapshot: writers may run between two shards.
    pub fn keys(&self) -> Vec<Bytes> {
        let mut keys = Vec::with_capacity(self.len());
        for shard in &self.shards {
            let data = shard.data.read();
            keys.extend(data.keys().cloned());
        }
        keys
    }

    /// Approximate number of keys.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
