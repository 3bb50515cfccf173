//! Key Lock Table
//!
//! A fixed array of read-write locks addressed by key hash. Command-level code
//! takes the stripe of every key it touches before reading or writing the
//! store, which turns "read, modify, write back" sequences into critical
//! sections.
//!
//! The stripe array is independent of the store's shards and usually larger
//! (twice the shard count by default), so holding a key lock does not stall
//! unrelated keys that happen to share a store shard.
//!
//! ## Multi-key locking
//!
//! ```text
//!   keys ──route──> stripe indices ──dedup + sort──> acquire in ascending order
//! ```
//!
//! Every multi-key acquisition walks stripes in the same global order, so two
//! callers can never wait on each other in a cycle. All keys are routed before
//! the first lock is taken; a routing failure leaves nothing held.
//!
//! Unlock is the guard's `Drop`. A guard cannot be leaked on an early return,
//! so every acquisition is released on every path.

use crate::config::clamp_shards;
use crate::error::Result;
use crate::storage::router::KeyRouter;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeSet;

/// Exclusive hold on one key's stripe. Dropping it unlocks.
pub type KeyWriteGuard<'a> = RwLockWriteGuard<'a, ()>;

/// Shared hold on one key's stripe. Dropping it unlocks.
pub type KeyReadGuard<'a> = RwLockReadGuard<'a, ()>;

/// Exclusive hold on the stripes of several keys.
///
/// Guards are kept in ascending stripe order and released in that order.
#[derive(Debug)]
pub struct MultiWriteGuard<'a> {
    stripes: Vec<usize>,
    _guards: Vec<KeyWriteGuard<'a>>,
}

impl MultiWriteGuard<'_> {
    /// Stripe indices held, ascending.
    pub fn stripes(&self) -> &[usize] {
        &self.stripes
    }
}

/// Shared hold on the stripes of several keys.
#[derive(Debug)]
pub struct MultiReadGuard<'a> {
    stripes: Vec<usize>,
    _guards: Vec<KeyReadGuard<'a>>,
}

impl MultiReadGuard<'_> {
    /// Stripe indices held, ascending.
    pub fn stripes(&self) -> &[usize] {
        &self.stripes
    }
}

/// Striped lock table keyed by hash.
pub struct KeyLocks {
    locks: Vec<RwLock<()>>,
    router: KeyRouter,
}

impl std::fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLocks")
            .field("stripes", &self.locks.len())
            .finish()
    }
}

impl KeyLocks {
    /// Creates a table of `size` stripes, clamped to `[1, MAX_SHARDS]`.
    pub fn new(size: usize) -> Self {
        let size = clamp_shards(size);
        Self {
            locks: (0..size).map(|_| RwLock::new(())).collect(),
            router: KeyRouter::new(size),
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.locks.len()
    }

    /// Stripe addressed by `key`.
    #[inline]
    pub fn stripe(&self, key: &[u8]) -> Result<usize> {
        self.router.route(key)
    }

    /// Takes the write lock of `key`'s stripe.
    pub fn lock(&self, key: &[u8]) -> Result<KeyWriteGuard<'_>> {
        let pos = self.stripe(key)?;
        Ok(self.locks[pos].write())
    }

    /// Takes the read lock of `key`'s stripe.
    pub fn rlock(&self, key: &[u8]) -> Result<KeyReadGuard<'_>> {
        let pos = self.stripe(key)?;
        Ok(self.locks[pos].read())
    }

    /// Deduplicated, ascending stripe indices for `keys`.
    ///
    /// Fails if any key cannot be routed.
    pub fn sorted_stripes<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<usize>> {
        let stripes = keys
            .iter()
            .map(|key| self.stripe(key.as_ref()))
            .collect::<Result<BTreeSet<usize>>>()?;
        Ok(stripes.into_iter().collect())
    }

    /// Write-locks the stripes of all `keys` in ascending stripe order.
    pub fn lock_multi<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<MultiWriteGuard<'_>> {
        let stripes = self.sorted_stripes(keys)?;
        let guards = stripes.iter().map(|&pos| self.locks[pos].write()).collect();
        Ok(MultiWriteGuard {
            stripes,
            _guards: guards,
        })
    }

    /// Read-locks the stripes of all `keys` in ascending stripe order.
    pub fn rlock_multi<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<MultiReadGuard<'_>> {
        let stripes = self.sorted_stripes(keys)?;
        let guards = stripes.iter().map(|&pos| self.locks[pos].read()).collect();
        Ok(MultiReadGuard {
            stripes,
            _guards: guards,
        })
    }

    /// Whether `key`'s stripe is currently held in any mode.
    pub fn is_locked(&self, key: &[u8]) -> Result<bool> {
        let pos = self.stripe(key)?;
        Ok(self.locks[pos].is_locked())
    }
}
