//! Expiration Service
//!
//! Binds key TTLs to timer wheel tasks. Two paths remove an expired key:
//!
//! - **Active expiry**: every TTL record has a wheel task under the same key.
//!   When it fires, the task takes the key's write lock, re-checks the record
//!   and deletes the key if it is still due.
//! - **Lazy expiry**: [`check_ttl`](ExpirationService::check_ttl) runs before a
//!   key is read or written. An expired key is deleted on the spot.
//!
//! ```text
//!   set_ttl ──> TTL store (key -> unix ms) ──┐
//!          └──> TimerWheel task(key) ────────┼──> lock(key) -> delete key + record
//!   check_ttl (record due?) ─────────────────┘
//! ```
//!
//! A TTL record exists exactly when a wheel task is scheduled for the key;
//! every path that removes one removes the other.
//!
//! ## Locking contract
//!
//! `check_ttl` takes the key's write lock itself. Calling it while already
//! holding that key's lock deadlocks. `set_ttl` and `del_ttl` take no lock and
//! are meant to be called by code that holds it.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::storage::{KeyLocks, ShardedStore};
use crate::timer::TimerWheel;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// State shared with fired wheel callbacks.
///
/// The wheel itself stays outside so that callbacks, which the wheel owns,
/// never keep it alive.
struct ExpiryState<V> {
    data: Arc<ShardedStore<V>>,
    ttl: ShardedStore<u64>,
    locks: Arc<KeyLocks>,
}

impl<V: Clone> ExpiryState<V> {
    fn is_due(&self, key: &[u8]) -> Result<bool> {
        Ok(matches!(self.ttl.get(key)?, Some(at) if at <= now_millis()))
    }

    /// Deletes `key` and its record if the record is due.
    ///
    /// The caller holds the key's write lock.
    fn purge_if_due(&self, key: &[u8]) -> Result<bool> {
        if !self.is_due(key)? {
            return Ok(false);
        }
        self.data.delete(key)?;
        self.ttl.delete(key)?;
        Ok(true)
    }
}

/// TTL bookkeeping for one data store.
pub struct ExpirationService<V> {
    state: Arc<ExpiryState<V>>,
    wheel: TimerWheel,
}

impl<V> std::fmt::Debug for ExpirationService<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationService")
            .field("ttl_keys", &self.state.ttl.len())
            .field("wheel", &self.wheel)
            .finish()
    }
}

impl<V> ExpirationService<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a service over `data`, locking keys through `locks`.
    ///
    /// The wheel does not run until [`start`](Self::start) is called; until
    /// then only lazy expiry removes keys.
    pub fn new(data: Arc<ShardedStore<V>>, locks: Arc<KeyLocks>, config: &EngineConfig) -> Self {
        let config = config.normalized();
        Self {
            state: Arc::new(ExpiryState {
                data,
                ttl: ShardedStore::new(config.shard_count),
                locks,
            }),
            wheel: TimerWheel::new(config.timer_interval, config.timer_slots),
        }
    }

    /// Starts active expiry. Requires a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.wheel.start()?;
        info!("Expiration service started");
        Ok(())
    }

    /// Stops active expiry. Lazy expiry keeps working.
    pub fn stop(&self) {
        self.wheel.stop();
    }

    /// Expires `key` after `seconds`.
    ///
    /// Returns `false` without scheduling anything when the key does not exist.
    pub fn set_ttl(&self, key: &[u8], seconds: u64) -> Result<bool> {
        self.set_ttl_millis(key, seconds.saturating_mul(1000))
    }

    /// Expires `key` after `millis` milliseconds.
    pub fn set_ttl_millis(&self, key: &[u8], millis: u64) -> Result<bool> {
        self.expire_at(key, now_millis().saturating_add(millis))
    }

    /// Expires `key` at the absolute unix time `at_millis`, replacing any
    /// earlier deadline.
    pub fn expire_at(&self, key: &[u8], at_millis: u64) -> Result<bool> {
        if !self.state.data.contains_key(key)? {
            debug!(key = ?String::from_utf8_lossy(key), "set_ttl: key does not exist");
            return Ok(false);
        }

        let key = Bytes::copy_from_slice(key);
        self.state.ttl.set(key.clone(), at_millis)?;

        let delay = Duration::from_millis(at_millis.saturating_sub(now_millis()));
        let state = Arc::clone(&self.state);
        let task_key = key.clone();
        self.wheel.add(delay, Some(key), move || {
            let expired = state
                .locks
                .lock(&task_key)
                .and_then(|_guard| state.purge_if_due(&task_key));
            match expired {
                Ok(true) => debug!(key = ?task_key, "Expired key removed"),
                Ok(false) => trace!(key = ?task_key, "Expiry task found nothing due"),
                Err(err) => warn!(key = ?task_key, error = %err, "Expiry task failed"),
            }
        });
        Ok(true)
    }

    /// Removes the TTL of `key`. Returns whether it had one.
    ///
    /// Without a record there is no task, so nothing is sent to the wheel.
    pub fn del_ttl(&self, key: &[u8]) -> Result<bool> {
        let removed = self.state.ttl.delete(key)?;
        if removed {
            self.wheel.cancel(key);
        }
        Ok(removed)
    }

    /// Checks `key` against its TTL, deleting it if expired.
    ///
    /// Returns `true` when the key may be used: it has no TTL, the TTL has not
    /// passed, or another caller already removed it. Returns `false` when this
    /// call deleted the key.
    ///
    /// The record is checked again after taking the key's write lock, so
    /// concurrent callers on one expired key delete it exactly once.
    ///
    /// Must not be called while holding `key`'s lock.
    pub fn check_ttl(&self, key: &[u8]) -> Result<bool> {
        if !self.state.is_due(key)? {
            return Ok(true);
        }

        let _guard = self.state.locks.lock(key)?;
        if !self.state.purge_if_due(key)? {
            return Ok(true);
        }
        // Sent under the lock: a later set_ttl on this key queues after it
        self.wheel.cancel(key);
        debug!(key = ?String::from_utf8_lossy(key), "Expired key removed on access");
        Ok(false)
    }

    /// Absolute expiry of `key` in unix milliseconds.
    pub fn expires_at(&self, key: &[u8]) -> Result<Option<u64>> {
        self.state.ttl.get(key)
    }

    /// Time left before `key` expires, if it has a TTL.
    pub fn remaining(&self, key: &[u8]) -> Result<Option<Duration>> {
        Ok(self
            .expires_at(key)?
            .map(|at| Duration::from_millis(at.saturating_sub(now_millis()))))
    }

    /// Drops every TTL record and its wheel task.
    pub fn clear(&self) {
        for key in self.state.ttl.keys() {
            self.wheel.cancel(&key);
        }
        self.state.ttl.clear();
    }

    /// Number of keys with a TTL.
    pub fn len(&self) -> usize {
        self.state.ttl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.ttl.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn queued_commands(&self) -> usize {
        self.wheel.queued()
    }
}
