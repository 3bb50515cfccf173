//! Key-level commands.

use super::{KeyType, Keyspace};
use crate::error::{EngineError, Result};
use crate::storage::{now_millis, GlobPattern};
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Condition attached to `EXPIRE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpireCondition {
    /// Always set the TTL
    #[default]
    Always,
    /// Only when the key has no TTL
    Nx,
    /// Only when the key already has a TTL
    Xx,
    /// Only when the new deadline is later than the current one
    Gt,
    /// Only when the new deadline is earlier than the current one
    Lt,
}

impl ExpireCondition {
    /// A key without a TTL counts as expiring never: `GT` never applies to it
    /// and `LT` always does.
    fn allows(&self, current: Option<u64>, new_deadline: u64) -> bool {
        match (self, current) {
            (ExpireCondition::Always, _) => true,
            (ExpireCondition::Nx, current) => current.is_none(),
            (ExpireCondition::Xx, current) => current.is_some(),
            (ExpireCondition::Gt, Some(at)) => new_deadline > at,
            (ExpireCondition::Gt, None) => false,
            (ExpireCondition::Lt, Some(at)) => new_deadline < at,
            (ExpireCondition::Lt, None) => true,
        }
    }
}

/// Result of `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist
    Missing,
    /// The key exists without a TTL
    Persistent,
    Remaining(Duration),
}

impl Ttl {
    /// Integer reply of `TTL`: `-2`, `-1` or whole seconds left.
    pub fn as_secs(&self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::Persistent => -1,
            Ttl::Remaining(left) => left.as_secs() as i64,
        }
    }
}

impl Keyspace {
    /// Deletes keys, returning how many existed.
    pub fn del<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<usize> {
        let mut deleted = 0;
        for key in keys {
            let key = key.as_ref();
            let _guard = self.locks.lock(key)?;
            if self.remove_key(key)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Counts how many of `keys` exist. Repeated keys count each time.
    pub fn exists<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<usize> {
        let mut found = 0;
        for key in keys {
            let key = key.as_ref();
            if !self.expiry.check_ttl(key)? {
                continue;
            }
            let _guard = self.locks.rlock(key)?;
            if self.data.contains_key(key)? {
                found += 1;
            }
        }
        Ok(found)
    }

    /// Live keys matching a glob `pattern`.
    ///
    /// Works on a snapshot of the key set; keys written concurrently may or may
    /// not be included.
    pub fn keys(&self, pattern: &[u8]) -> Result<Vec<Bytes>> {
        let pattern = GlobPattern::new(pattern);
        let mut matched = Vec::new();
        for key in self.data.keys() {
            if self.expiry.check_ttl(&key)? && (pattern.matches_all() || pattern.matches(&key)) {
                matched.push(key);
            }
        }
        Ok(matched)
    }

    /// Sets a TTL of `seconds` on `key` if `condition` allows it.
    ///
    /// Returns `false` when the key does not exist or the condition rejects the
    /// new deadline.
    pub fn expire(&self, key: &[u8], seconds: u64, condition: ExpireCondition) -> Result<bool> {
        self.expire_millis(key, seconds.saturating_mul(1000), condition)
    }

    /// Millisecond variant of [`expire`](Self::expire).
    pub fn expire_millis(&self, key: &[u8], millis: u64, condition: ExpireCondition) -> Result<bool> {
        if !self.expiry.check_ttl(key)? {
            return Ok(false);
        }
        let _guard = self.locks.lock(key)?;
        if !self.data.contains_key(key)? {
            return Ok(false);
        }

        let deadline = now_millis().saturating_add(millis);
        let current = self.expiry.expires_at(key)?;
        if !condition.allows(current, deadline) {
            debug!(?condition, "expire condition not met");
            return Ok(false);
        }
        self.expiry.expire_at(key, deadline)
    }

    /// Removes the TTL of `key`. Returns whether it had one.
    pub fn persist(&self, key: &[u8]) -> Result<bool> {
        if !self.expiry.check_ttl(key)? {
            return Ok(false);
        }
        let _guard = self.locks.lock(key)?;
        self.expiry.del_ttl(key)
    }

    pub fn ttl(&self, key: &[u8]) -> Result<Ttl> {
        if !self.expiry.check_ttl(key)? {
            return Ok(Ttl::Missing);
        }
        let _guard = self.locks.rlock(key)?;
        if !self.data.contains_key(key)? {
            return Ok(Ttl::Missing);
        }
        Ok(match self.expiry.remaining(key)? {
            Some(left) => Ttl::Remaining(left),
            None => Ttl::Persistent,
        })
    }

    /// Kind of value at `key`, or `None` if absent.
    pub fn key_type(&self, key: &[u8]) -> Result<Option<KeyType>> {
        if !self.expiry.check_ttl(key)? {
            return Ok(None);
        }
        let _guard = self.locks.rlock(key)?;
        Ok(self.data.get(key)?.map(|value| value.key_type()))
    }

    /// Moves the value at `from` to `to`, replacing whatever `to` held.
    ///
    /// The TTL of `from`, if any, moves with it; a TTL on the old `to` is
    /// dropped. Fails with [`EngineError::KeyNotFound`] if `from` is absent.
    pub fn rename(&self, from: &[u8], to: &[u8]) -> Result<()> {
        if !self.expiry.check_ttl(from)? {
            return Err(EngineError::KeyNotFound);
        }
        self.expiry.check_ttl(to)?;

        let _guard = self.locks.lock_multi(&[from, to])?;
        let Some(value) = self.data.get(from)? else {
            return Err(EngineError::KeyNotFound);
        };
        if from == to {
            return Ok(());
        }

        let deadline = self.expiry.expires_at(from)?;
        self.remove_key(from)?;
        self.remove_key(to)?;
        self.data.set(Bytes::copy_from_slice(to), value)?;
        if let Some(at) = deadline {
            self.expiry.expire_at(to, at)?;
        }
        Ok(())
    }
}
