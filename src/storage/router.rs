//! Key routing.
//!
//! Both the sharded store and the key lock table map a key to a slot with the
//! same hash: FNV-1a over the key followed by a fixed salt. The salt makes it a
//! little harder to craft keys that all land in one shard.

use crate::error::{EngineError, Result};
use fnv::FnvHasher;
use std::hash::Hasher;
use tracing::error;

/// Appended to every key before hashing.
const HASH_SALT: &[u8] = b"@#&";

/// Hashes a key with the salted FNV-1a function.
#[inline]
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.write(HASH_SALT);
    hasher.finish()
}

/// Maps keys to an index in `[0, modulus)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRouter {
    modulus: usize,
}

impl KeyRouter {
    pub fn new(modulus: usize) -> Self {
        Self { modulus }
    }

    /// Number of slots this router addresses.
    #[inline]
    pub fn modulus(&self) -> usize {
        self.modulus
    }

    /// Returns the slot for `key`.
    ///
    /// Fails with [`EngineError::Routing`] when no slot can be selected.
    #[inline]
    pub fn route(&self, key: &[u8]) -> Result<usize> {
        match hash_key(key).checked_rem(self.modulus as u64) {
            Some(index) => Ok(index as usize),
            None => {
                error!(key = ?String::from_utf8_lossy(key), modulus = self.modulus, "key routing failed");
                Err(EngineError::routing(key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_is_stable_and_bounded() {
        let router = KeyRouter::new(64);
        for i in 0..1000 {
            let key = format!("key:{}", i);
            let first = router.route(key.as_bytes()).unwrap();
            assert!(first < 64);
            assert_eq!(router.route(key.as_bytes()).unwrap(), first);
        }
    }

    #[test]
    fn test_salt_changes_hash() {
        let mut plain = FnvHasher::default();
        plain.write(b"user:1");
        assert_ne!(plain.finish(), hash_key(b"user:1"));
    }

    #[test]
    fn test_zero_modulus_is_routing_error() {
        let router = KeyRouter::new(0);
        assert!(matches!(
            router.route(b"anything"),
            Err(EngineError::Routing { .. })
        ));
    }

    #[test]
    fn test_keys_spread_across_slots() {
        let router = KeyRouter::new(16);
        let mut seen = [false; 16];
        for i in 0..1000 {
            seen[router.route(format!("k{}", i).as_bytes()).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
