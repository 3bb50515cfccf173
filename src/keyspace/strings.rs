//! String commands.

use super::{Keyspace, Value};
use crate::error::{EngineError, Result};
use bytes::Bytes;

impl Keyspace {
    /// Stores a string at `key`, clearing any TTL.
    ///
    /// Fails with [`EngineError::WrongType`] if `key` holds a sorted set.
    pub fn set(&self, key: &[u8], value: Bytes) -> Result<()> {
        self.expiry.check_ttl(key)?;
        let _guard = self.locks.lock(key)?;
        self.put_string(key, value)
    }

    /// Stores a string that expires after `seconds`.
    pub fn set_ex(&self, key: &[u8], value: Bytes, seconds: u64) -> Result<()> {
        self.expiry.check_ttl(key)?;
        let _guard = self.locks.lock(key)?;
        self.put_string(key, value)?;
        self.expiry.set_ttl(key, seconds)?;
        Ok(())
    }

    /// Stores a string only if `key` does not exist. Returns whether it was set.
    pub fn set_nx(&self, key: &[u8], value: Bytes) -> Result<bool> {
        self.expiry.check_ttl(key)?;
        let _guard = self.locks.lock(key)?;
        self.data
            .set_if_not_exist(Bytes::copy_from_slice(key), Value::String(value))
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.expiry.check_ttl(key)?;
        let _guard = self.locks.rlock(key)?;
        match self.data.get(key)? {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(Value::SortedSet(_)) => Err(EngineError::WrongType),
            None => Ok(None),
        }
    }

    /// The caller holds the key's write lock.
    fn put_string(&self, key: &[u8], value: Bytes) -> Result<()> {
        if let Some(Value::SortedSet(_)) = self.data.get(key)? {
            return Err(EngineError::WrongType);
        }
        self.data.set(Bytes::copy_from_slice(key), Value::String(value))?;
        self.expiry.del_ttl(key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::keyspace::{ExpireCondition, Ttl, ZAddOptions};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn keyspace() -> Keyspace {
        Keyspace::with_config(EngineConfig::default().with_shards(8))
    }

    #[test]
    fn test_set_get() {
        let ks = keyspace();
        assert_eq!(ks.get(b"name").unwrap(), None);
        ks.set(b"name", Bytes::from("Ariz")).unwrap();
        assert_eq!(ks.get(b"name").unwrap(), Some(Bytes::from("Ariz")));
        ks.set(b"name", Bytes::from("Other")).unwrap();
        assert_eq!(ks.get(b"name").unwrap(), Some(Bytes::from("Other")));
    }

    #[test]
    fn test_set_clears_ttl() {
        let ks = keyspace();
        ks.set(b"k", Bytes::from("v")).unwrap();
        ks.expire(b"k", 100, ExpireCondition::Always).unwrap();
        ks.set(b"k", Bytes::from("v2")).unwrap();
        assert_eq!(ks.ttl(b"k").unwrap(), Ttl::Persistent);
    }

    #[test]
    fn test_set_ex_expires() {
        let ks = keyspace();
        ks.set_ex(b"k", Bytes::from("v"), 100).unwrap();
        assert!(matches!(ks.ttl(b"k").unwrap(), Ttl::Remaining(_)));

        ks.set(b"short", Bytes::from("v")).unwrap();
        ks.expire_millis(b"short", 10, ExpireCondition::Always).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ks.get(b"short").unwrap(), None);
    }

    #[test]
    fn test_overwrites_without_ttl_leave_wheel_idle() {
        let ks = keyspace();
        for i in 0..10_000 {
            ks.set(b"k", Bytes::from(format!("{}", i))).unwrap();
        }
        assert_eq!(ks.dbsize(), 1);
        assert_eq!(ks.expiry().queued_commands(), 0);

        ks.set_ex(b"k", Bytes::from("v"), 100).unwrap();
        ks.set(b"k", Bytes::from("v")).unwrap();
        ks.set(b"k", Bytes::from("v")).unwrap();
        // The add from set_ex and one cancel when the first set clears it
        assert_eq!(ks.expiry().queued_commands(), 2);
    }

    #[test]
    fn test_set_nx() {
        let ks = keyspace();
        assert!(ks.set_nx(b"k", Bytes::from("first")).unwrap());
        assert!(!ks.set_nx(b"k", Bytes::from("second")).unwrap());
        assert_eq!(ks.get(b"k").unwrap(), Some(Bytes::from("first")));
    }

    #[test]
    fn test_wrong_type() {
        let ks = keyspace();
        ks.zadd(b"z", &[(1.0, Bytes::from("m"))], ZAddOptions::default())
            .unwrap();
        assert_eq!(ks.get(b"z"), Err(EngineError::WrongType));
        assert_eq!(ks.set(b"z", Bytes::from("v")), Err(EngineError::WrongType));
        assert!(!ks.locks().is_locked(b"z").unwrap());
    }

    #[test]
    fn test_concurrent_writers_on_distinct_keys() {
        let ks = Arc::new(keyspace());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ks = Arc::clone(&ks);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("t{}:k{}", t, i);
                        ks.set(key.as_bytes(), Bytes::from(format!("{}", i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ks.dbsize(), 4000);
        assert_eq!(ks.get(b"t3:k42").unwrap(), Some(Bytes::from("42")));
    }
}
