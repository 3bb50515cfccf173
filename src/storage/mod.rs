//! Storage Module
//!
//! Concurrent building blocks for the keyspace: the sharded store, the key
//! lock table and TTL expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShardedStore<V>                         │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...N     │            │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │            │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                                        ▲
//!        │ lock(key) first                        │ delete when due
//! ┌──────┴───────┐                      ┌─────────┴───────────┐
//! │   KeyLocks   │<─────────────────────│ ExpirationService   │
//! │ (stripes)    │                      │ TTL store + wheel   │
//! └──────────────┘                      └─────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use shardkv::storage::{KeyLocks, ShardedStore};
//! use bytes::Bytes;
//!
//! let store: ShardedStore<Bytes> = ShardedStore::new(16);
//! let locks = KeyLocks::new(32);
//!
//! {
//!     let _guard = locks.lock(b"name").unwrap();
//!     store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
//! }
//! assert_eq!(store.get(b"name").unwrap(), Some(Bytes::from("Ariz")));
//! ```

pub mod expiry;
pub mod glob;
pub mod locks;
pub mod router;
pub mod sharded;

// Re-export commonly used types
pub use expiry::{now_millis, ExpirationService};
pub use glob::GlobPattern;
pub use locks::{KeyLocks, KeyReadGuard, KeyWriteGuard, MultiReadGuard, MultiWriteGuard};
pub use router::{hash_key, KeyRouter};
pub use sharded::ShardedStore;
