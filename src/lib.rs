//! # ShardKV - A Concurrent Keyspace Engine
//!
//! ShardKV is the storage core of a Redis-compatible server: sharded key-value
//! storage, per-key locking, sorted sets with rank queries and TTL expiry
//! driven by a timer wheel. Protocol parsing and networking live elsewhere;
//! this crate exposes typed methods.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               Keyspace                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │  KeyLocks   │    │              ShardedStore<Value>             │    │
//! │  │  (stripes)  │───>│  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  └─────────────┘    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │    │
//! │        ▲            │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │    │
//! │        │            │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │        │            └──────────────────────────────────────────────┘    │
//! │        │                       ▲                       │                │
//! │        │                       │ delete when due       │ sorted sets    │
//! │  ┌─────┴───────────────────────┴─────┐         ┌───────▼──────────┐     │
//! │  │        ExpirationService          │         │    SortedSet     │     │
//! │  │  TTL store  +  TimerWheel task    │         │ HashMap+SkipList │     │
//! │  └───────────────────────────────────┘         └──────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use shardkv::keyspace::{ExpireCondition, Keyspace, Ttl};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shardkv::EngineError> {
//!     let keyspace = Keyspace::new();
//!     // Active expiry needs the runtime; lazy expiry works without it
//!     keyspace.start()?;
//!
//!     keyspace.set(b"session", Bytes::from("token123"))?;
//!     keyspace.expire(b"session", 3600, ExpireCondition::Always)?;
//!     assert!(matches!(keyspace.ttl(b"session")?, Ttl::Remaining(_)));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: sharded store, key lock table, key routing, TTL expiry
//! - [`zset`]: ranked skip list and the sorted-set index built on it
//! - [`timer`]: timer wheel for delayed one-shot callbacks
//! - [`keyspace`]: typed string, key and sorted-set commands
//! - [`config`]: shard counts, timer geometry, skip list depth
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! Store shards and lock stripes are independent `RwLock`s addressed by a
//! salted FNV-1a hash. Multi-key commands acquire stripes in ascending order,
//! so no two commands can deadlock on each other.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: every command checks the TTL of the keys it touches
//! 2. **Active**: a timer wheel task per key removes it when the TTL passes
//!
//! This ensures memory is reclaimed even for keys that are never accessed again.

pub mod config;
pub mod error;
pub mod keyspace;
pub mod storage;
pub mod timer;
pub mod zset;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use keyspace::{KeyType, Keyspace, Value};
pub use storage::{ExpirationService, KeyLocks, ShardedStore};
pub use timer::TimerWheel;
pub use zset::{ScoreBoundary, ScoreRange, ScoredMember, SkipList, SortedSet};

/// Version of ShardKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
