//! Sorted Set Module
//!
//! The ordered index behind sorted-set values.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  SortedSet                   │
//! │  ┌──────────────────┐   ┌─────────────────┐  │
//! │  │ member -> NodeId │──>│ SkipList<Bytes> │  │
//! │  │    (HashMap)     │   │ score + rank    │  │
//! │  └──────────────────┘   └─────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! - [`SkipList`]: arena-backed skip list with span counters for rank queries
//! - [`SortedSet`]: unique members, score lookup, rank and range queries
//! - [`ScoreRange`]: open, closed or unbounded score intervals

pub mod range;
pub mod skiplist;
pub mod sorted_set;

pub use range::{ScoreBoundary, ScoreRange};
pub use skiplist::{NodeId, SkipList, UpdatePath};
pub use sorted_set::{ScoredMember, SortedSet};
