//! Sorted-Set Index
//!
//! Pairs a member → node table with a [`SkipList`] so membership and score
//! lookups are `O(1)` while rank and range queries stay `O(log n)`.
//!
//! The table and the list are always mutated together: a member has an entry in
//! the table exactly when the list holds a node for it, and it never has two
//! nodes. The structure is not internally synchronized; the keyspace guards each
//! set with its key's lock.

use crate::zset::range::{ScoreBoundary, ScoreRange};
use crate::zset::skiplist::{NodeId, SkipList};
use bytes::Bytes;
use std::collections::HashMap;

/// A member together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: Bytes,
    pub score: f64,
}

/// Ordered set of unique members ranked by score.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    members: HashMap<Bytes, NodeId>,
    list: SkipList<Bytes>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set whose skip list uses at most `max_level` levels.
    pub fn with_max_level(max_level: usize) -> Self {
        Self {
            members: HashMap::new(),
            list: SkipList::with_max_level(max_level),
        }
    }

    /// Number of members.
    pub fn count(&self) -> usize {
        self.list.len()
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.members.contains_key(member)
    }

    /// Adds members or updates the scores of existing ones.
    ///
    /// Items are applied in order, so when a member appears more than once the
    /// last score wins. Returns the number of members that were newly created.
    pub fn add<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = (f64, Bytes)>,
    {
        let mut added = 0;
        for (score, member) in items {
            if self.insert(score, member) {
                added += 1;
            }
        }
        added
    }

    /// Adds one member or updates its score. Returns `true` if it was new.
    pub fn insert(&mut self, score: f64, member: Bytes) -> bool {
        debug_assert!(!score.is_nan(), "sorted set scores must not be NaN");
        match self.members.get(&member) {
            Some(&id) => {
                self.list.update_score(id, score);
                false
            }
            None => {
                let id = self.list.insert(score, member.clone());
                self.members.insert(member, id);
                true
            }
        }
    }

    /// Adds `delta` to a member's score, creating it at `delta` if absent.
    ///
    /// Returns the new score.
    pub fn incr_by(&mut self, member: Bytes, delta: f64) -> f64 {
        let score = self.score(&member).unwrap_or(0.0) + delta;
        self.insert(score, member);
        score
    }

    /// Removes members. Returns how many were present.
    pub fn remove<I, K>(&mut self, members: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut removed = 0;
        for member in members {
            if let Some(id) = self.members.remove(member.as_ref()) {
                self.list.remove(id);
                removed += 1;
            }
        }
        removed
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        let id = self.members.get(member)?;
        self.list.score(*id)
    }

    /// 0-based rank in ascending score order.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let id = self.members.get(member)?;
        self.list.rank_of(*id).map(|rank| rank - 1)
    }

    /// 0-based rank in descending score order.
    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        let id = self.members.get(member)?;
        self.list.rank_of(*id).map(|rank| self.list.len() - rank)
    }

    /// Members with 0-based rank in `[start, stop]`, ascending.
    ///
    /// Negative indices count from the end (`-1` is the last member). Out of
    /// range bounds are clamped; an empty window yields an empty result.
    pub fn range(&self, start: i64, stop: i64) -> Vec<ScoredMember> {
        match normalize_rank_range(start, stop, self.count()) {
            Some((start, stop)) => self.collect(self.list.nodes_in_rank_range(start + 1, stop + 1)),
            None => Vec::new(),
        }
    }

    /// Like [`range`](Self::range) with ranks counted from the highest score.
    pub fn rev_range(&self, start: i64, stop: i64) -> Vec<ScoredMember> {
        let len = self.count();
        match normalize_rank_range(start, stop, len) {
            Some((start, stop)) => {
                let ids = self.list.nodes_in_rank_range(len - stop, len - start);
                self.collect(ids.into_iter().rev())
            }
            None => Vec::new(),
        }
    }

    /// Members whose score lies in `range`, ascending.
    pub fn range_by_score(&self, range: &ScoreRange) -> Vec<ScoredMember> {
        self.collect(self.list.nodes_in_score_range(range))
    }

    /// Members whose score lies between `max` and `min`, descending.
    ///
    /// Arguments come high end first, as `ZREVRANGEBYSCORE` takes them.
    pub fn rev_range_by_score(&self, max: ScoreBoundary, min: ScoreBoundary) -> Vec<ScoredMember> {
        let range = ScoreRange::new(min, max);
        let ids = self.list.nodes_in_score_range(&range);
        self.collect(ids.into_iter().rev())
    }

    /// Members whose score lies in `range`, ascending, skipping the first
    /// `offset` and keeping at most `count` (all when `None`).
    ///
    /// Only the returned window is walked.
    pub fn range_by_score_limit(
        &self,
        range: &ScoreRange,
        offset: usize,
        count: Option<usize>,
    ) -> Vec<ScoredMember> {
        let Some((first, last)) = self.list.rank_bounds(range) else {
            return Vec::new();
        };
        let start = first.saturating_add(offset);
        let stop = match count {
            Some(0) => return Vec::new(),
            Some(count) => last.min(start.saturating_add(count - 1)),
            None => last,
        };
        self.collect(self.list.nodes_in_rank_range(start, stop))
    }

    /// Like [`range_by_score_limit`](Self::range_by_score_limit), highest
    /// score first.
    pub fn rev_range_by_score_limit(
        &self,
        max: ScoreBoundary,
        min: ScoreBoundary,
        offset: usize,
        count: Option<usize>,
    ) -> Vec<ScoredMember> {
        let Some((first, last)) = self.list.rank_bounds(&ScoreRange::new(min, max)) else {
            return Vec::new();
        };
        if offset > last - first {
            return Vec::new();
        }
        let stop = last - offset;
        let start = match count {
            Some(0) => return Vec::new(),
            Some(count) => first.max((stop + 1).saturating_sub(count)),
            None => first,
        };
        self.collect(self.list.nodes_in_rank_range(start, stop).into_iter().rev())
    }

    /// Number of members whose score lies in `range`.
    pub fn count_in_range(&self, range: &ScoreRange) -> usize {
        match self.list.rank_bounds(range) {
            Some((first, last)) => last + 1 - first,
            None => 0,
        }
    }

    /// Removes members with 0-based rank in `[start, stop]` (negative indices
    /// allowed). Returns the number removed.
    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> usize {
        match normalize_rank_range(start, stop, self.count()) {
            Some((start, stop)) => {
                let ids = self.list.nodes_in_rank_range(start + 1, stop + 1);
                self.delete_consecutive(ids)
            }
            None => 0,
        }
    }

    /// Removes members whose score lies in `range`. Returns the number removed.
    pub fn remove_range_by_score(&mut self, range: &ScoreRange) -> usize {
        let ids = self.list.nodes_in_score_range(range);
        self.delete_consecutive(ids)
    }

    /// Removes and returns up to `count` lowest members, lowest first.
    pub fn pop_min(&mut self, count: usize) -> Vec<ScoredMember> {
        let ids = self.list.nodes_in_rank_range(1, count);
        self.pop_consecutive(ids)
    }

    /// Removes and returns up to `count` highest members, highest first.
    pub fn pop_max(&mut self, count: usize) -> Vec<ScoredMember> {
        let len = self.count();
        if count == 0 || len == 0 {
            return Vec::new();
        }
        let ids = self.list.nodes_in_rank_range(len.saturating_sub(count) + 1, len);
        let mut popped = self.pop_consecutive(ids);
        popped.reverse();
        popped
    }

    /// Ascending iterator over `(member, score)`.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> + '_ {
        self.list.iter().map(|(_, score, member)| (member, score))
    }

    /// Snapshot of every member with its score, ascending.
    pub fn to_vec(&self) -> Vec<ScoredMember> {
        self.iter()
            .map(|(member, score)| ScoredMember {
                member: member.clone(),
                score,
            })
            .collect()
    }

    fn collect<I: IntoIterator<Item = NodeId>>(&self, ids: I) -> Vec<ScoredMember> {
        ids.into_iter()
            .filter_map(|id| {
                Some(ScoredMember {
                    member: self.list.value(id)?.clone(),
                    score: self.list.score(id)?,
                })
            })
            .collect()
    }

    /// Deletes nodes that are consecutive at level 0, ascending, sharing one
    /// update path.
    fn delete_consecutive(&mut self, ids: Vec<NodeId>) -> usize {
        self.pop_consecutive(ids).len()
    }

    fn pop_consecutive(&mut self, ids: Vec<NodeId>) -> Vec<ScoredMember> {
        let Some(first) = ids.first() else {
            return Vec::new();
        };
        let path = self.list.update_path(*first);

        let mut popped = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((score, member)) = self.list.delete(id, &path) {
                self.members.remove(&member);
                popped.push(ScoredMember { member, score });
            }
        }
        popped
    }
}

/// Resolves a `[start, stop]` index pair with negative indices into a clamped,
/// non-empty 0-based window, or `None`.
fn normalize_rank_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(pairs: &[(f64, &str)]) -> SortedSet {
        let mut set = SortedSet::new();
        set.add(pairs.iter().map(|(s, m)| (*s, Bytes::copy_from_slice(m.as_bytes()))));
        set
    }

    fn names(items: &[ScoredMember]) -> Vec<&str> {
        items
            .iter()
            .map(|m| std::str::from_utf8(&m.member).unwrap())
            .collect()
    }

    fn assert_consistent(set: &SortedSet) {
        set.list.check_invariants();
        assert_eq!(set.members.len(), set.list.len());
        for (member, id) in &set.members {
            assert_eq!(set.list.value(*id), Some(member));
        }
    }

    #[test]
    fn test_add_counts_new_members_only() {
        let mut set = SortedSet::new();
        let added = set.add(vec![(1.0, Bytes::from("a")), (2.0, Bytes::from("b"))]);
        assert_eq!(added, 2);

        let added = set.add(vec![(5.0, Bytes::from("a")), (3.0, Bytes::from("c"))]);
        assert_eq!(added, 1);
        assert_eq!(set.score(b"a"), Some(5.0));
        assert_eq!(set.count(), 3);
        assert_consistent(&set);
    }

    #[test]
    fn test_duplicate_members_in_one_call_last_wins() {
        let mut set = SortedSet::new();
        let added = set.add(vec![
            (1.0, Bytes::from("a")),
            (9.0, Bytes::from("a")),
            (4.0, Bytes::from("a")),
        ]);
        assert_eq!(added, 1);
        assert_eq!(set.count(), 1);
        assert_eq!(set.score(b"a"), Some(4.0));
        assert_consistent(&set);
    }

    #[test]
    fn test_range_and_rev_range() {
        let set = set_of(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
        assert_eq!(names(&set.range(0, 1)), vec!["a", "b"]);
        assert_eq!(names(&set.rev_range(0, 1)), vec!["c", "b"]);
        assert_eq!(names(&set.range(0, -1)), vec!["a", "b", "c"]);
        assert_eq!(names(&set.range(-2, -1)), vec!["b", "c"]);
        assert_eq!(names(&set.rev_range(-1, -1)), vec!["a"]);
        assert_eq!(names(&set.range(-100, 100)), vec!["a", "b", "c"]);
        assert!(set.range(2, 1).is_empty());
        assert!(set.range(5, 10).is_empty());
        assert!(set.rev_range(3, 4).is_empty());
        assert!(SortedSet::new().range(0, -1).is_empty());
    }

    #[test]
    fn test_rank_and_rev_rank() {
        let set = set_of(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
        assert_eq!(set.rank(b"a"), Some(0));
        assert_eq!(set.rank(b"c"), Some(2));
        assert_eq!(set.rev_rank(b"c"), Some(0));
        assert_eq!(set.rev_rank(b"a"), Some(2));
        assert_eq!(set.rank(b"missing"), None);
        assert_eq!(set.rev_rank(b"missing"), None);
        assert_eq!(set.score(b"missing"), None);
    }

    #[test]
    fn test_tie_break_is_lexicographic() {
        let set = set_of(&[(5.0, "b"), (5.0, "a")]);
        assert_eq!(names(&set.range(0, -1)), vec!["a", "b"]);
        assert_eq!(set.rank(b"a"), Some(0));
    }

    #[test]
    fn test_range_by_score() {
        let set = set_of(&[(1.0, "a"), (5.0, "b"), (7.0, "c"), (10.0, "d"), (12.0, "e")]);

        let range = ScoreRange::parse("(5", "10").unwrap();
        assert_eq!(names(&set.range_by_score(&range)), vec!["c", "d"]);

        let all = set.range_by_score(&ScoreRange::all());
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].score, 1.0);

        let rev = set.rev_range_by_score(ScoreBoundary::Inclusive(10.0), ScoreBoundary::Exclusive(1.0));
        assert_eq!(names(&rev), vec!["d", "c", "b"]);

        let rev = set.rev_range_by_score(ScoreBoundary::PosInfinity, ScoreBoundary::NegInfinity);
        assert_eq!(names(&rev), vec!["e", "d", "c", "b", "a"]);

        // Wrong-way bounds give nothing
        let rev = set.rev_range_by_score(ScoreBoundary::Inclusive(1.0), ScoreBoundary::Inclusive(10.0));
        assert!(rev.is_empty());
    }

    #[test]
    fn test_count_in_range() {
        let set = set_of(&[(1.0, "a"), (5.0, "b"), (7.0, "c"), (10.0, "d")]);
        assert_eq!(set.count_in_range(&ScoreRange::inclusive(5.0, 10.0)), 3);
        assert_eq!(set.count_in_range(&ScoreRange::parse("(5", "(10").unwrap()), 1);
        assert_eq!(set.count_in_range(&ScoreRange::inclusive(20.0, 30.0)), 0);
        // Bounds fall between members
        assert_eq!(set.count_in_range(&ScoreRange::inclusive(2.0, 4.0)), 0);
        assert_eq!(set.count_in_range(&ScoreRange::all()), 4);
    }

    #[test]
    fn test_range_by_score_limit() {
        let set = set_of(&[(1.0, "a"), (5.0, "b"), (7.0, "c"), (10.0, "d"), (12.0, "e")]);
        let range = ScoreRange::inclusive(5.0, 12.0);

        assert_eq!(names(&set.range_by_score_limit(&range, 1, Some(2))), vec!["c", "d"]);
        assert_eq!(names(&set.range_by_score_limit(&range, 2, None)), vec!["d", "e"]);
        assert_eq!(names(&set.range_by_score_limit(&range, 3, Some(10))), vec!["e"]);
        assert!(set.range_by_score_limit(&range, 4, None).is_empty());
        assert!(set.range_by_score_limit(&range, 0, Some(0)).is_empty());
        assert_eq!(
            set.range_by_score_limit(&range, 0, None),
            set.range_by_score(&range)
        );

        let (max, min) = (ScoreBoundary::Inclusive(12.0), ScoreBoundary::Inclusive(5.0));
        assert_eq!(names(&set.rev_range_by_score_limit(max, min, 1, Some(2))), vec!["d", "c"]);
        assert_eq!(names(&set.rev_range_by_score_limit(max, min, 2, None)), vec!["c", "b"]);
        assert_eq!(names(&set.rev_range_by_score_limit(max, min, 3, Some(5))), vec!["b"]);
        assert!(set.rev_range_by_score_limit(max, min, 4, None).is_empty());
        assert!(set.rev_range_by_score_limit(max, min, 0, Some(0)).is_empty());
        assert_eq!(
            set.rev_range_by_score_limit(max, min, 0, None),
            set.rev_range_by_score(max, min)
        );
    }

    #[test]
    fn test_remove() {
        let mut set = set_of(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
        assert_eq!(set.remove(["a", "missing", "c"]), 2);
        assert_eq!(names(&set.range(0, -1)), vec!["b"]);
        assert!(!set.contains(b"a"));
        assert_consistent(&set);
    }

    #[test]
    fn test_remove_range_by_rank() {
        let mut set = SortedSet::new();
        for i in 0..100 {
            set.insert(i as f64, Bytes::from(format!("m{:03}", i)));
        }
        assert_eq!(set.remove_range_by_rank(10, 19), 10);
        assert_eq!(set.count(), 90);
        assert_eq!(set.rank(b"m020"), Some(10));
        assert_eq!(set.remove_range_by_rank(-5, -1), 5);
        assert_eq!(set.count(), 85);
        assert_eq!(set.remove_range_by_rank(50, 10), 0);
        assert_consistent(&set);
    }

    #[test]
    fn test_remove_range_by_score() {
        let mut set = SortedSet::new();
        for i in 0..100 {
            set.insert((i % 10) as f64, Bytes::from(format!("m{}", i)));
        }
        assert_eq!(set.remove_range_by_score(&ScoreRange::parse("(2", "5").unwrap()), 30);
        assert_eq!(set.count(), 70);
        assert_eq!(set.count_in_range(&ScoreRange::inclusive(3.0, 5.0)), 0);
        assert_eq!(set.remove_range_by_score(&ScoreRange::inclusive(50.0, 60.0)), 0);
        assert_consistent(&set);
    }

    #[test]
    fn test_update_relocates_member() {
        let mut set = set_of(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
        set.insert(10.0, Bytes::from("a"));
        assert_eq!(names(&set.range(0, -1)), vec!["b", "c", "a"]);
        assert_eq!(set.rank(b"a"), Some(2));
        assert_consistent(&set);
    }

    #[test]
    fn test_incr_by() {
        let mut set = SortedSet::new();
        assert_eq!(set.incr_by(Bytes::from("a"), 2.5), 2.5);
        assert_eq!(set.incr_by(Bytes::from("a"), -1.0), 1.5);
        assert_eq!(set.score(b"a"), Some(1.5));
    }

    #[test]
    fn test_pop_min_and_max() {
        let mut set = set_of(&[(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")]);
        assert_eq!(names(&set.pop_min(2)), vec!["a", "b"]);
        assert_eq!(names(&set.pop_max(1)), vec!["d"]);
        assert_eq!(names(&set.pop_max(10)), vec!["c"]);
        assert!(set.pop_min(1).is_empty());
        assert!(set.is_empty());
        assert_consistent(&set);
    }

    #[test]
    fn test_add_remove_add_restores_state() {
        let mut fresh = SortedSet::new();
        fresh.add(vec![(1.0, Bytes::from("x")), (2.0, Bytes::from("m")), (3.0, Bytes::from("y"))]);

        let mut cycled = SortedSet::new();
        cycled.add(vec![(1.0, Bytes::from("x")), (3.0, Bytes::from("y"))]);
        cycled.insert(2.0, Bytes::from("m"));
        cycled.remove(["m"]);
        cycled.insert(2.0, Bytes::from("m"));

        assert_eq!(cycled.to_vec(), fresh.to_vec());
        assert_eq!(cycled.rank(b"m"), fresh.rank(b"m"));
        assert_eq!(cycled.score(b"m"), fresh.score(b"m"));
        assert_consistent(&cycled);
    }
}
