//! Ranked Skip List
//!
//! A probabilistic ordered index over `(score, value)` pairs. Every forward link
//! carries a `span`: the number of level-0 steps it covers. Summing spans along
//! a search path yields a node's rank, so rank lookups and rank-range scans are
//! `O(log n)` like score lookups.
//!
//! ```text
//!  level 2  HEAD ───────────────3──────────────> C ────────1────────> nil
//!  level 1  HEAD ─────1──────> A ──────2──────> C ────────1────────> nil
//!  level 0  HEAD ──1──> A ──1──> B ──1──> C ──1──> D ──0──> nil
//! ```
//!
//! ## Storage
//!
//! Nodes live in an arena (`Vec<Option<Node<T>>>`) and link to each other by
//! [`NodeId`]. Backward links and the tail are plain ids too, so there is no
//! shared ownership and no raw pointer. Freed slots are recycled.
//!
//! A [`NodeId`] stays valid until that node is deleted. Relocating a node on a
//! score change keeps its id.
//!
//! Order is by score, then by `T: Ord` on ties, so equal scores still give a
//! stable, rank-addressable sequence.

use crate::config::{clamp_level, SKIPLIST_MAX_LEVEL};
use crate::zset::range::ScoreRange;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Handle to a node in a [`SkipList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, Default)]
struct Level {
    forward: Option<NodeId>,
    /// Level-0 nodes between this node and `forward`, plus one. For a link to
    /// nil, the number of nodes after this one.
    span: usize,
}

#[derive(Debug, Clone)]
struct Node<T> {
    score: f64,
    value: T,
    backward: Option<NodeId>,
    levels: Vec<Level>,
}

/// A position on a search path: the head sentinel or a real node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Head,
    At(NodeId),
}

impl Cursor {
    fn node(self) -> Option<NodeId> {
        match self {
            Cursor::Head => None,
            Cursor::At(id) => Some(id),
        }
    }
}

/// Predecessor of a node at every level, as needed by [`SkipList::delete`].
///
/// A path is only valid until the list is next modified, with one exception:
/// after deleting a node, the same path still addresses that node's level-0
/// successor. Range removals rely on this to delete consecutive nodes with a
/// single search.
#[derive(Debug, Clone)]
pub struct UpdatePath {
    nodes: Vec<Cursor>,
}

/// Probabilistic skip list with rank support.
#[derive(Clone)]
pub struct SkipList<T> {
    head: Vec<Level>,
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    tail: Option<NodeId>,
    level: usize,
    max_level: usize,
    len: usize,
    rng: SmallRng,
}

impl<T> fmt::Debug for SkipList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipList")
            .field("len", &self.len)
            .field("level", &self.level)
            .field("max_level", &self.max_level)
            .finish()
    }
}

impl<T: Ord> Default for SkipList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> SkipList<T> {
    /// Creates a list with the default maximum level (64).
    pub fn new() -> Self {
        Self::with_max_level(SKIPLIST_MAX_LEVEL)
    }

    /// Creates a list whose nodes never exceed `max_level` levels.
    ///
    /// `max_level` is clamped to `[16, 64]`.
    pub fn with_max_level(max_level: usize) -> Self {
        Self::build(max_level, SmallRng::from_entropy())
    }

    /// Like [`with_max_level`](Self::with_max_level) with a seeded level generator.
    pub fn with_seed(max_level: usize, seed: u64) -> Self {
        Self::build(max_level, SmallRng::seed_from_u64(seed))
    }

    fn build(max_level: usize, rng: SmallRng) -> Self {
        let max_level = clamp_level(max_level);
        Self {
            head: vec![Level::default(); max_level],
            nodes: Vec::new(),
            free: Vec::new(),
            tail: None,
            level: 1,
            max_level,
            len: 0,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels currently in use.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Lowest node.
    pub fn first(&self) -> Option<NodeId> {
        self.head[0].forward
    }

    /// Highest node.
    pub fn last(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn score(&self, id: NodeId) -> Option<f64> {
        self.get_node(id).map(|n| n.score)
    }

    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.get_node(id).map(|n| &n.value)
    }

    /// Level-0 successor.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.levels[0].forward)
    }

    /// Level-0 predecessor, `None` for the first node.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.backward)
    }

    /// Iterates nodes in ascending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            next: self.first(),
        }
    }

    /// Inserts `value` with `score` and returns its node.
    ///
    /// The caller is responsible for not inserting the same value twice.
    pub fn insert(&mut self, score: f64, value: T) -> NodeId {
        let id = self.alloc(Node {
            score,
            value,
            backward: None,
            levels: Vec::new(),
        });
        self.place(id);
        self.len += 1;
        id
    }

    /// Changes a node's score, moving it only if its order changes.
    ///
    /// When the new score keeps the node between its current neighbours the
    /// score is changed in place. Otherwise the node is unlinked and linked
    /// again at its new position under the same id.
    pub fn update_score(&mut self, id: NodeId, score: f64) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        if node.score == score {
            return;
        }

        let after_prev = node
            .backward
            .map_or(true, |prev| self.key_before(prev, score, &node.value));
        let before_next = node.levels[0].forward.map_or(true, |next| {
            let next = self.node(next);
            key_less(score, &node.value, next.score, &next.value)
        });
        if after_prev && before_next {
            self.node_mut(id).score = score;
            return;
        }

        let path = self.update_path(id);
        self.unlink(id, &path);
        self.node_mut(id).score = score;
        self.place(id);
        self.len += 1;
    }

    /// Computes the predecessors of `id` at every level.
    pub fn update_path(&self, id: NodeId) -> UpdatePath {
        let mut nodes = vec![Cursor::Head; self.max_level];
        let target = self.node(id);
        let mut x = Cursor::Head;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if next != id && self.key_before(next, target.score, &target.value) {
                    x = Cursor::At(next);
                } else {
                    break;
                }
            }
            nodes[i] = x;
        }
        UpdatePath { nodes }
    }

    /// Removes `id` using a precomputed `path` and returns its score and value.
    ///
    /// Returns `None` if `id` is not a live node of this list.
    pub fn delete(&mut self, id: NodeId, path: &UpdatePath) -> Option<(f64, T)> {
        self.get_node(id)?;
        self.unlink(id, path);
        let node = self.nodes[id.0].take()?;
        self.free.push(id.0);
        Some((node.score, node.value))
    }

    /// Removes `id`, computing its update path first.
    pub fn remove(&mut self, id: NodeId) -> Option<(f64, T)> {
        self.get_node(id)?;
        let path = self.update_path(id);
        self.delete(id, &path)
    }

    /// Nodes whose score lies in `range`, ascending.
    pub fn nodes_in_score_range(&self, range: &ScoreRange) -> Vec<NodeId> {
        let mut result = Vec::new();
        if !self.overlaps(range) {
            return result;
        }

        // Descend to the last node below the lower bound
        let mut x = Cursor::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if range.min.admits_from_below(self.node(next).score) {
                    break;
                }
                x = Cursor::At(next);
            }
        }

        let mut cursor = self.forward(x, 0);
        while let Some(id) = cursor {
            let node = self.node(id);
            if range.is_above(node.score) {
                break;
            }
            result.push(id);
            cursor = node.levels[0].forward;
        }
        result
    }

    /// 1-based ranks of the first and last node whose score lies in `range`.
    ///
    /// Two descents, no scan: the span sums give the ranks directly.
    pub fn rank_bounds(&self, range: &ScoreRange) -> Option<(usize, usize)> {
        if !self.overlaps(range) {
            return None;
        }

        // Nodes below the lower bound
        let mut below = 0;
        let mut x = Cursor::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if range.min.admits_from_below(self.node(next).score) {
                    break;
                }
                below += self.levels(x)[i].span;
                x = Cursor::At(next);
            }
        }

        // Nodes not above the upper bound
        let mut upto = 0;
        let mut x = Cursor::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if range.is_above(self.node(next).score) {
                    break;
                }
                upto += self.levels(x)[i].span;
                x = Cursor::At(next);
            }
        }

        (upto > below).then_some((below + 1, upto))
    }

    /// Nodes with 1-based rank in `[left, right]`, ascending.
    ///
    /// Empty if the list is empty, `left` is 0, `right < left` or `left` is past
    /// the end. `right` is clamped to the length.
    pub fn nodes_in_rank_range(&self, left: usize, right: usize) -> Vec<NodeId> {
        if self.len == 0 || left == 0 || right < left || left > self.len {
            return Vec::new();
        }
        let right = right.min(self.len);

        let mut result = Vec::with_capacity(right - left + 1);
        let mut cursor = self.node_at_rank(left);
        while let Some(id) = cursor {
            result.push(id);
            if result.len() == right - left + 1 {
                break;
            }
            cursor = self.node(id).levels[0].forward;
        }
        result
    }

    /// Node with 1-based `rank`.
    pub fn node_at_rank(&self, rank: usize) -> Option<NodeId> {
        if rank == 0 || rank > self.len {
            return None;
        }

        let mut traversed = 0;
        let mut x = Cursor::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                let span = self.levels(x)[i].span;
                if traversed + span > rank {
                    break;
                }
                traversed += span;
                x = Cursor::At(next);
            }
            if traversed == rank {
                return x.node();
            }
        }
        None
    }

    /// 1-based rank of `id`, or `None` if it is not a live node.
    pub fn rank_of(&self, id: NodeId) -> Option<usize> {
        let target = self.get_node(id)?;

        let mut rank = 0;
        let mut x = Cursor::Head;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                let span = self.levels(x)[i].span;
                if next == id {
                    return Some(rank + span);
                }
                if !self.key_before(next, target.score, &target.value) {
                    break;
                }
                rank += span;
                x = Cursor::At(next);
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.gen_ratio(1, 4) {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    #[inline]
    fn get_node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<T> {
        match self.get_node(id) {
            Some(node) => node,
            None => panic!("skip list node {:?} is not live", id),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        match self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("skip list node {:?} is not live", id),
        }
    }

    #[inline]
    fn levels(&self, at: Cursor) -> &[Level] {
        match at {
            Cursor::Head => &self.head,
            Cursor::At(id) => &self.node(id).levels,
        }
    }

    #[inline]
    fn levels_mut(&mut self, at: Cursor) -> &mut [Level] {
        match at {
            Cursor::Head => &mut self.head,
            Cursor::At(id) => &mut self.node_mut(id).levels,
        }
    }

    #[inline]
    fn forward(&self, at: Cursor, i: usize) -> Option<NodeId> {
        self.levels(at)[i].forward
    }

    /// Whether node `id` orders strictly before `(score, value)`.
    #[inline]
    fn key_before(&self, id: NodeId, score: f64, value: &T) -> bool {
        let node = self.node(id);
        key_less(node.score, &node.value, score, value)
    }

    /// Whether any node could fall inside `range`.
    fn overlaps(&self, range: &ScoreRange) -> bool {
        if range.is_empty() {
            return false;
        }
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => {
                !range.is_above(self.node(first).score)
                    && range.min.admits_from_below(self.node(last).score)
            }
            _ => false,
        }
    }

    /// Links an allocated but unlinked node at the position given by its key,
    /// drawing a fresh level count. Does not touch `len`.
    fn place(&mut self, id: NodeId) {
        let mut update = vec![Cursor::Head; self.max_level];
        let mut rank = vec![0usize; self.max_level];
        let mut x = Cursor::Head;

        {
            let target = self.node(id);
            for i in (0..self.level).rev() {
                rank[i] = if i + 1 == self.level { 0 } else { rank[i + 1] };
                while let Some(next) = self.forward(x, i) {
                    if !self.key_before(next, target.score, &target.value) {
                        break;
                    }
                    rank[i] += self.levels(x)[i].span;
                    x = Cursor::At(next);
                }
                update[i] = x;
            }
        }

        let level = self.random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = Cursor::Head;
                self.head[i].span = self.len;
            }
            self.level = level;
        }

        self.node_mut(id).levels = vec![Level::default(); level];
        for i in 0..level {
            let before = self.levels(update[i])[i];
            let covered = rank[0] - rank[i];

            let node_level = &mut self.node_mut(id).levels[i];
            node_level.forward = before.forward;
            node_level.span = before.span - covered;

            let prev_level = &mut self.levels_mut(update[i])[i];
            prev_level.forward = Some(id);
            prev_level.span = covered + 1;
        }

        // Links above the new node now cover one more node
        for (i, at) in update.iter().enumerate().take(self.level).skip(level) {
            self.levels_mut(*at)[i].span += 1;
        }

        let backward = update[0].node();
        let next = self.node(id).levels[0].forward;
        self.node_mut(id).backward = backward;
        match next {
            Some(next) => self.node_mut(next).backward = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Unlinks `id` from every level and shrinks the list level if the top
    /// levels become empty. Decrements `len`; the arena slot stays occupied.
    fn unlink(&mut self, id: NodeId, path: &UpdatePath) {
        let (node_levels, node_next) = {
            let node = self.node(id);
            (node.levels.clone(), node.levels[0].forward)
        };

        for i in 0..self.level {
            let at = path.nodes[i];
            let level = &mut self.levels_mut(at)[i];
            if level.forward == Some(id) {
                level.span = level.span + node_levels[i].span - 1;
                level.forward = node_levels[i].forward;
            } else {
                level.span -= 1;
            }
        }

        let prev = path.nodes[0].node();
        match node_next {
            Some(next) => self.node_mut(next).backward = prev,
            None => self.tail = prev,
        }

        while self.level > 1 && self.head[self.level - 1].forward.is_none() {
            self.head[self.level - 1].span = 0;
            self.level -= 1;
        }
        self.len -= 1;
    }
}

#[inline]
fn key_less<T: Ord>(a_score: f64, a_value: &T, b_score: f64, b_value: &T) -> bool {
    a_score < b_score || (a_score == b_score && a_value < b_value)
}

/// Ascending iterator over `(id, score, value)`.
pub struct Iter<'a, T> {
    list: &'a SkipList<T>,
    next: Option<NodeId>,
}

impl<'a, T: Ord> Iterator for Iter<'a, T> {
    type Item = (NodeId, f64, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.list.node(id);
        self.next = node.levels[0].forward;
        Some((id, node.score, &node.value))
    }
}

#[cfg(test)]
impl<T: Ord + fmt::Debug> SkipList<T> {
    /// Walks every level and checks links, spans, backward pointers and order.
    pub(crate) fn check_invariants(&self) {
        let order: Vec<NodeId> = self.iter().map(|(id, _, _)| id).collect();
        assert_eq!(order.len(), self.len, "len does not match level-0 walk");
        assert_eq!(self.tail, order.last().copied(), "tail mismatch");

        let rank_of = |id: NodeId| order.iter().position(|n| *n == id).unwrap() + 1;

        for pair in order.windows(2) {
            let (a, b) = (self.node(pair[0]), self.node(pair[1]));
            assert!(key_less(a.score, &a.value, b.score, &b.value), "order violated");
            assert_eq!(b.backward, Some(pair[0]), "backward link mismatch");
        }
        if let Some(first) = order.first() {
            assert_eq!(self.node(*first).backward, None);
        }

        for i in 0..self.level {
            let mut x = Cursor::Head;
            let mut rank = 0;
            loop {
                let level = self.levels(x)[i];
                match level.forward {
                    Some(next) => {
                        rank += level.span;
                        assert_eq!(rank, rank_of(next), "span mismatch at level {}", i);
                        x = Cursor::At(next);
                    }
                    None => {
                        assert_eq!(rank + level.span, self.len, "tail span mismatch at level {}", i);
                        break;
                    }
                }
            }
        }
        if self.level > 1 {
            assert!(self.head[self.level - 1].forward.is_some(), "empty top level");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zset::range::ScoreBoundary;
    use rand::seq::SliceRandom;

    fn values(list: &SkipList<String>, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| list.value(*id).unwrap().clone()).collect()
    }

    fn build(pairs: &[(f64, &str)]) -> (SkipList<String>, Vec<NodeId>) {
        let mut list = SkipList::with_seed(16, 7);
        let ids = pairs
            .iter()
            .map(|(score, value)| list.insert(*score, value.to_string()))
            .collect();
        (list, ids)
    }

    #[test]
    fn test_insert_orders_by_score_then_value() {
        let (list, _) = build(&[(3.0, "c"), (1.0, "a"), (2.0, "b"), (2.0, "a2")]);
        let order: Vec<_> = list.iter().map(|(_, s, v)| (s, v.clone())).collect();
        assert_eq!(
            order,
            vec![
                (1.0, "a".to_string()),
                (2.0, "a2".to_string()),
                (2.0, "b".to_string()),
                (3.0, "c".to_string()),
            ]
        );
        list.check_invariants();
    }

    #[test]
    fn test_tie_break_uses_value_not_insertion_order() {
        let (list, ids) = build(&[(5.0, "b"), (5.0, "a")]);
        assert_eq!(list.rank_of(ids[1]), Some(1));
        assert_eq!(list.rank_of(ids[0]), Some(2));
    }

    #[test]
    fn test_rank_matches_sorted_position() {
        let mut list = SkipList::with_seed(32, 42);
        let mut rng = SmallRng::seed_from_u64(1);
        let mut live: Vec<(NodeId, f64, u32)> = Vec::new();

        for v in 0..2000u32 {
            let score = rng.gen_range(0..200) as f64;
            live.push((list.insert(score, v), score, v));

            // Delete roughly a third of the time
            if rng.gen_ratio(1, 3) {
                let idx = rng.gen_range(0..live.len());
                let (id, score, v) = live.swap_remove(idx);
                assert_eq!(list.remove(id), Some((score, v)));
            }
        }
        list.check_invariants();

        live.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.2.cmp(&b.2)));
        for (pos, (id, _, _)) in live.iter().enumerate() {
            assert_eq!(list.rank_of(*id), Some(pos + 1));
            assert_eq!(list.node_at_rank(pos + 1), Some(*id));
        }
    }

    #[test]
    fn test_delete_shrinks_level_and_fixes_tail() {
        let mut list = SkipList::with_seed(16, 3);
        let ids: Vec<_> = (0..500).map(|i| list.insert(i as f64, i)).collect();
        assert!(list.level() > 1);

        let mut order = ids.clone();
        order.shuffle(&mut SmallRng::seed_from_u64(9));
        for (n, id) in order.iter().enumerate() {
            list.remove(*id).unwrap();
            if n % 50 == 0 {
                list.check_invariants();
            }
        }
        assert!(list.is_empty());
        assert_eq!(list.level(), 1);
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);
        list.check_invariants();
    }

    #[test]
    fn test_delete_stale_id_is_noop() {
        let (mut list, ids) = build(&[(1.0, "a"), (2.0, "b")]);
        let path = list.update_path(ids[0]);
        assert!(list.delete(ids[0], &path).is_some());
        assert_eq!(list.remove(ids[0]), None);
        assert_eq!(list.rank_of(ids[0]), None);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let (mut list, ids) = build(&[(1.0, "a"), (2.0, "b")]);
        list.remove(ids[0]).unwrap();
        let id = list.insert(0.5, "z".to_string());
        assert_eq!(id, ids[0]);
        assert_eq!(list.rank_of(id), Some(1));
        list.check_invariants();
    }

    #[test]
    fn test_update_score_in_place() {
        let (mut list, ids) = build(&[(1.0, "a"), (5.0, "b"), (10.0, "c")]);
        list.update_score(ids[1], 7.0);
        assert_eq!(list.score(ids[1]), Some(7.0));
        assert_eq!(list.rank_of(ids[1]), Some(2));
        list.check_invariants();
    }

    #[test]
    fn test_update_score_relocates_and_keeps_id() {
        let (mut list, ids) = build(&[(1.0, "a"), (5.0, "b"), (10.0, "c")]);
        list.update_score(ids[0], 20.0);
        assert_eq!(list.rank_of(ids[0]), Some(3));
        assert_eq!(list.value(ids[0]).map(String::as_str), Some("a"));
        assert_eq!(list.last(), Some(ids[0]));

        list.update_score(ids[0], -1.0);
        assert_eq!(list.rank_of(ids[0]), Some(1));
        assert_eq!(list.len(), 3);
        list.check_invariants();
    }

    #[test]
    fn test_update_score_respects_tie_break() {
        // Moving "c" to score 1.0 must place it after "a" (same score, a < c)
        let (mut list, ids) = build(&[(1.0, "a"), (1.5, "b"), (2.0, "c")]);
        list.update_score(ids[2], 1.0);
        assert_eq!(list.rank_of(ids[2]), Some(2));

        // "a" to 1.5 ties with "b" and stays first because a < b
        list.update_score(ids[0], 1.5);
        assert_eq!(list.rank_of(ids[0]), Some(2));
        assert_eq!(list.rank_of(ids[2]), Some(1));
        list.check_invariants();
    }

    #[test]
    fn test_score_range_bounds() {
        let (list, _) = build(&[
            (4.0, "d"),
            (5.0, "e"),
            (7.0, "g"),
            (10.0, "j"),
            (11.0, "k"),
        ]);

        let range = ScoreRange::new(ScoreBoundary::Exclusive(5.0), ScoreBoundary::Inclusive(10.0));
        let ids = list.nodes_in_score_range(&range);
        assert_eq!(values(&list, &ids), vec!["g", "j"]);

        let range = ScoreRange::new(ScoreBoundary::Inclusive(5.0), ScoreBoundary::Exclusive(10.0));
        assert_eq!(values(&list, &list.nodes_in_score_range(&range)), vec!["e", "g"]);

        let range = ScoreRange::new(ScoreBoundary::NegInfinity, ScoreBoundary::Inclusive(5.0));
        assert_eq!(values(&list, &list.nodes_in_score_range(&range)), vec!["d", "e"]);

        let range = ScoreRange::new(ScoreBoundary::Exclusive(7.0), ScoreBoundary::PosInfinity);
        assert_eq!(values(&list, &list.nodes_in_score_range(&range)), vec!["j", "k"]);

        assert_eq!(list.nodes_in_score_range(&ScoreRange::all()).len(), 5);
        assert!(list.nodes_in_score_range(&ScoreRange::inclusive(12.0, 20.0)).is_empty());
        assert!(list.nodes_in_score_range(&ScoreRange::inclusive(0.0, 3.0)).is_empty());
        assert!(list.nodes_in_score_range(&ScoreRange::inclusive(9.0, 6.0)).is_empty());
    }

    #[test]
    fn test_rank_bounds() {
        let (list, _) = build(&[
            (4.0, "d"),
            (5.0, "e"),
            (7.0, "g"),
            (10.0, "j"),
            (11.0, "k"),
        ]);

        let range = ScoreRange::new(ScoreBoundary::Exclusive(5.0), ScoreBoundary::Inclusive(10.0));
        assert_eq!(list.rank_bounds(&range), Some((3, 4)));
        assert_eq!(list.rank_bounds(&ScoreRange::all()), Some((1, 5)));
        assert_eq!(list.rank_bounds(&ScoreRange::inclusive(11.0, 11.0)), Some((5, 5)));

        // Gap between two scores
        let gap = ScoreRange::new(ScoreBoundary::Exclusive(5.0), ScoreBoundary::Exclusive(7.0));
        assert_eq!(list.rank_bounds(&gap), None);
        assert_eq!(list.rank_bounds(&ScoreRange::inclusive(12.0, 20.0)), None);
        assert_eq!(list.rank_bounds(&ScoreRange::inclusive(9.0, 6.0)), None);

        let empty: SkipList<String> = SkipList::new();
        assert_eq!(empty.rank_bounds(&ScoreRange::all()), None);
    }

    #[test]
    fn test_rank_bounds_agree_with_scan() {
        let mut list = SkipList::with_seed(32, 9);
        let mut rng = SmallRng::seed_from_u64(3);
        for v in 0..1000u32 {
            list.insert(rng.gen_range(0..100) as f64, v);
        }

        for _ in 0..200 {
            let a = rng.gen_range(-5..105) as f64;
            let b = rng.gen_range(-5..105) as f64;
            let range = ScoreRange::new(ScoreBoundary::Exclusive(a), ScoreBoundary::Inclusive(b));
            let ids = list.nodes_in_score_range(&range);
            let expected = match (ids.first(), ids.last()) {
                (Some(first), Some(last)) => Some((list.rank_of(*first).unwrap(), list.rank_of(*last).unwrap())),
                _ => None,
            };
            assert_eq!(list.rank_bounds(&range), expected, "range {}", range);
        }
    }

    #[test]
    fn test_rank_range() {
        let (list, _) = build(&[(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")]);
        assert_eq!(values(&list, &list.nodes_in_rank_range(2, 3)), vec!["b", "c"]);
        assert_eq!(values(&list, &list.nodes_in_rank_range(3, 100)), vec!["c", "d"]);
        assert_eq!(values(&list, &list.nodes_in_rank_range(1, 1)), vec!["a"]);
        assert!(list.nodes_in_rank_range(0, 2).is_empty());
        assert!(list.nodes_in_rank_range(3, 2).is_empty());
        assert!(list.nodes_in_rank_range(5, 6).is_empty());

        let empty: SkipList<String> = SkipList::new();
        assert!(empty.nodes_in_rank_range(1, 1).is_empty());
    }

    #[test]
    fn test_shared_update_path_for_consecutive_deletes() {
        let mut list = SkipList::with_seed(16, 11);
        for i in 0..200 {
            list.insert(i as f64, i);
        }
        let doomed = list.nodes_in_rank_range(50, 150);
        let path = list.update_path(doomed[0]);
        for id in doomed {
            assert!(list.delete(id, &path).is_some());
        }
        assert_eq!(list.len(), 99);
        list.check_invariants();

        let remaining: Vec<i32> = list.iter().map(|(_, _, v)| *v).collect();
        assert_eq!(remaining[48], 48);
        assert_eq!(remaining[49], 150);
    }

    #[test]
    fn test_max_level_clamped() {
        let list: SkipList<u8> = SkipList::with_max_level(2);
        assert_eq!(list.max_level(), 16);
        let list: SkipList<u8> = SkipList::with_max_level(500);
        assert_eq!(list.max_level(), 64);
    }

    #[test]
    fn test_prev_next_navigation() {
        let (list, ids) = build(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
        assert_eq!(list.next(ids[0]), Some(ids[1]));
        assert_eq!(list.prev(ids[1]), Some(ids[0]));
        assert_eq!(list.prev(ids[0]), None);
        assert_eq!(list.next(ids[2]), None);
    }
}
