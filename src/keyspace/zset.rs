//! Sorted-set commands.
//!
//! Readers take the key's read lock and the set's inner read lock; writers
//! take the key's write lock. A set left empty by a command is removed along
//! with its TTL, so an empty sorted set is never observable.

use super::{Keyspace, Value};
use crate::error::{EngineError, Result};
use crate::zset::{ScoreBoundary, ScoreRange, ScoredMember, SortedSet};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Flags of `ZADD`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZAddOptions {
    /// Only add new members
    pub nx: bool,
    /// Only update existing members
    pub xx: bool,
    /// Count changed scores as well as new members
    pub ch: bool,
}

/// How `ZUNIONSTORE` and `ZINTERSTORE` combine scores of the same member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            // inf + -inf
            Aggregate::Sum => zero_if_nan(a + b),
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

/// `LIMIT offset count` of `ZRANGEBYSCORE`.
///
/// A negative count means "everything after offset"; a negative offset or a
/// zero count selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: i64,
    pub count: i64,
}

impl Limit {
    pub fn new(offset: i64, count: i64) -> Self {
        Self { offset, count }
    }

    /// Offset and optional count, or `None` when the limit selects nothing.
    /// A negative count keeps everything after the offset.
    fn window(&self) -> Option<(usize, Option<usize>)> {
        let offset = usize::try_from(self.offset).ok()?;
        match self.count {
            0 => None,
            count => Some((offset, usize::try_from(count).ok())),
        }
    }
}

#[inline]
fn zero_if_nan(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

impl Keyspace {
    /// Adds members to the sorted set at `key`, creating it if needed.
    ///
    /// Returns the number of new members, or of new and changed members with
    /// `ch`. When a member appears more than once, the last score wins.
    pub fn zadd(&self, key: &[u8], items: &[(f64, Bytes)], options: ZAddOptions) -> Result<usize> {
        if options.nx && options.xx {
            return Err(EngineError::SyntaxError);
        }
        if items.iter().any(|(score, _)| score.is_nan()) {
            return Err(EngineError::NotAFloat);
        }

        self.expiry.check_ttl(key)?;
        let _guard = self.locks.lock(key)?;
        let (set, fresh) = self.sorted_set_or_new(key)?;

        let (added, updated, is_empty) = {
            let mut set = set.write();
            let (mut added, mut updated) = (0, 0);
            for (score, member) in items {
                match set.score(member) {
                    None if !options.xx => {
                        set.insert(*score, member.clone());
                        added += 1;
                    }
                    Some(current) if !options.nx && current != *score => {
                        set.insert(*score, member.clone());
                        updated += 1;
                    }
                    _ => {}
                }
            }
            (added, updated, set.is_empty())
        };

        if fresh && !is_empty {
            self.data.set(Bytes::copy_from_slice(key), Value::SortedSet(set))?;
        }
        Ok(if options.ch { added + updated } else { added })
    }

    /// Adds `increment` to `member`'s score, creating the member at
    /// `increment` if needed. Returns the new score.
    pub fn zincrby(&self, key: &[u8], increment: f64, member: Bytes) -> Result<f64> {
        if increment.is_nan() {
            return Err(EngineError::NotAFloat);
        }

        self.expiry.check_ttl(key)?;
        let _guard = self.locks.lock(key)?;
        let (set, fresh) = self.sorted_set_or_new(key)?;

        let score = {
            let mut set = set.write();
            let score = set.score(&member).unwrap_or(0.0) + increment;
            if score.is_nan() {
                return Err(EngineError::Overflow);
            }
            set.insert(score, member);
            score
        };

        if fresh {
            self.data.set(Bytes::copy_from_slice(key), Value::SortedSet(set))?;
        }
        Ok(score)
    }

    pub fn zcard(&self, key: &[u8]) -> Result<usize> {
        self.read_set(key, 0, |set| set.count())
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        self.read_set(key, None, |set| set.score(member))
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        self.read_set(key, None, |set| set.rank(member))
    }

    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        self.read_set(key, None, |set| set.rev_rank(member))
    }

    /// Members by 0-based rank in `[start, stop]`, negative indices from the end.
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        self.read_set(key, Vec::new(), |set| set.range(start, stop))
    }

    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        self.read_set(key, Vec::new(), |set| set.rev_range(start, stop))
    }

    pub fn zrangebyscore(
        &self,
        key: &[u8],
        range: &ScoreRange,
        limit: Option<Limit>,
    ) -> Result<Vec<ScoredMember>> {
        let window = limit.map_or(Some((0, None)), |limit| limit.window());
        self.read_set(key, Vec::new(), |set| match window {
            Some((offset, count)) => set.range_by_score_limit(range, offset, count),
            None => Vec::new(),
        })
    }

    /// Members scored between `max` and `min`, highest first.
    pub fn zrevrangebyscore(
        &self,
        key: &[u8],
        max: ScoreBoundary,
        min: ScoreBoundary,
        limit: Option<Limit>,
    ) -> Result<Vec<ScoredMember>> {
        let window = limit.map_or(Some((0, None)), |limit| limit.window());
        self.read_set(key, Vec::new(), |set| match window {
            Some((offset, count)) => set.rev_range_by_score_limit(max, min, offset, count),
            None => Vec::new(),
        })
    }

    pub fn zcount(&self, key: &[u8], range: &ScoreRange) -> Result<usize> {
        self.read_set(key, 0, |set| set.count_in_range(range))
    }

    pub fn zrem<M: AsRef<[u8]>>(&self, key: &[u8], members: &[M]) -> Result<usize> {
        self.write_set(key, 0, |set| set.remove(members))
    }

    pub fn zremrangebyrank(&self, key: &[u8], start: i64, stop: i64) -> Result<usize> {
        self.write_set(key, 0, |set| set.remove_range_by_rank(start, stop))
    }

    pub fn zremrangebyscore(&self, key: &[u8], range: &ScoreRange) -> Result<usize> {
        self.write_set(key, 0, |set| set.remove_range_by_score(range))
    }

    pub fn zpopmin(&self, key: &[u8], count: usize) -> Result<Vec<ScoredMember>> {
        self.write_set(key, Vec::new(), |set| set.pop_min(count))
    }

    pub fn zpopmax(&self, key: &[u8], count: usize) -> Result<Vec<ScoredMember>> {
        self.write_set(key, Vec::new(), |set| set.pop_max(count))
    }

    /// Members of the first set that are in none of the others, with their
    /// scores from the first set.
    pub fn zdiff<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<ScoredMember>> {
        let keys = as_slices(keys)?;
        for key in &keys {
            self.expiry.check_ttl(key)?;
        }
        let _guard = self.locks.rlock_multi(&keys)?;
        Ok(self.diff_locked(&keys)?.to_vec())
    }

    /// Stores the result of [`zdiff`](Self::zdiff) at `dest`. Returns its size.
    pub fn zdiffstore<K: AsRef<[u8]>>(&self, dest: &[u8], keys: &[K]) -> Result<usize> {
        let keys = as_slices(keys)?;
        let all = self.check_all(dest, &keys)?;
        let _guard = self.locks.lock_multi(&all)?;
        let result = self.diff_locked(&keys)?;
        self.store_locked(dest, result)
    }

    /// Union of the sets at `keys`, scores multiplied by `weights` (all `1`
    /// when `None`) and combined with `aggregate`.
    pub fn zunion<K: AsRef<[u8]>>(
        &self,
        keys: &[K],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<Vec<ScoredMember>> {
        let keys = as_slices(keys)?;
        for key in &keys {
            self.expiry.check_ttl(key)?;
        }
        let _guard = self.locks.rlock_multi(&keys)?;
        Ok(self.combine_locked(&keys, weights, aggregate, false)?.to_vec())
    }

    /// Like [`zunion`](Self::zunion), keeping only members present in every set.
    pub fn zinter<K: AsRef<[u8]>>(
        &self,
        keys: &[K],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<Vec<ScoredMember>> {
        let keys = as_slices(keys)?;
        for key in &keys {
            self.expiry.check_ttl(key)?;
        }
        let _guard = self.locks.rlock_multi(&keys)?;
        Ok(self.combine_locked(&keys, weights, aggregate, true)?.to_vec())
    }

    /// Stores the result of [`zunion`](Self::zunion) at `dest`. Returns its size.
    pub fn zunionstore<K: AsRef<[u8]>>(
        &self,
        dest: &[u8],
        keys: &[K],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<usize> {
        let keys = as_slices(keys)?;
        let all = self.check_all(dest, &keys)?;
        let _guard = self.locks.lock_multi(&all)?;
        let result = self.combine_locked(&keys, weights, aggregate, false)?;
        self.store_locked(dest, result)
    }

    /// Stores the result of [`zinter`](Self::zinter) at `dest`. Returns its size.
    pub fn zinterstore<K: AsRef<[u8]>>(
        &self,
        dest: &[u8],
        keys: &[K],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<usize> {
        let keys = as_slices(keys)?;
        let all = self.check_all(dest, &keys)?;
        let _guard = self.locks.lock_multi(&all)?;
        let result = self.combine_locked(&keys, weights, aggregate, true)?;
        self.store_locked(dest, result)
    }

    /// Runs `f` on the set at `key` under read locks, or returns `empty`.
    fn read_set<R>(&self, key: &[u8], empty: R, f: impl FnOnce(&SortedSet) -> R) -> Result<R> {
        self.expiry.check_ttl(key)?;
        let _guard = self.locks.rlock(key)?;
        match self.sorted_set(key)? {
            Some(set) => Ok(f(&set.read())),
            None => Ok(empty),
        }
    }

    /// Runs `f` on the set at `key` under write locks, or returns `empty`.
    /// Removes the key if `f` leaves the set empty.
    fn write_set<R>(&self, key: &[u8], empty: R, f: impl FnOnce(&mut SortedSet) -> R) -> Result<R> {
        self.expiry.check_ttl(key)?;
        let _guard = self.locks.lock(key)?;
        let Some(set) = self.sorted_set(key)? else {
            return Ok(empty);
        };

        let (result, emptied) = {
            let mut set = set.write();
            let result = f(&mut set);
            (result, set.is_empty())
        };
        if emptied {
            self.remove_key(key)?;
        }
        Ok(result)
    }

    /// The set at `key`, or a new unstored one flagged `true`. The caller
    /// holds the key's write lock.
    fn sorted_set_or_new(&self, key: &[u8]) -> Result<(Arc<RwLock<SortedSet>>, bool)> {
        Ok(match self.sorted_set(key)? {
            Some(set) => (set, false),
            None => (Arc::new(RwLock::new(self.new_sorted_set())), true),
        })
    }

    /// Lazily expires `dest` and `keys`, returning all of them for locking.
    fn check_all<'a>(&self, dest: &'a [u8], keys: &[&'a [u8]]) -> Result<Vec<&'a [u8]>> {
        let mut all = keys.to_vec();
        all.push(dest);
        for key in &all {
            self.expiry.check_ttl(key)?;
        }
        Ok(all)
    }

    fn diff_locked(&self, keys: &[&[u8]]) -> Result<SortedSet> {
        let mut result = self.new_sorted_set();
        let Some((first, rest)) = keys.split_first() else {
            return Ok(result);
        };
        let Some(first) = self.sorted_set(first)? else {
            return Ok(result);
        };
        let others = rest
            .iter()
            .map(|key| self.sorted_set(key))
            .collect::<Result<Vec<_>>>()?;

        let first = first.read();
        let others: Vec<_> = others.iter().flatten().map(|set| set.read()).collect();
        result.add(
            first
                .iter()
                .filter(|(member, _)| others.iter().all(|other| !other.contains(member)))
                .map(|(member, score)| (score, member.clone())),
        );
        Ok(result)
    }

    fn combine_locked(
        &self,
        keys: &[&[u8]],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
        intersect: bool,
    ) -> Result<SortedSet> {
        let weights = match weights {
            Some(weights) if weights.len() != keys.len() => return Err(EngineError::SyntaxError),
            Some(weights) if weights.iter().any(|w| w.is_nan()) => return Err(EngineError::NotAFloat),
            Some(weights) => weights.to_vec(),
            None => vec![1.0; keys.len()],
        };
        let sets = keys
            .iter()
            .map(|key| self.sorted_set(key))
            .collect::<Result<Vec<_>>>()?;
        let weigh = |score: f64, weight: f64| zero_if_nan(score * weight);

        let mut scores: HashMap<Bytes, f64> = HashMap::new();
        if intersect {
            let Some(sets) = sets.into_iter().collect::<Option<Vec<_>>>() else {
                return Ok(self.new_sorted_set());
            };
            let guards: Vec<_> = sets.iter().map(|set| set.read()).collect();
            if let Some((first, rest)) = guards.split_first() {
                'members: for (member, score) in first.iter() {
                    let mut total = weigh(score, weights[0]);
                    for (other, weight) in rest.iter().zip(&weights[1..]) {
                        match other.score(member) {
                            Some(score) => total = aggregate.apply(total, weigh(score, *weight)),
                            None => continue 'members,
                        }
                    }
                    scores.insert(member.clone(), total);
                }
            }
        } else {
            for (set, weight) in sets.iter().zip(&weights) {
                let Some(set) = set else { continue };
                for (member, score) in set.read().iter() {
                    let weighted = weigh(score, *weight);
                    scores
                        .entry(member.clone())
                        .and_modify(|total| *total = aggregate.apply(*total, weighted))
                        .or_insert(weighted);
                }
            }
        }

        let mut result = self.new_sorted_set();
        result.add(scores.into_iter().map(|(member, score)| (score, member)));
        Ok(result)
    }

    /// Replaces `dest` with `result`, dropping any TTL. An empty result
    /// deletes `dest`. The caller holds `dest`'s write lock.
    fn store_locked(&self, dest: &[u8], result: SortedSet) -> Result<usize> {
        self.remove_key(dest)?;
        let len = result.len();
        if len > 0 {
            self.data.set(Bytes::copy_from_slice(dest), Value::sorted_set(result))?;
        }
        Ok(len)
    }
}

/// Borrows every key as a byte slice. At least one key is required.
fn as_slices<K: AsRef<[u8]>>(keys: &[K]) -> Result<Vec<&[u8]>> {
    if keys.is_empty() {
        return Err(EngineError::SyntaxError);
    }
    Ok(keys.iter().map(|key| key.as_ref()).collect())
}
