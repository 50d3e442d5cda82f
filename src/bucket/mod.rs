//! Length-bounded partition of cues enabling efficient interval-relation
//! queries: a map from timeline point to the cues referencing that point
//! as an endpoint, backed by an [`EndpointIndex`] for range lookup.

mod error;

pub use error::BucketError;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::cue::{Cue, CueHandle};
use crate::float_key::FloatKey;
use crate::index::EndpointIndex;
use crate::interval::{Interval, Relation, RelationSet};

/// Diagnostic snapshot returned by [`CueBucket::integrity`].
#[derive(Debug, Clone, PartialEq)]
pub struct BucketIntegrity {
    pub cap: f64,
    pub point_count: usize,
    pub index_point_count: usize,
    pub cue_count: usize,
}

/// A length-bounded container: `point -> cues referencing that point`,
/// plus an [`EndpointIndex`] kept in sync on [`CueBucket::flush`].
#[derive(Debug, Clone)]
pub struct CueBucket<K, V> {
    cap: f64,
    points: BTreeMap<FloatKey, Vec<(K, CueHandle<K, V>)>>,
    index: EndpointIndex,
    /// Points touched (added to or removed from) since the last flush.
    dirty_points: BTreeSet<FloatKey>,
    /// Of `dirty_points`, those that already had entries before this
    /// batch started — used at flush time to tell a genuinely new point
    /// (needs inserting into the index) from one that was merely mutated
    /// (already indexed, or emptied and needs removing).
    pre_batch_existing: BTreeSet<FloatKey>,
}

impl<K, V> CueBucket<K, V>
where
    K: Eq + Clone + Debug,
    V: Clone + Debug,
{
    pub fn new(cap: f64) -> Self {
        Self {
            cap,
            points: BTreeMap::new(),
            index: EndpointIndex::new(),
            dirty_points: BTreeSet::new(),
            pre_batch_existing: BTreeSet::new(),
        }
    }

    pub fn cap(&self) -> f64 {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.values().map(|v| v.len()).sum()
    }

    fn mark_dirty(&mut self, fk: FloatKey) {
        if self.dirty_points.insert(fk) && self.points.contains_key(&fk) {
            self.pre_batch_existing.insert(fk);
        }
    }

    /// Buffers `key`'s membership at `point`. A no-op if `key` is already
    /// present there.
    pub fn add(&mut self, point: f64, key: K, handle: CueHandle<K, V>) {
        let fk = FloatKey(point);
        self.mark_dirty(fk);
        let entry = self.points.entry(fk).or_default();
        if entry.iter().any(|(k, _)| k == &key) {
            return;
        }
        entry.push((key, handle));
    }

    /// Buffers removal of `key`'s membership at `point`. A no-op if
    /// `point` or `key` is not present. Returns `true` if the point's list
    /// became empty as a result.
    pub fn remove(&mut self, point: f64, key: &K) -> bool {
        let fk = FloatKey(point);
        let was_present = self
            .points
            .get(&fk)
            .is_some_and(|cues| cues.iter().any(|(k, _)| k == key));
        if !was_present {
            return false;
        }
        self.mark_dirty(fk);
        let entry = self.points.get_mut(&fk).expect("checked present above");
        entry.retain(|(k, _)| k != key);
        entry.is_empty()
    }

    /// Reconciles staged `add`/`remove` calls into the point map (dropping
    /// entries that ended up empty) and issues one batched
    /// [`EndpointIndex::update`].
    pub fn flush(&mut self) {
        if self.dirty_points.is_empty() {
            return;
        }
        let mut to_insert = Vec::new();
        let mut to_remove = Vec::new();

        for fk in std::mem::take(&mut self.dirty_points) {
            let now_empty = self.points.get(&fk).is_none_or(|v| v.is_empty());
            if now_empty {
                self.points.remove(&fk);
                if self.pre_batch_existing.contains(&fk) {
                    to_remove.push(fk.value());
                }
            } else if !self.pre_batch_existing.contains(&fk) {
                to_insert.push(fk.value());
            }
        }
        self.pre_batch_existing.clear();

        tracing::debug!(
            cap = self.cap,
            inserted = to_insert.len(),
            removed = to_remove.len(),
            "bucket flush"
        );
        self.index.update(&to_remove, &to_insert);
    }

    /// Resets all state.
    pub fn clear(&mut self) {
        self.points.clear();
        self.index.clear();
        self.dirty_points.clear();
        self.pre_batch_existing.clear();
    }

    /// Runs `lookup` with `mode` and removes every matching cue from the
    /// bucket (both endpoints, if it has two), then flushes once.
    pub fn lookup_remove(&mut self, interval: &Interval, mode: RelationSet) -> Vec<Cue<K, V>>
    where
        K: Hash,
    {
        let found = self.lookup(interval, mode);
        for cue in &found {
            if let Some(civ) = cue.interval {
                self.remove(civ.low(), &cue.key);
                if !civ.singular() {
                    self.remove(civ.high(), &cue.key);
                }
            }
        }
        self.flush();
        found
    }

    /// Returns all cues in this bucket whose relation to `interval` is in
    /// `mode`. See spec §4.3 for the three-part strategy.
    pub fn lookup(&self, interval: &Interval, mode: RelationSet) -> Vec<Cue<K, V>>
    where
        K: Hash,
    {
        if mode == RelationSet::EQUALS {
            return self.lookup_equals_fast(interval);
        }

        let mut seen: HashSet<K> = HashSet::new();
        let mut results = Vec::new();

        const NON_COVERS: RelationSet = RelationSet::from_bits_truncate(
            RelationSet::EQUALS.bits()
                | RelationSet::OVERLAP_LEFT.bits()
                | RelationSet::OVERLAP_RIGHT.bits()
                | RelationSet::COVERED.bits(),
        );
        if mode.intersects(NON_COVERS) {
            let closed_query = Interval::closed(interval.low(), interval.high());
            for &point in self.index.lookup(&closed_query) {
                let Some(cues) = self.points.get(&FloatKey(point)) else {
                    continue;
                };
                for (key, handle) in cues {
                    if seen.contains(key) {
                        continue;
                    }
                    let snapshot = handle.borrow().clone();
                    let Some(civ) = snapshot.interval else {
                        continue;
                    };
                    let relation = civ.compare(interval);
                    if mode.has(relation) {
                        seen.insert(key.clone());
                        results.push(snapshot);
                    }
                }
            }
        }

        if mode.contains(RelationSet::COVERS) && interval.length() <= self.cap {
            let search_low = interval.high() - self.cap;
            let search_range = Interval::closed(search_low, interval.low());
            for &point in self.index.lookup(&search_range) {
                let Some(cues) = self.points.get(&FloatKey(point)) else {
                    continue;
                };
                for (key, handle) in cues {
                    if seen.contains(key) {
                        continue;
                    }
                    let snapshot = handle.borrow().clone();
                    let Some(civ) = snapshot.interval else {
                        continue;
                    };
                    if civ.low() != point {
                        // Only low-endpoint entries are candidates (left-side convention).
                        continue;
                    }
                    if civ.compare(interval) == Relation::Covers {
                        seen.insert(key.clone());
                        results.push(snapshot);
                    }
                }
            }
        }

        results
    }

    fn lookup_equals_fast(&self, interval: &Interval) -> Vec<Cue<K, V>>
    where
        K: Hash,
    {
        let Some(cues) = self.points.get(&FloatKey(interval.low())) else {
            return Vec::new();
        };
        cues.iter()
            .filter_map(|(_, handle)| {
                let snapshot = handle.borrow().clone();
                match snapshot.interval {
                    Some(civ) if civ.equals(interval) => Some(snapshot),
                    _ => None,
                }
            })
            .collect()
    }

    /// Returns `(point, cue)` pairs where `point` is an endpoint of `cue`
    /// and at least one endpoint of `cue` lies inside `interval` (by
    /// endpoint ordering).
    pub fn lookup_points(&self, interval: &Interval) -> Vec<(f64, Cue<K, V>)>
    where
        K: Hash,
    {
        let closed = Interval::closed(interval.low(), interval.high());
        let mut qualifying: Vec<(K, CueHandle<K, V>, Interval)> = Vec::new();
        let mut seen: HashSet<K> = HashSet::new();

        for &point in self.index.lookup(&closed) {
            let Some(cues) = self.points.get(&FloatKey(point)) else {
                continue;
            };
            for (key, handle) in cues {
                if seen.contains(key) {
                    continue;
                }
                let civ = match handle.borrow().interval {
                    Some(civ) => civ,
                    None => continue,
                };
                let low_in = interval.inside(civ.endpoint_low());
                let high_in = !civ.singular() && interval.inside(civ.endpoint_high());
                if low_in || high_in {
                    seen.insert(key.clone());
                    qualifying.push((key.clone(), handle.clone(), civ));
                }
            }
        }

        let mut out = Vec::with_capacity(qualifying.len() * 2);
        for (_, handle, civ) in qualifying {
            let snapshot = handle.borrow().clone();
            out.push((civ.low(), snapshot.clone()));
            if !civ.singular() {
                out.push((civ.high(), snapshot));
            }
        }
        out
    }

    /// Diagnostic: validates invariants (a) every indexed point has a
    /// non-empty cue list and the key-sets of the point map and the index
    /// agree, and returns a snapshot. Raises [`BucketError`] if violated.
    pub fn integrity(&self) -> Result<BucketIntegrity, BucketError> {
        let index_points: BTreeSet<FloatKey> =
            self.index.values().iter().copied().map(FloatKey).collect();
        let map_points: BTreeSet<FloatKey> = self.points.keys().copied().collect();

        if index_points != map_points {
            tracing::warn!(
                cap = self.cap,
                "bucket integrity violated: index/point-map key sets differ"
            );
            return Err(BucketError::InvariantViolation(
                "EndpointIndex points and point-map keys differ".to_string(),
            ));
        }
        for (fk, cues) in &self.points {
            if cues.is_empty() {
                tracing::warn!(cap = self.cap, point = fk.value(), "empty point entry");
                return Err(BucketError::InvariantViolation(format!(
                    "point {} has an empty cue list",
                    fk.value()
                )));
            }
        }

        Ok(BucketIntegrity {
            cap: self.cap,
            point_count: self.points.len(),
            index_point_count: self.index.length(),
            cue_count: self.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn handle(key: u32, interval: Interval) -> CueHandle<u32, &'static str> {
        Rc::new(RefCell::new(Cue::new(key, Some(interval), Some("payload"))))
    }

    fn bucket_with(entries: &[(u32, Interval)]) -> CueBucket<u32, &'static str> {
        let mut bucket = CueBucket::new(100.0);
        for &(key, civ) in entries {
            let h = handle(key, civ);
            bucket.add(civ.low(), key, h.clone());
            if !civ.singular() {
                bucket.add(civ.high(), key, h);
            }
        }
        bucket.flush();
        bucket
    }

    #[test]
    fn add_remove_flush_updates_index() {
        let mut bucket: CueBucket<u32, &'static str> = CueBucket::new(100.0);
        let h = handle(1, Interval::closed(0.0, 10.0));
        bucket.add(0.0, 1, h.clone());
        bucket.add(10.0, 1, h);
        bucket.flush();

        assert_eq!(bucket.len(), 2);
        assert!(bucket.integrity().is_ok());

        assert!(bucket.remove(0.0, &1));
        assert!(bucket.remove(10.0, &1));
        bucket.flush();
        assert!(bucket.is_empty());
        assert!(bucket.integrity().is_ok());
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut bucket: CueBucket<u32, &'static str> = CueBucket::new(100.0);
        let h = handle(1, Interval::closed(0.0, 10.0));
        bucket.add(0.0, 1, h.clone());
        bucket.add(0.0, 1, h);
        bucket.flush();
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn lookup_equals_fast_path() {
        let bucket = bucket_with(&[
            (1, Interval::closed(0.0, 10.0)),
            (2, Interval::closed(0.0, 20.0)),
        ]);
        let found = bucket.lookup(&Interval::closed(0.0, 10.0), RelationSet::EQUALS);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, 1);
    }

    #[test]
    fn lookup_overlap_finds_partial_matches() {
        let bucket = bucket_with(&[
            (1, Interval::closed(0.0, 10.0)),
            (2, Interval::closed(5.0, 15.0)),
            (3, Interval::closed(100.0, 110.0)),
        ]);
        let found = bucket.lookup(&Interval::closed(0.0, 10.0), RelationSet::OVERLAP);
        let mut keys: Vec<_> = found.iter().map(|c| c.key).collect();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn lookup_covers_respects_cap() {
        let mut small = CueBucket::new(5.0);
        let civ = Interval::closed(0.0, 10.0);
        let h = handle(1, civ);
        small.add(civ.low(), 1, h.clone());
        small.add(civ.high(), 1, h);
        small.flush();

        // query length 10 exceeds this bucket's cap of 5, so COVERS never matches here.
        let found = small.lookup(&Interval::closed(2.0, 8.0), RelationSet::single(Relation::Covers));
        assert!(found.is_empty());
    }

    #[test]
    fn lookup_points_returns_each_endpoint() {
        let bucket = bucket_with(&[(1, Interval::closed(0.0, 10.0))]);
        let mut points = bucket.lookup_points(&Interval::closed(0.0, 10.0));
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, 0.0);
        assert_eq!(points[1].0, 10.0);
    }

    #[test]
    fn lookup_remove_clears_matching_cue() {
        let mut bucket = bucket_with(&[
            (1, Interval::closed(0.0, 10.0)),
            (2, Interval::closed(100.0, 110.0)),
        ]);
        let removed = bucket.lookup_remove(&Interval::closed(0.0, 10.0), RelationSet::EQUALS);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].key, 1);
        assert_eq!(bucket.len(), 2);
        assert!(bucket.integrity().is_ok());
    }

    #[test]
    fn clear_empties_everything() {
        let mut bucket = bucket_with(&[(1, Interval::closed(0.0, 10.0))]);
        bucket.clear();
        assert!(bucket.is_empty());
        assert_eq!(bucket.integrity().unwrap().cue_count, 0);
    }
}
