//! Sharded bucket collection with a primary cue map, batched `update`, and
//! change notifications (spec.md §4.4).

mod error;

pub use error::AxisError;

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;
use std::cell::RefCell;

use crate::bucket::CueBucket;
use crate::cue::{BatchEntry, Cue, CueDelta, CueHandle, Delta};
use crate::events::{CallbackRegistry, Handle};
use crate::interval::{Interval, RelationSet};

/// Ascending bucket length caps; the last entry must be `f64::INFINITY`.
#[derive(Debug, Clone)]
pub struct AxisConfig {
    pub bucket_caps: Vec<f64>,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            bucket_caps: vec![10.0, 100.0, 1e3, 1e4, 1e5, f64::INFINITY],
        }
    }
}

fn caps_are_canonical(caps: &[f64]) -> bool {
    !caps.is_empty()
        && caps.last() == Some(&f64::INFINITY)
        && caps.windows(2).all(|w| w[0] < w[1])
}

/// `options.check` / `options.equals` from spec §4.4's `update`.
pub struct UpdateOptions<V> {
    pub check: bool,
    pub equals: Option<fn(&V, &V) -> bool>,
}

impl<V> Default for UpdateOptions<V> {
    fn default() -> Self {
        Self {
            check: false,
            equals: None,
        }
    }
}

/// The three named query semantics spec §4.3 maps to `RelationSet`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    Inside,
    Partial,
    Overlap,
}

impl Semantic {
    pub fn relation_set(self) -> RelationSet {
        match self {
            Semantic::Inside => RelationSet::INSIDE,
            Semantic::Partial => RelationSet::PARTIAL,
            Semantic::Overlap => RelationSet::OVERLAP,
        }
    }
}

/// `key -> {new, old, delta}` result of an `update`/`removeCuesByInterval`
/// call (spec §4.4/§9).
pub type BatchMap<K, V> = HashMap<K, BatchEntry<K, V>>;

fn delta_for_interval(before: Option<Interval>, after: Option<Interval>) -> Delta {
    match (before, after) {
        (None, None) => Delta::Noop,
        (None, Some(_)) => Delta::Insert,
        (Some(_), None) => Delta::Delete,
        (Some(a), Some(b)) => {
            if a == b {
                Delta::Noop
            } else {
                Delta::Replace
            }
        }
    }
}

fn delta_for_data<V: PartialEq>(
    before: Option<&V>,
    after: Option<&V>,
    equals: Option<fn(&V, &V) -> bool>,
) -> Delta {
    match (before, after) {
        (None, None) => Delta::Noop,
        (None, Some(_)) => Delta::Insert,
        (Some(_), None) => Delta::Delete,
        (Some(a), Some(b)) => {
            let equal = match equals {
                Some(f) => f(a, b),
                None => a == b,
            };
            if equal {
                Delta::Noop
            } else {
                Delta::Replace
            }
        }
    }
}

/// A sharded collection of [`CueBucket`]s plus the authoritative
/// `key -> cue` map (spec §3's Axis state).
pub struct Axis<K, V> {
    config: AxisConfig,
    cues: HashMap<K, CueHandle<K, V>>,
    buckets: Vec<CueBucket<K, V>>,
    change_callbacks: CallbackRegistry<dyn FnMut(&BatchMap<K, V>)>,
}

impl<K, V> Axis<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Debug + PartialEq,
{
    pub fn new() -> Self {
        Self::with_config(AxisConfig::default())
    }

    pub fn with_config(config: AxisConfig) -> Self {
        debug_assert!(
            caps_are_canonical(&config.bucket_caps),
            "bucket caps must be strictly ascending and end in f64::INFINITY"
        );
        let buckets = config.bucket_caps.iter().map(|&cap| CueBucket::new(cap)).collect();
        Self {
            config,
            cues: HashMap::new(),
            buckets,
            change_callbacks: CallbackRegistry::new(),
        }
    }

    fn bucket_index_for_length(&self, length: f64) -> usize {
        self.config
            .bucket_caps
            .iter()
            .position(|&cap| length <= cap)
            .unwrap_or(self.buckets.len() - 1)
    }

    /// Registers `handler` to be called with every `update`/
    /// `removeCuesByInterval` batch map. Returns a handle for
    /// [`Axis::remove_change_callback`].
    pub fn add_callback(&mut self, handler: Box<dyn FnMut(&BatchMap<K, V>)>) -> Handle {
        self.change_callbacks.add(handler)
    }

    pub fn del_callback(&mut self, handle: Handle) -> bool {
        self.change_callbacks.remove(handle)
    }

    /// Applies a batch of cue insert/replace/delete operations
    /// transactionally, returning the resulting batch map (spec §4.4).
    ///
    /// Abort-before-mutation (spec §4.6): with `options.check` set, the
    /// input is validated before any mutation — Rust's type system already
    /// rejects a missing key or a non-`Interval` value, so there is
    /// currently nothing left for this pass to reject; it exists for API
    /// parity with the spec's contract and as a hook for future checks.
    pub fn update(
        &mut self,
        cues: impl IntoIterator<Item = Cue<K, V>>,
        options: &UpdateOptions<V>,
    ) -> Result<BatchMap<K, V>, AxisError> {
        let items: Vec<Cue<K, V>> = cues.into_iter().collect();
        if options.check {
            // see doc comment above: no runtime-checkable condition exists today.
        }

        let mut batch: BatchMap<K, V> = HashMap::new();
        let mut pre_batch_old: HashMap<K, Option<Cue<K, V>>> = HashMap::new();

        let mut inserted = 0usize;
        let mut replaced = 0usize;
        let mut deleted = 0usize;

        for item in items {
            let key = item.key.clone();
            if !pre_batch_old.contains_key(&key) {
                let snapshot = self.cues.get(&key).map(|h| h.borrow().clone());
                pre_batch_old.insert(key.clone(), snapshot);
            }

            let current = self.cues.get(&key).map(|h| h.borrow().clone());
            let before_interval = current.as_ref().and_then(|c| c.interval);
            let before_data = current.as_ref().and_then(|c| c.data.clone());

            // A delete is an omission in the *raw* input, not in the
            // merged result: `item.is_tombstone()` must be checked before
            // the omitted-field-preserves-current merge below, or a
            // `{interval: None, data: None}` delete request for an
            // existing cue resolves straight back to its current state
            // and never reaches the delete path.
            let is_delete = item.is_tombstone();
            let (resolved_interval, resolved_data) = if is_delete {
                (None, None)
            } else {
                (item.interval.or(before_interval), item.data.or_else(|| before_data.clone()))
            };

            let interval_delta = delta_for_interval(before_interval, resolved_interval);
            let data_delta = delta_for_data(before_data.as_ref(), resolved_data.as_ref(), options.equals);

            if interval_delta == Delta::Noop && data_delta == Delta::Noop {
                let new_snapshot = current.clone();
                Self::record_new(&mut batch, &pre_batch_old, &key, new_snapshot);
                continue;
            }

            let remove_needed = matches!(interval_delta, Delta::Replace | Delta::Delete);
            let add_needed = matches!(interval_delta, Delta::Insert | Delta::Replace);

            if remove_needed {
                if let Some(old_interval) = before_interval {
                    let old_bucket = self.bucket_index_for_length(old_interval.length());
                    self.buckets[old_bucket].remove(old_interval.low(), &key);
                    if !old_interval.singular() {
                        self.buckets[old_bucket].remove(old_interval.high(), &key);
                    }
                }
            }

            let handle = if let Some(existing) = self.cues.get(&key).cloned() {
                {
                    let mut cue_mut = existing.borrow_mut();
                    cue_mut.interval = resolved_interval;
                    cue_mut.data = resolved_data.clone();
                }
                if is_delete {
                    self.cues.remove(&key);
                    deleted += 1;
                } else {
                    replaced += 1;
                }
                existing
            } else {
                // `is_delete` on a key with no current cue would have made
                // both deltas `Noop` above (before/after both `None`) and
                // already hit the early return, so reaching here always
                // means an insert.
                let new_handle: CueHandle<K, V> =
                    Rc::new(RefCell::new(Cue::new(key.clone(), resolved_interval, resolved_data.clone())));
                self.cues.insert(key.clone(), new_handle.clone());
                inserted += 1;
                new_handle
            };

            if add_needed {
                if let Some(new_interval) = resolved_interval {
                    let new_bucket = self.bucket_index_for_length(new_interval.length());
                    self.buckets[new_bucket].add(new_interval.low(), key.clone(), handle.clone());
                    if !new_interval.singular() {
                        self.buckets[new_bucket].add(new_interval.high(), key.clone(), handle.clone());
                    }
                }
            }

            let new_snapshot = if is_delete { None } else { Some(handle.borrow().clone()) };
            Self::record_new(&mut batch, &pre_batch_old, &key, new_snapshot);
        }

        for bucket in &mut self.buckets {
            bucket.flush();
        }

        for entry in batch.values_mut() {
            let before_interval = entry.old.as_ref().and_then(|c| c.interval);
            let after_interval = entry.new.as_ref().and_then(|c| c.interval);
            let before_data = entry.old.as_ref().and_then(|c| c.data.as_ref());
            let after_data = entry.new.as_ref().and_then(|c| c.data.as_ref());
            entry.delta = CueDelta {
                interval: delta_for_interval(before_interval, after_interval),
                data: delta_for_data(before_data, after_data, options.equals),
            };
        }

        tracing::debug!(inserted, replaced, deleted, "axis update");

        for cb in self.change_callbacks.iter_mut() {
            cb(&batch);
        }

        Ok(batch)
    }

    /// Records/overwrites `batch[key].new`, preserving `old` from the
    /// pre-batch snapshot the first time `key` is seen (spec §4.4 batch-map
    /// contract, testable property #6).
    fn record_new(
        batch: &mut BatchMap<K, V>,
        pre_batch_old: &HashMap<K, Option<Cue<K, V>>>,
        key: &K,
        new_snapshot: Option<Cue<K, V>>,
    ) {
        batch
            .entry(key.clone())
            .and_modify(|e| e.new = new_snapshot.clone())
            .or_insert_with(|| BatchEntry {
                new: new_snapshot,
                old: pre_batch_old.get(key).cloned().flatten(),
                delta: CueDelta::default(),
            });
    }

    fn dispatch_lookup(&self, interval: &Interval, mode: RelationSet) -> Vec<Cue<K, V>> {
        self.buckets.iter().flat_map(|b| b.lookup(interval, mode)).collect()
    }

    /// `lookup(interval, mode)` — all cues across every bucket whose
    /// relation to `interval` is in `mode`.
    pub fn lookup(&self, interval: &Interval, mode: RelationSet) -> Vec<Cue<K, V>> {
        self.dispatch_lookup(interval, mode)
    }

    /// `getCuesByInterval(interval, semantic=OVERLAP)`.
    pub fn get_cues_by_interval(&self, interval: &Interval, semantic: Option<Semantic>) -> Vec<Cue<K, V>> {
        let mode = semantic.unwrap_or(Semantic::Overlap).relation_set();
        self.dispatch_lookup(interval, mode)
    }

    /// `getCuePointsByInterval(interval)`.
    pub fn get_cue_points_by_interval(&self, interval: &Interval) -> Vec<(f64, Cue<K, V>)> {
        self.buckets.iter().flat_map(|b| b.lookup_points(interval)).collect()
    }

    /// `removeCuesByInterval(interval, semantic=INSIDE)`. Per spec §9's
    /// design note, the returned batch map carries only `{old: cue}`
    /// entries (no `new`, since the cue no longer exists).
    pub fn remove_cues_by_interval(&mut self, interval: &Interval, semantic: Option<Semantic>) -> BatchMap<K, V> {
        let mode = semantic.unwrap_or(Semantic::Inside).relation_set();
        let mut batch: BatchMap<K, V> = HashMap::new();

        for bucket in &mut self.buckets {
            for cue in bucket.lookup_remove(interval, mode) {
                self.cues.remove(&cue.key);
                let data_delta = if cue.data.is_some() { Delta::Delete } else { Delta::Noop };
                batch.insert(
                    cue.key.clone(),
                    BatchEntry {
                        new: None,
                        old: Some(cue),
                        delta: CueDelta {
                            interval: Delta::Delete,
                            data: data_delta,
                        },
                    },
                );
            }
        }

        tracing::debug!(removed = batch.len(), "axis removeCuesByInterval");
        for cb in self.change_callbacks.iter_mut() {
            cb(&batch);
        }
        batch
    }

    pub fn clear(&mut self) {
        self.cues.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    pub fn has(&self, key: &K) -> bool {
        self.cues.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<Cue<K, V>> {
        self.cues.get(key).map(|h| h.borrow().clone())
    }

    pub fn keys(&self) -> Vec<K> {
        self.cues.keys().cloned().collect()
    }

    pub fn cues(&self) -> Vec<Cue<K, V>> {
        self.cues.values().map(|h| h.borrow().clone()).collect()
    }

    pub fn size(&self) -> usize {
        self.cues.len()
    }
}

impl<K, V> Default for Axis<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Debug + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
