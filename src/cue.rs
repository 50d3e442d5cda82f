//! The [`Cue`] record type and the in-place mutation handle buckets and
//! the [`crate::axis::Axis`] share for it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::interval::Interval;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A keyed record associated with an optional interval and optional
/// payload. A cue with both fields absent is a tombstone and is never
/// actually stored — [`crate::axis::Axis::update`] treats it as a delete.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cue<K, V> {
    pub key: K,
    pub interval: Option<Interval>,
    pub data: Option<V>,
}

impl<K, V> Cue<K, V> {
    pub fn new(key: K, interval: Option<Interval>, data: Option<V>) -> Self {
        Self {
            key,
            interval,
            data,
        }
    }

    /// A cue with neither an interval nor data is a delete request.
    pub fn is_tombstone(&self) -> bool {
        self.interval.is_none() && self.data.is_none()
    }
}

/// A shared, mutable handle to a stored cue.
///
/// Single-threaded per spec: `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>`.
/// Every [`crate::bucket::CueBucket`] that indexes a cue's endpoints holds
/// a clone of this same handle, so a `REPLACE` mutation made through the
/// [`crate::axis::Axis`]'s cue map is visible to every bucket without
/// reinsertion — and, per spec's documented hazard, to any consumer that
/// kept a cloned handle from a previous `change` batch.
pub type CueHandle<K, V> = Rc<RefCell<Cue<K, V>>>;

/// One independent component of a cue's composite delta: did its interval
/// (or data) get inserted, replaced, deleted, or left untouched by an
/// `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Delta {
    #[default]
    Noop,
    Insert,
    Replace,
    Delete,
}

/// The composite delta for a single cue within an `update` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CueDelta {
    pub interval: Delta,
    pub data: Delta,
}

impl CueDelta {
    pub fn is_noop(&self) -> bool {
        self.interval == Delta::Noop && self.data == Delta::Noop
    }
}

/// One entry of an `update` batch's result map: the cue's state before and
/// after the call, plus the delta that produced the transition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchEntry<K, V> {
    pub new: Option<Cue<K, V>>,
    pub old: Option<Cue<K, V>>,
    pub delta: CueDelta,
}
