//! Closed/open interval value type, endpoint ordering, and relation
//! classification over a bare `f64` timeline.

use std::cmp::Ordering;
use std::fmt::Display;

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which end of an interval an [`Endpoint`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    Low,
    High,
}

/// A value-plus-side pair with closedness, ordered so that two intervals
/// meeting at a point compare consistently with their [`Relation`].
///
/// Ordering: smaller value first; at equal value, a closed-low endpoint
/// precedes an open endpoint (either side), which precedes a closed-high
/// endpoint.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Endpoint {
    pub value: f64,
    pub side: Side,
    pub closed: bool,
}

impl Endpoint {
    pub const fn new(value: f64, side: Side, closed: bool) -> Self {
        Self {
            value,
            side,
            closed,
        }
    }

    /// Tie-break rank at equal value: closed-low=0, open=1, closed-high=2.
    fn rank(&self) -> u8 {
        match (self.side, self.closed) {
            (Side::Low, true) => 0,
            (Side::High, true) => 2,
            _ => 1,
        }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.side == other.side && self.closed == other.closed
    }
}

impl Eq for Endpoint {}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.total_cmp(&other.value).then(self.rank().cmp(&other.rank()))
    }
}

/// The reduced Allen-style relation set this crate classifies cue intervals
/// against a query interval with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Relation {
    Equals,
    OverlapLeft,
    OverlapRight,
    Covered,
    Covers,
    OutsideLeft,
    OutsideRight,
}

bitflags! {
    /// A set of [`Relation`]s, used as a query mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RelationSet: u8 {
        const EQUALS = 0b0000_0001;
        const OVERLAP_LEFT = 0b0000_0010;
        const OVERLAP_RIGHT = 0b0000_0100;
        const COVERED = 0b0000_1000;
        const COVERS = 0b0001_0000;
        const OUTSIDE_LEFT = 0b0010_0000;
        const OUTSIDE_RIGHT = 0b0100_0000;
    }
}

impl RelationSet {
    /// `INSIDE = {COVERED, EQUALS}` (spec §4.3).
    pub const INSIDE: RelationSet =
        RelationSet::from_bits_truncate(RelationSet::COVERED.bits() | RelationSet::EQUALS.bits());

    /// `PARTIAL = INSIDE ∪ {OVERLAP_LEFT, OVERLAP_RIGHT}`.
    pub const PARTIAL: RelationSet = RelationSet::from_bits_truncate(
        RelationSet::INSIDE.bits()
            | RelationSet::OVERLAP_LEFT.bits()
            | RelationSet::OVERLAP_RIGHT.bits(),
    );

    /// `OVERLAP = PARTIAL ∪ {COVERS}`.
    pub const OVERLAP: RelationSet =
        RelationSet::from_bits_truncate(RelationSet::PARTIAL.bits() | RelationSet::COVERS.bits());

    pub fn single(relation: Relation) -> RelationSet {
        match relation {
            Relation::Equals => RelationSet::EQUALS,
            Relation::OverlapLeft => RelationSet::OVERLAP_LEFT,
            Relation::OverlapRight => RelationSet::OVERLAP_RIGHT,
            Relation::Covered => RelationSet::COVERED,
            Relation::Covers => RelationSet::COVERS,
            Relation::OutsideLeft => RelationSet::OUTSIDE_LEFT,
            Relation::OutsideRight => RelationSet::OUTSIDE_RIGHT,
        }
    }

    pub fn has(&self, relation: Relation) -> bool {
        self.contains(RelationSet::single(relation))
    }
}

/// A closed or half-open/open interval `[low, high]` over `f64`.
///
/// Singular iff `low == high`, in which case both sides must be closed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval {
    low: f64,
    high: f64,
    low_closed: bool,
    high_closed: bool,
}

impl Interval {
    /// Creates an interval.
    ///
    /// # Panics
    ///
    /// Panics if `low > high`, or if `low == high` and either side is open
    /// (a singular interval must be closed on both sides).
    pub fn new(low: f64, high: f64, low_closed: bool, high_closed: bool) -> Self {
        assert!(low <= high, "Interval low must be <= high");
        assert!(
            low != high || (low_closed && high_closed),
            "a singular interval must be closed on both sides"
        );
        Self {
            low,
            high,
            low_closed,
            high_closed,
        }
    }

    /// Creates a closed interval `[low, high]`.
    pub fn closed(low: f64, high: f64) -> Self {
        Self::new(low, high, true, true)
    }

    /// Creates a singular (point) interval `[value, value]`.
    pub fn singular_at(value: f64) -> Self {
        Self::new(value, value, true, true)
    }

    pub const fn low(&self) -> f64 {
        self.low
    }

    pub const fn high(&self) -> f64 {
        self.high
    }

    pub const fn low_closed(&self) -> bool {
        self.low_closed
    }

    pub const fn high_closed(&self) -> bool {
        self.high_closed
    }

    pub fn length(&self) -> f64 {
        self.high - self.low
    }

    pub const fn singular(&self) -> bool {
        self.low == self.high
    }

    /// The low endpoint of this interval.
    pub const fn endpoint_low(&self) -> Endpoint {
        Endpoint::new(self.low, Side::Low, self.low_closed)
    }

    /// The high endpoint of this interval. For a singular interval this
    /// coincides in value with `endpoint_low`.
    pub const fn endpoint_high(&self) -> Endpoint {
        Endpoint::new(self.high, Side::High, self.high_closed)
    }

    /// Returns true if `value` lies within this interval, respecting
    /// closedness at the touched bound.
    pub fn covers(&self, value: f64) -> bool {
        let low_ok = if self.low_closed {
            value >= self.low
        } else {
            value > self.low
        };
        let high_ok = if self.high_closed {
            value <= self.high
        } else {
            value < self.high
        };
        low_ok && high_ok
    }

    /// Returns true if `endpoint`'s value lies within this interval, with
    /// closedness resolved using endpoint ordering so that touching
    /// endpoints of matching closedness compare as inside.
    pub fn inside(&self, endpoint: Endpoint) -> bool {
        endpoint >= self.endpoint_low() && endpoint <= self.endpoint_high()
    }

    pub fn equals(&self, other: &Interval) -> bool {
        self.low == other.low
            && self.high == other.high
            && self.low_closed == other.low_closed
            && self.high_closed == other.high_closed
    }

    /// Returns true if `self`'s high bound and `low`/`low_closed` share no
    /// point, i.e. `self` lies strictly before that bound.
    fn ends_before(&self, low: f64, low_closed: bool) -> bool {
        self.high < low || (self.high == low && !(self.high_closed && low_closed))
    }

    /// Classifies `self` against `query` by comparing the two intervals'
    /// endpoints. Total: always returns exactly one [`Relation`].
    pub fn compare(&self, query: &Interval) -> Relation {
        if self.equals(query) {
            return Relation::Equals;
        }

        // Disjoint checks use value + closedness directly: touching bounds
        // only overlap when both sides are closed at that shared point.
        if self.ends_before(query.low, query.low_closed) {
            return Relation::OutsideLeft;
        }
        if query.ends_before(self.low, self.low_closed) {
            return Relation::OutsideRight;
        }

        // Genuinely overlapping: use endpoint ordering, same-side pairs
        // only (low-vs-low, high-vs-high), to rank start/end dominance.
        // A tie on one side must not be folded into "strictly before/after"
        // on that side — e.g. self=[0,5] vs query=[0,10] ties on low and
        // must classify as Covered, not OverlapLeft — so containment is
        // decided from each side's `Ordering` independently rather than
        // from a single non-strict `<=`/`>=` per side.
        let low_cmp = self.endpoint_low().cmp(&query.endpoint_low());
        let high_cmp = self.endpoint_high().cmp(&query.endpoint_high());

        let starts_at_or_before = low_cmp != Ordering::Greater;
        let starts_at_or_after = low_cmp != Ordering::Less;
        let ends_at_or_after = high_cmp != Ordering::Less;
        let ends_at_or_before = high_cmp != Ordering::Greater;

        if starts_at_or_before && ends_at_or_after {
            Relation::Covers
        } else if starts_at_or_after && ends_at_or_before {
            Relation::Covered
        } else if low_cmp == Ordering::Less {
            // self starts strictly before query but ends inside it: overlaps on the left.
            Relation::OverlapLeft
        } else {
            Relation::OverlapRight
        }
    }

    /// Returns the intersection of two intervals, if any, respecting
    /// closedness.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let (low, low_closed) = match self.low.partial_cmp(&other.low)? {
            Ordering::Greater => (self.low, self.low_closed),
            Ordering::Less => (other.low, other.low_closed),
            Ordering::Equal => (self.low, self.low_closed && other.low_closed),
        };
        let (high, high_closed) = match self.high.partial_cmp(&other.high)? {
            Ordering::Less => (self.high, self.high_closed),
            Ordering::Greater => (other.high, other.high_closed),
            Ordering::Equal => (self.high, self.high_closed && other.high_closed),
        };

        if low > high {
            return None;
        }
        if low == high && !(low_closed && high_closed) {
            return None;
        }
        Some(Interval::new(low, high, low_closed, high_closed))
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{:.3}, {:.3}{}",
            if self.low_closed { "[" } else { "(" },
            self.low,
            self.high,
            if self.high_closed { "]" } else { ")" }
        )
    }
}
