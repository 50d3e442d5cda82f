//! External collaborators spec.md §1/§6 treats as out-of-scope
//! implementations but whose interfaces the core consumes directly: the
//! clock/timer primitive, the timing source's allowed range, the motion
//! vector, and the closed-form crossing-time helpers.
//!
//! This module defines the interfaces as traits/types and ships one
//! concrete, fully-tested reference implementation of each (spec.md §6
//! names these collaborators; SPEC_FULL.md §8 makes them concrete so the
//! crate is runnable standalone).

use crate::cue::Cue;
use crate::interval::{Endpoint, Interval, Side};
use std::time::Instant;

/// A monotonic clock, seconds since an arbitrary epoch.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wraps [`std::time::Instant`] as the default [`Clock`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A timing source's allowed position range. Either bound may be
/// infinite (spec §6).
pub trait TimingSource {
    fn range(&self) -> (f64, f64);
}

/// An unbounded timing source, `(-inf, +inf)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundedRange;

impl TimingSource for UnboundedRange {
    fn range(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }
}

/// A bound motion vector: position, velocity, acceleration, and the
/// timestamp at which that state was sampled (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionVector {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub timestamp: f64,
}

impl MotionVector {
    pub fn new(position: f64, velocity: f64, acceleration: f64, timestamp: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
            timestamp,
        }
    }

    /// True if any of `position`/`velocity`/`acceleration`/`timestamp` is NaN.
    pub fn has_nan(&self) -> bool {
        self.position.is_nan()
            || self.velocity.is_nan()
            || self.acceleration.is_nan()
            || self.timestamp.is_nan()
    }

    /// Evaluates `(position, velocity)` at absolute time `t`.
    pub fn at(&self, t: f64) -> (f64, f64) {
        let dt = t - self.timestamp;
        let position = self.position + self.velocity * dt + 0.5 * self.acceleration * dt * dt;
        let velocity = self.velocity + self.acceleration * dt;
        (position, velocity)
    }
}

/// One crossing of a cue's endpoint by the moving point: the exact
/// timestamp, which cue, and which endpoint.
#[derive(Debug, Clone)]
pub struct EndpointEvent<K, V> {
    pub ts_endpoint: f64,
    pub cue: Cue<K, V>,
    pub endpoint: Endpoint,
}

/// The closed-form crossing-time helpers spec §6 names:
/// `isMoving`, `calculateVector`, `getPositionInterval`,
/// `getEndpointEvents`, `getRangeIntersect`.
pub trait MotionMath {
    /// True if `v` is not at rest (velocity or acceleration nonzero).
    fn is_moving(v: &MotionVector) -> bool {
        v.velocity != 0.0 || v.acceleration != 0.0
    }

    /// Evaluates the motion vector's state at absolute time `t`, returning
    /// a new [`MotionVector`] sampled at that instant.
    fn calculate_vector(v: &MotionVector, t: f64) -> MotionVector {
        let (position, velocity) = v.at(t);
        MotionVector::new(position, velocity, v.acceleration, t)
    }

    /// The closed interval of positions the motion occupies over
    /// `time_interval`, accounting for a possible direction reversal
    /// under acceleration (the vertex of the parabola).
    fn position_interval(time_interval: &Interval, v: &MotionVector) -> Interval;

    /// For each endpoint value in `endpoints`, the earliest timestamp
    /// within `time_interval` at which the moving point crosses it
    /// (ordered, moving toward increasing or decreasing position per the
    /// sign of velocity at that instant). `pos_interval` has already
    /// narrowed `endpoints` to plausible candidates by the caller.
    fn endpoint_crossings(time_interval: &Interval, v: &MotionVector, endpoint_values: &[f64]) -> Vec<(f64, f64)>;

    /// The first time the motion leaves `range`, as `(ts_enter, ts_leave)`
    /// — `ts_leave` is `f64::INFINITY` if it never leaves.
    fn range_intersect(v: &MotionVector, range: (f64, f64)) -> (f64, f64);
}

/// Reference implementation of [`MotionMath`] for uniformly-accelerated
/// motion (the spec's "closed-form crossing solutions").
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedForm;

impl ClosedForm {
    /// Solves `p0 + v0*dt + 0.5*a*dt^2 == target` for `dt >= 0`, returning
    /// every non-negative real root in ascending order.
    fn solve_for(v: &MotionVector, target: f64) -> Vec<f64> {
        let MotionVector {
            position: p0,
            velocity: v0,
            acceleration: a,
            timestamp: t0,
        } = *v;
        let c = p0 - target;

        let mut roots = Vec::new();
        if a == 0.0 {
            if v0 == 0.0 {
                return roots;
            }
            let dt = -c / v0;
            if dt >= 0.0 {
                roots.push(dt);
            }
            return roots.into_iter().map(|dt| dt + t0).collect();
        }

        let discriminant = v0 * v0 - 2.0 * a * c;
        if discriminant < 0.0 {
            return roots;
        }
        let sqrt_d = discriminant.sqrt();
        let dt1 = (-v0 - sqrt_d) / a;
        let dt2 = (-v0 + sqrt_d) / a;
        let (lo, hi) = if dt1 <= dt2 { (dt1, dt2) } else { (dt2, dt1) };
        if lo >= 0.0 {
            roots.push(lo);
        }
        if hi >= 0.0 && hi != lo {
            roots.push(hi);
        }
        roots.into_iter().map(|dt| dt + t0).collect()
    }
}

impl MotionMath for ClosedForm {
    fn position_interval(time_interval: &Interval, v: &MotionVector) -> Interval {
        let (p_start, _) = v.at(time_interval.low());
        let (p_end, _) = v.at(time_interval.high());
        let mut lo = p_start.min(p_end);
        let mut hi = p_start.max(p_end);

        // A direction reversal (vertex of the parabola) happens at the
        // timestamp where instantaneous velocity is zero; include its
        // position if that instant falls within the window.
        if v.acceleration != 0.0 {
            let dt_vertex = -v.velocity / v.acceleration;
            let t_vertex = v.timestamp + dt_vertex;
            if t_vertex > time_interval.low() && t_vertex < time_interval.high() {
                let (p_vertex, _) = v.at(t_vertex);
                lo = lo.min(p_vertex);
                hi = hi.max(p_vertex);
            }
        }

        Interval::closed(lo, hi)
    }

    fn endpoint_crossings(
        time_interval: &Interval,
        v: &MotionVector,
        endpoint_values: &[f64],
    ) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        for &target in endpoint_values {
            for ts in Self::solve_for(v, target) {
                // Inclusive of the window's upper bound: a crossing exactly
                // at `time_interval.high()` is still "within" the window for
                // loading purposes — the window only advances past it once
                // `now` strictly exceeds that bound (spec §4.5 step 1).
                if ts >= time_interval.low() && ts <= time_interval.high() {
                    out.push((ts, target));
                }
            }
        }
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }

    fn range_intersect(v: &MotionVector, range: (f64, f64)) -> (f64, f64) {
        let (low, high) = range;
        if low == f64::NEG_INFINITY && high == f64::INFINITY {
            return (v.timestamp, f64::INFINITY);
        }

        let mut candidates = Vec::new();
        if low != f64::NEG_INFINITY {
            candidates.extend(Self::solve_for(v, low));
        }
        if high != f64::INFINITY {
            candidates.extend(Self::solve_for(v, high));
        }
        candidates.retain(|&ts| ts >= v.timestamp);
        candidates.sort_by(|a, b| a.total_cmp(b));

        let (p0, _) = v.at(v.timestamp);
        if p0 < low || p0 > high {
            return (v.timestamp, v.timestamp);
        }
        match candidates.first() {
            Some(&ts) => (v.timestamp, ts),
            None => (v.timestamp, f64::INFINITY),
        }
    }
}

/// True if `endpoint`'s value lies within `pos_interval`, treating the
/// endpoint as a plain value (closedness of `pos_interval` only, spec's
/// position-window membership test for "load" step candidates).
pub fn value_in_position_window(pos_interval: &Interval, value: f64) -> bool {
    pos_interval.covers(value)
}

/// The [`Side`] a moving point crosses an endpoint from, given the sign
/// of velocity at the crossing instant: positive velocity crosses a low
/// endpoint entering and a high endpoint leaving.
pub fn crossing_direction(velocity_sign: f64) -> Side {
    if velocity_sign >= 0.0 {
        Side::Low
    } else {
        Side::High
    }
}
