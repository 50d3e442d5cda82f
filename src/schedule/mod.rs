//! Rolling look-ahead scheduler: advances a time window driven by a motion
//! vector, loads the endpoint crossings the [`crate::axis::Axis`] reports
//! inside that window, and fires callbacks at the correct instants
//! (spec.md §4.5).

mod error;

pub use error::ScheduleError;

use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::axis::Axis;
use crate::cue::Cue;
use crate::events::{CallbackRegistry, Handle};
use crate::interval::{Endpoint, Interval, Side};
use crate::motion::{Clock, MotionMath, MotionVector, TimingSource};


/// Look-ahead window length and the tangent-detection epsilon (spec §3/§4.5).
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub lookahead: f64,
    /// Velocity magnitude below which a crossing at an acceleration vertex
    /// is treated as a tangent touch rather than a crossing.
    pub tangent_epsilon: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            lookahead: 5.0,
            tangent_epsilon: 1e-9,
        }
    }
}

/// One scheduled crossing of a cue endpoint by the moving point
/// (spec §3's `{ts_endpoint, cue, direction}`, `direction` expressed here
/// as the crossed [`Endpoint`]'s [`Side`]).
#[derive(Debug, Clone)]
pub struct ScheduleEvent<K, V> {
    pub ts_endpoint: f64,
    pub cue: Cue<K, V>,
    pub endpoint: Endpoint,
}

/// Rolling look-ahead scheduler bound to a motion vector, a clock/timing
/// source pair, and a shared [`Axis`] (spec §4.5/§6).
pub struct Schedule<K, V, C, T, M> {
    axis: Rc<RefCell<Axis<K, V>>>,
    clock: C,
    timing: T,
    config: ScheduleConfig,
    vector: Option<MotionVector>,
    time_interval: Option<Interval>,
    #[allow(dead_code)]
    pos_interval: Option<Interval>,
    queue: Vec<ScheduleEvent<K, V>>,
    minimum_ts_endpoint: f64,
    timer_armed: bool,
    callbacks: CallbackRegistry<dyn FnMut(&[ScheduleEvent<K, V>])>,
    _math: PhantomData<M>,
}

impl<K, V, C, T, M> Schedule<K, V, C, T, M>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Debug + PartialEq,
    C: Clock,
    T: TimingSource,
    M: MotionMath,
{
    pub fn new(axis: Rc<RefCell<Axis<K, V>>>, clock: C, timing: T, config: ScheduleConfig) -> Self {
        Self {
            axis,
            clock,
            timing,
            config,
            vector: None,
            time_interval: None,
            pos_interval: None,
            queue: Vec::new(),
            minimum_ts_endpoint: f64::NEG_INFINITY,
            timer_armed: false,
            callbacks: CallbackRegistry::new(),
            _math: PhantomData,
        }
    }

    pub fn add_callback(&mut self, handler: Box<dyn FnMut(&[ScheduleEvent<K, V>])>) -> Handle {
        self.callbacks.add(handler)
    }

    pub fn del_callback(&mut self, handle: Handle) -> bool {
        self.callbacks.remove(handle)
    }

    /// Resets all scheduling state and replans from `v` (spec §4.5:
    /// clears the existing timer, resets state, and restarts the cycle if
    /// the new motion is moving).
    pub fn set_vector(&mut self, v: MotionVector) -> Result<(), ScheduleError> {
        if v.has_nan() {
            return Err(ScheduleError::NaNMotion);
        }
        self.timer_armed = false;
        self.time_interval = None;
        self.pos_interval = None;
        self.queue.clear();
        self.minimum_ts_endpoint = f64::NEG_INFINITY;
        self.vector = Some(v);

        if M::is_moving(&v) {
            self.cycle()?;
        }
        Ok(())
    }

    /// `advance` + `load` + `filter` + `push` (spec §4.5 steps 1-4).
    fn cycle(&mut self) -> Result<(), ScheduleError> {
        let Some(v) = self.vector else { return Ok(()) };
        let now = self.clock.now();

        let needs_advance = match self.time_interval {
            None => true,
            // Strictly past, not at-or-past: an event timestamped exactly
            // at the window's upper bound is still loaded by the current
            // window (see `MotionMath::endpoint_crossings`'s inclusive
            // bound) and gets one more `tick` to be popped as due before
            // the window rolls forward.
            Some(window) => now > window.high(),
        };
        if !needs_advance {
            return Ok(());
        }

        if self.timer_armed {
            return Err(ScheduleError::IllegalState("cycle invoked while a timer was already armed"));
        }

        let window = Interval::new(now, now + self.config.lookahead, true, false);
        let pos_window = M::position_interval(&window, &v);
        tracing::debug!(
            t_start = window.low(),
            t_end = window.high(),
            p_low = pos_window.low(),
            p_high = pos_window.high(),
            "schedule advance"
        );
        self.time_interval = Some(window);
        self.pos_interval = Some(pos_window);
        self.queue.clear();

        let points = self.axis.borrow().get_cue_points_by_interval(&pos_window);
        let (_, range_leave_ts) = M::range_intersect(&v, self.timing.range());
        let min_ts = window.low().max(self.minimum_ts_endpoint);

        for (point, cue) in points {
            let Some(civ) = cue.interval else { continue };
            let crossings = M::endpoint_crossings(&window, &v, &[point]);
            for (ts, _value) in crossings {
                if ts >= range_leave_ts {
                    continue;
                }
                if ts < min_ts {
                    tracing::warn!(ts, key = ?cue.key, "dropping late cue crossing before minimum_ts_endpoint");
                    continue;
                }

                let (_, velocity_at_ts) = v.at(ts);
                if v.acceleration != 0.0 && velocity_at_ts.abs() < self.config.tangent_epsilon {
                    // tangent touch: the moving point reverses exactly at
                    // this endpoint without ever crossing it.
                    continue;
                }

                let side = if point == civ.low() { Side::Low } else { Side::High };
                let closed = if side == Side::Low { civ.low_closed() } else { civ.high_closed() };
                let endpoint = Endpoint::new(point, side, closed);

                self.queue.push(ScheduleEvent {
                    ts_endpoint: ts,
                    cue: cue.clone(),
                    endpoint,
                });
            }
        }

        self.queue.sort_by(|a, b| a.ts_endpoint.total_cmp(&b.ts_endpoint));
        self.timer_armed = true;
        Ok(())
    }

    /// Drains and fires every queued event whose `ts_endpoint` is at or
    /// before `now` (spec §4.5 step 5, "pop-due").
    fn pop_due(&mut self, now: f64) -> Vec<ScheduleEvent<K, V>> {
        let split = self
            .queue
            .iter()
            .position(|e| e.ts_endpoint > now)
            .unwrap_or(self.queue.len());
        self.queue.drain(0..split).collect()
    }

    /// The absolute timestamp the next timer should fire at: the earliest
    /// queued event, or the current window's upper bound if the queue is
    /// empty (spec §4.5 step 6).
    pub fn next_timeout(&self) -> Option<f64> {
        let window_end = self.time_interval.map(|w| w.high());
        let next_event = self.queue.first().map(|e| e.ts_endpoint);
        match (next_event, window_end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Drives one tick of the cooperative scheduling loop: advances the
    /// window if it has expired, pops and fires due events, and re-arms
    /// for the next timeout. The caller owns the actual timer primitive
    /// (spec §1 treats it as an external collaborator) and is expected to
    /// call `tick` at (or soon after) [`Schedule::next_timeout`].
    ///
    /// A timer firing early (platform jitter) is handled by the caller
    /// simply calling `tick` again later — no events are popped before
    /// their time, and the window only advances once `now` reaches its
    /// upper bound, so an early call is a no-op re-arm rather than a
    /// premature cycle (spec §4.6).
    pub fn tick(&mut self) -> Result<Vec<ScheduleEvent<K, V>>, ScheduleError> {
        if self.vector.is_none() {
            return Ok(Vec::new());
        }

        // Pop whatever is already due in the current window first, then
        // advance: a crossing timestamped at the outgoing window's upper
        // bound must fire before that window's queue is discarded.
        let now = self.clock.now();
        let due = self.pop_due(now);
        if !due.is_empty() {
            for cb in self.callbacks.iter_mut() {
                cb(&due);
            }
        }

        self.timer_armed = false;
        self.cycle()?;
        Ok(due)
    }

    pub fn current_window(&self) -> Option<Interval> {
        self.time_interval
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
