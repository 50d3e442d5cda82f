//! chronaxis - synchronized, timeline-driven sequencing of cues.
//!
//! Clients register cues — keyed records each associated with an interval
//! on a numeric timeline — and subscribe to enter/exit notifications as a
//! moving point (position, velocity, acceleration evolving in real time)
//! traverses the timeline.
//!
//! This crate is the core of that system: an [`axis`] interval index
//! supporting batched insert/replace/delete of keyed cues and efficient
//! interval-relation queries, and a [`schedule`] that turns a motion
//! vector into timely enter/exit callbacks.

pub mod axis;
pub mod bucket;
pub mod cue;
pub mod events;
pub mod float_key;
pub mod index;
pub mod interval;
pub mod motion;
pub mod schedule;

#[cfg(test)]
mod scenarios;

/// Identifier type suitable for cue keys that want an opaque string handle.
pub type Id = String;

/// Generates a new unique identifier (UUID v4), for callers who want
/// opaque string cue keys rather than their own key type.
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
