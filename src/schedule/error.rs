use thiserror::Error;

/// Errors raised by [`super::Schedule`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    /// A timer was armed while one was already outstanding (spec §4.5/§7:
    /// `setTimeout` while `tid != undefined` is a programming error).
    #[error("illegal schedule state: {0}")]
    IllegalState(&'static str),
    /// A motion vector component was NaN (spec §4.5 treats this as a
    /// programmer error, distinct from the silently-recovered transient
    /// timer cases).
    #[error("motion vector contains NaN")]
    NaNMotion,
}
