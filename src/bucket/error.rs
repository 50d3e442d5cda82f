use thiserror::Error;

/// Errors raised by [`super::CueBucket::integrity`]. Bucket integrity
/// violations are programmer errors (spec §4.6/§7): ordinary `add`/
/// `remove`/`flush`/`lookup` operations never fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("bucket invariant violated: {0}")]
    InvariantViolation(String),
}
