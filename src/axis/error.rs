use thiserror::Error;

/// Errors raised by [`super::Axis::update`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AxisError {
    #[error("invalid cue argument: {0}")]
    InvalidArgument(String),
    #[error("bucket invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<crate::bucket::BucketError> for AxisError {
    fn from(err: crate::bucket::BucketError) -> Self {
        match err {
            crate::bucket::BucketError::InvariantViolation(detail) => {
                AxisError::InvariantViolation(detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        assert_eq!(
            AxisError::InvalidArgument("low > high".to_string()).to_string(),
            "invalid cue argument: low > high"
        );
        assert_eq!(
            AxisError::InvariantViolation("stale index".to_string()).to_string(),
            "bucket invariant violated: stale index"
        );
    }
}
