//! Error types for block ring operations.
//!
//! Only caller mistakes surface as errors. A write that does not fit is not
//! one of them: it overwrites and bumps the lost-chunk counter instead.

/// Broad classification of a [`RingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An argument is outside the range the ring accepts.
    InvalidArgument,
    /// A `get` was attempted without enough data, bypassing the
    /// wait-then-read protocol.
    PreconditionViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    #[error("block of {len} elements outside 1..={capacity}")]
    BlockLength { len: usize, capacity: usize },

    #[error("threshold {threshold} outside 1..={capacity}")]
    Threshold { threshold: usize, capacity: usize },

    #[error("get called before a threshold was registered")]
    NoThreshold,

    #[error("get needs {threshold} elements but only {available} are available; wait on the ready signal first")]
    NotReady { available: usize, threshold: usize },
}

impl RingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RingError::ZeroCapacity | RingError::BlockLength { .. } | RingError::Threshold { .. } => {
                ErrorKind::InvalidArgument
            }
            RingError::NoThreshold | RingError::NotReady { .. } => ErrorKind::PreconditionViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(RingError::ZeroCapacity.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            RingError::BlockLength { len: 11, capacity: 10 }.kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            RingError::Threshold { threshold: 0, capacity: 10 }.kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(RingError::NoThreshold.kind(), ErrorKind::PreconditionViolation);
        assert_eq!(
            RingError::NotReady { available: 2, threshold: 4 }.kind(),
            ErrorKind::PreconditionViolation
        );
    }

    #[test]
    fn display() {
        let err = RingError::BlockLength { len: 11, capacity: 10 };
        assert_eq!(err.to_string(), "block of 11 elements outside 1..=10");

        let err = RingError::NotReady { available: 2, threshold: 4 };
        assert!(err.to_string().contains("only 2 are available"));
    }
}
