//! Compute results
//!
//! The immutable value-or-error outcome of a settled computation. A result
//! is written exactly once, when the owning handle settles, and never
//! mutated afterwards.

use super::error::ComputeError;

/// Outcome of a settled computation.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeResult<T> {
    /// The computation produced a value.
    Value(T),
    /// The computation terminated exceptionally.
    Error(ComputeError),
}

impl<T> ComputeResult<T> {
    /// Whether this result carries a value.
    #[inline]
    pub fn is_value(&self) -> bool {
        matches!(self, ComputeResult::Value(_))
    }

    /// Whether this result carries an error.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, ComputeResult::Error(_))
    }

    /// The value, if any.
    #[inline]
    pub fn value(&self) -> Option<&T> {
        match self {
            ComputeResult::Value(value) => Some(value),
            ComputeResult::Error(_) => None,
        }
    }

    /// The error, if any.
    #[inline]
    pub fn error(&self) -> Option<&ComputeError> {
        match self {
            ComputeResult::Value(_) => None,
            ComputeResult::Error(err) => Some(err),
        }
    }

    /// Convert into a standard `Result`.
    #[inline]
    pub fn into_result(self) -> Result<T, ComputeError> {
        match self {
            ComputeResult::Value(value) => Ok(value),
            ComputeResult::Error(err) => Err(err),
        }
    }

    /// Borrowing view as a standard `Result`.
    #[inline]
    pub fn as_result(&self) -> Result<&T, &ComputeError> {
        match self {
            ComputeResult::Value(value) => Ok(value),
            ComputeResult::Error(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, ComputeError>> for ComputeResult<T> {
    fn from(result: Result<T, ComputeError>) -> Self {
        match result {
            Ok(value) => ComputeResult::Value(value),
            Err(err) => ComputeResult::Error(err),
        }
    }
}
