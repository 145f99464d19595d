//! Engine error types
//!
//! Failures surfaced through exceptional settlement of a computation handle.

use thiserror::Error;

/// An error carried by an exceptionally settled computation.
///
/// Body closures report failures by returning one of these; panics inside a
/// body are caught at the fire boundary and converted into
/// [`ComputeError::Panicked`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// The body closure reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The body closure panicked while running.
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// A task was fired without a body closure installed.
    #[error("no body has been provided for the task")]
    MissingBody,
}

impl ComputeError {
    /// Build a [`ComputeError::Failed`] from any message.
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        ComputeError::Failed(message.into())
    }

    /// The human-readable message carried by this error.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<String> for ComputeError {
    fn from(message: String) -> Self {
        ComputeError::Failed(message)
    }
}

impl From<&str> for ComputeError {
    fn from(message: &str) -> Self {
        ComputeError::Failed(message.to_string())
    }
}
