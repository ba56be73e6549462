//! Error types for the staging crate.

use std::fmt;

/// Errors from staging uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    /// The file could not be copied into the staging directory.
    StorageFailure { path: String, reason: String },
}

impl fmt::Display for StagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailure { path, reason } => {
                write!(f, "failed to stage '{path}': {reason}")
            }
        }
    }
}

impl std::error::Error for StagingError {}
