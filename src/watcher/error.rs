//! Error types for the polling watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Scan task failed: {details}")]
    ScanFailed { details: String },
}

impl From<tokio::task::JoinError> for WatchError {
    fn from(e: tokio::task::JoinError) -> Self {
        WatchError::ScanFailed {
            details: e.to_string(),
        }
    }
}
