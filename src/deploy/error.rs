//! Error types for deployment and process supervision.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the deploy supervisor.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Failed to read deploy config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse deploy config {path}, JSON is probably malformed: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start executable {executable}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process {pid} is still running; stop it before deploying again")]
    AlreadyRunning { pid: u32 },

    #[error("Failed to kill process {pid}: {reason}")]
    Kill { pid: u32, reason: String },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type DeployResult<T> = Result<T, DeployError>;
