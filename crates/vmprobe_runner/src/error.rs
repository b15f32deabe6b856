//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while executing external processes.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Process execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Process timeout after {0} seconds")]
    Timeout(u64),

    #[error("Container runtime not available: {0}")]
    RuntimeNotAvailable(String),

    #[error("Invalid mount configuration: {0}")]
    InvalidMount(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
