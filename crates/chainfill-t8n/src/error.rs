//! Transition tool errors

use thiserror::Error;

/// Errors raised while running a state transition
#[derive(Debug, Error)]
pub enum T8nError {
    /// The tool binary could not be started
    #[error("failed to start {binary}: {source}")]
    Spawn {
        /// Binary that was invoked
        binary: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The tool did not finish in time and was killed
    #[error("transition tool timed out after {0}s")]
    Timeout(u64),

    /// The tool exited unsuccessfully
    #[error("transition tool exited with {status}: {stderr}")]
    Failed {
        /// Exit status
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The tool produced output that could not be parsed
    #[error("invalid transition tool output: {0}")]
    InvalidOutput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for transition tool calls
pub type T8nResult<T> = Result<T, T8nError>;
