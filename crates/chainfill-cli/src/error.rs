//! CLI error types

use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Fork name not in the catalog
    #[error("Unknown fork: {0}")]
    UnknownFork(String),

    /// Filling failed for at least one fork
    #[error("{failed} of {total} fixtures failed to fill")]
    Fill {
        /// Failed fills
        failed: usize,
        /// Attempted fills
        total: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),
}
