//! Fork lookup errors

use thiserror::Error;

/// Fork catalog errors
#[derive(Debug, Error)]
pub enum ForkError {
    /// No fork is registered under this name
    #[error("unknown fork: {0}")]
    UnknownFork(String),
}

/// Result type for fork lookups
pub type ForkResult<T> = Result<T, ForkError>;
