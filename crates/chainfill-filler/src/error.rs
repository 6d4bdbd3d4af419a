//! Error types for fixture filling

use chainfill_t8n::{T8nError, TransitionResult};
use chainfill_types::{Alloc, FieldMismatch};
use std::fmt;
use thiserror::Error;

use crate::post_state::AccountMismatch;

/// State captured when a block fails verification
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Execution traces of the failing transition
    pub traces: Vec<serde_json::Value>,
    /// Transition result, when one was produced
    pub result: Option<TransitionResult>,
    /// Allocation the block was applied to
    pub pre_alloc: Alloc,
    /// Allocation the transition produced
    pub post_alloc: Option<Alloc>,
}

/// Fill error type
///
/// Every variant aborts the fixture being filled; nothing is retried.
#[derive(Error, Debug)]
pub enum FillError {
    /// The test definition is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// The transition tool failed to run
    #[error("transition tool error: {0}")]
    TransitionTool(#[from] T8nError),

    /// The transition result violates a block-level invariant
    #[error("block {block}: verification failed: {reason}")]
    BlockVerification {
        /// Index of the block in the test definition
        block: usize,
        /// What went wrong
        reason: String,
        /// Captured state
        diagnostics: Box<Diagnostics>,
    },

    /// Transactions were rejected in a block not declared invalid
    #[error(
        "block {block}: transactions rejected but no block exception declared ({})",
        list(.rejected)
    )]
    ChainConstruction {
        /// Index of the block in the test definition
        block: usize,
        /// `index: reason` for each rejected transaction
        rejected: Vec<String>,
        /// Captured state
        diagnostics: Box<Diagnostics>,
    },

    /// The constructed header does not match the declared expectations
    #[error("block {block}: header mismatch: {}", list(.mismatches))]
    HeaderMismatch {
        /// Index of the block in the test definition
        block: usize,
        /// Every differing field
        mismatches: Vec<FieldMismatch>,
    },

    /// The final allocation does not match the expected post-state
    #[error("post-state mismatch: {}", list(.mismatches))]
    PostStateMismatch {
        /// Every differing account field
        mismatches: Vec<AccountMismatch>,
        /// Traces of the last transition
        traces: Vec<serde_json::Value>,
    },
}

fn list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fill result type
pub type FillResult<T> = Result<T, FillError>;
