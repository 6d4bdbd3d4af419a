//! # chainfill-t8n
//!
//! The state transition function, seen from the outside.
//!
//! - [`TransitionTool`] - the interface the filler calls once per block
//! - [`ExternalTransitionTool`] - drives a geth-compatible `evm t8n` binary
//! - wire types: [`TransitionResult`], [`T8nOutput`], [`T8nTransaction`]

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod external;
mod tool;
mod types;

pub use error::{T8nError, T8nResult};
pub use external::{ExternalTransitionTool, T8nConfig};
pub use tool::{EvaluateRequest, TransitionTool};
pub use types::{RejectedTx, T8nInput, T8nOutput, T8nTransaction, TransitionResult, TxReceipt};
