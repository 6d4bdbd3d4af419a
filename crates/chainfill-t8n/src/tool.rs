//! The transition tool interface

use chainfill_forks::Fork;
use chainfill_primitives::{H256, U256};
use chainfill_types::{Alloc, Environment, SignedTransaction};

use crate::error::T8nResult;
use crate::types::T8nOutput;

/// Inputs of one state transition
#[derive(Clone, Copy, Debug)]
pub struct EvaluateRequest<'a> {
    /// Pre-state
    pub alloc: &'a Alloc,
    /// Transactions to apply, in order
    pub txs: &'a [SignedTransaction],
    /// Block environment, already normalized for the fork
    pub env: &'a Environment,
    /// Fork name understood by the tool
    pub fork_name: &'a str,
    /// Chain id
    pub chain_id: u64,
    /// Block reward; `None` disables reward processing entirely
    pub reward: Option<U256>,
    /// Extra EIPs to activate on top of the fork
    pub eips: &'a [u32],
}

impl EvaluateRequest<'_> {
    /// Fork argument with EIPs appended, e.g. `Cancun+1153`
    pub fn fork_label(&self) -> String {
        std::iter::once(self.fork_name.to_string())
            .chain(self.eips.iter().map(|eip| eip.to_string()))
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// A black-box state transition function.
///
/// Calls are synchronous and never retried; a failed call leaves no partial
/// state behind.
pub trait TransitionTool: Send + Sync {
    /// Human readable tool name
    fn name(&self) -> &str;

    /// Apply `request.txs` on top of `request.alloc`
    fn evaluate(&self, request: &EvaluateRequest<'_>) -> T8nResult<T8nOutput>;

    /// Normalize `alloc` and compute its state root, as needed for genesis
    fn calc_state_root(&self, alloc: &Alloc, fork: &dyn Fork) -> T8nResult<(Alloc, H256)> {
        let env = fork.set_field_defaults(Environment {
            coinbase: Default::default(),
            gas_limit: 0,
            ..Default::default()
        });
        let fork_name = fork.fork_name(0, 0);
        let output = self.evaluate(&EvaluateRequest {
            alloc,
            txs: &[],
            env: &env,
            fork_name: &fork_name,
            chain_id: 1,
            reward: None,
            eips: &[],
        })?;
        Ok((output.alloc, output.result.state_root))
    }

    /// Execution traces of the most recent call, if the tool collects them
    fn traces(&self) -> Vec<serde_json::Value> {
        Vec::new()
    }
}
