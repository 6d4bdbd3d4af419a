//! Single block application

use chainfill_forks::Fork;
use chainfill_rlp::ordered_trie_root;
use chainfill_t8n::{EvaluateRequest, T8nOutput, TransitionTool};
use chainfill_types::{
    withdrawals_root, Alloc, Block, Environment, Header, SignedTransaction, EMPTY_OMMERS_HASH,
};

use crate::definition::BlockSpec;
use crate::error::{Diagnostics, FillError, FillResult};

/// A block built from a [`BlockSpec`] together with the state it leads to
#[derive(Clone, Debug)]
pub struct AppliedBlock {
    /// The block, sealed
    pub block: Block,
    /// Encoded block
    pub rlp: Vec<u8>,
    /// Allocation after the block
    pub alloc: Alloc,
    /// Environment the block was executed in
    pub env: Environment,
    /// Indices of the transactions the transition tool rejected
    pub rejected: Vec<usize>,
}

/// Applies blocks of one chain through a transition tool
pub struct BlockApplier<'a> {
    fork: &'a dyn Fork,
    t8n: &'a dyn TransitionTool,
    chain_id: u64,
    eips: &'a [u32],
}

impl<'a> BlockApplier<'a> {
    /// Create a new applier
    pub fn new(
        fork: &'a dyn Fork,
        t8n: &'a dyn TransitionTool,
        chain_id: u64,
        eips: &'a [u32],
    ) -> Self {
        Self {
            fork,
            t8n,
            chain_id,
            eips,
        }
    }

    /// Build block `index` of the test on top of `previous_env` and
    /// `previous_alloc`.
    ///
    /// Blocks supplied as literal RLP are never applied; the caller handles
    /// them before reaching this point.
    pub fn apply(
        &self,
        index: usize,
        spec: &BlockSpec,
        previous_env: &Environment,
        previous_alloc: &Alloc,
    ) -> FillResult<AppliedBlock> {
        let env = self.fork.set_field_defaults(spec.set_environment(previous_env));
        let txs = spec
            .txs
            .iter()
            .map(|tx| tx.to_signed(self.chain_id))
            .collect::<FillResult<Vec<_>>>()?;

        tracing::debug!(
            block = index,
            number = env.number,
            timestamp = env.timestamp,
            txs = txs.len(),
            "Applying block"
        );

        let fork_name = self.fork.fork_name(env.number, env.timestamp);
        let output = self.t8n.evaluate(&EvaluateRequest {
            alloc: previous_alloc,
            txs: &txs,
            env: &env,
            fork_name: &fork_name,
            chain_id: self.chain_id,
            reward: Some(self.fork.get_reward(env.number, env.timestamp)),
            eips: self.eips,
        })?;

        let diagnostics = || {
            Box::new(Diagnostics {
                traces: self.t8n.traces(),
                result: Some(output.result.clone()),
                pre_alloc: previous_alloc.clone(),
                post_alloc: Some(output.alloc.clone()),
            })
        };

        let rejected = check_transactions(spec, &output).map_err(|reason| {
            FillError::BlockVerification {
                block: index,
                reason,
                diagnostics: diagnostics(),
            }
        })?;
        let accepted = txs.len().saturating_sub(rejected.len());
        check_result(&env, &output, accepted).map_err(|reason| {
            FillError::BlockVerification {
                block: index,
                reason,
                diagnostics: diagnostics(),
            }
        })?;

        if !rejected.is_empty() {
            tracing::debug!(block = index, rejected = ?rejected, "Transactions rejected");
            if !spec.is_invalid() {
                return Err(FillError::ChainConstruction {
                    block: index,
                    rejected: output
                        .result
                        .rejected
                        .iter()
                        .map(|r| format!("{}: {}", r.index, r.error))
                        .collect(),
                    diagnostics: diagnostics(),
                });
            }
        }

        let mut header = self.collect_header(&env, &output, &txs);

        if let Some(expected) = &spec.header_verify {
            expected
                .verify(&header)
                .map_err(|mismatches| FillError::HeaderMismatch {
                    block: index,
                    mismatches,
                })?;
        }
        if let Some(modifier) = &spec.rlp_modifier {
            modifier
                .apply(&mut header)
                .map_err(|e| FillError::Config(format!("block {}: {}", index, e)))?;
        }

        let block = Block::new(header.seal(), txs, env.withdrawals.clone());
        let rlp = block.rlp_bytes();
        tracing::debug!(block = index, hash = %block.hash(), "Built block");

        Ok(AppliedBlock {
            block,
            rlp,
            alloc: output.alloc,
            env,
            rejected,
        })
    }

    /// Header from the transition result and the environment, restricted to
    /// the fields the fork defines
    fn collect_header(
        &self,
        env: &Environment,
        output: &T8nOutput,
        txs: &[SignedTransaction],
    ) -> Header {
        let result = &output.result;
        let mut header = Header {
            parent_hash: env.parent_hash,
            ommers_hash: EMPTY_OMMERS_HASH,
            coinbase: env.coinbase,
            state_root: result.state_root,
            transactions_root: ordered_trie_root(txs.iter().map(|tx| tx.encoded())),
            receipts_root: result.receipts_root,
            bloom: result.logs_bloom,
            difficulty: result
                .current_difficulty
                .or(env.difficulty)
                .unwrap_or_default(),
            number: env.number,
            gas_limit: env.gas_limit,
            gas_used: result.gas_used,
            timestamp: env.timestamp,
            extra_data: env.extra_data.clone(),
            mix_hash: env.prev_randao.unwrap_or_default(),
            nonce: 0,
            base_fee: result.current_base_fee.or(env.base_fee),
            withdrawals_root: env.withdrawals.as_deref().map(withdrawals_root),
            blob_gas_used: result.blob_gas_used.or(env.blob_gas_used),
            excess_blob_gas: result.current_excess_blob_gas.or(env.excess_blob_gas),
            parent_beacon_block_root: env.beacon_root,
        };
        header.retain_fields(|field| self.fork.supports_field(field, env.number, env.timestamp));
        header
    }
}

/// Rejected transaction indices, after checking declared transaction errors
fn check_transactions(spec: &BlockSpec, output: &T8nOutput) -> Result<Vec<usize>, String> {
    for (index, tx) in spec.txs.iter().enumerate() {
        if let Some(error) = &tx.error {
            if !output.result.is_rejected(index) {
                return Err(format!(
                    "transaction {} expected to fail with '{}' but succeeded",
                    index, error
                ));
            }
        }
    }
    let mut rejected = output
        .result
        .rejected
        .iter()
        .map(|r| r.index)
        .collect::<Vec<_>>();
    rejected.sort_unstable();
    rejected.dedup();
    Ok(rejected)
}

fn check_result(env: &Environment, output: &T8nOutput, accepted: usize) -> Result<(), String> {
    let result = &output.result;
    if let Some(withdrawals) = &env.withdrawals {
        let expected = withdrawals_root(withdrawals);
        match result.withdrawals_root {
            Some(actual) if actual != expected => {
                return Err(format!(
                    "withdrawals root mismatch: expected {}, got {}",
                    expected, actual
                ))
            }
            _ => {}
        }
    }
    if result.gas_used > env.gas_limit {
        return Err(format!(
            "gas used {} exceeds gas limit {}",
            result.gas_used, env.gas_limit
        ));
    }
    if !result.receipts.is_empty() && result.receipts.len() != accepted {
        return Err(format!(
            "{} receipts for {} included transactions",
            result.receipts.len(),
            accepted
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TransactionSpec;
    use chainfill_primitives::{Address, H256};
    use chainfill_types::Withdrawal;
    use serde_json::json;

    fn output(result: serde_json::Value) -> T8nOutput {
        let mut base = json!({
            "stateRoot": H256::ZERO.to_hex(),
            "txRoot": H256::ZERO.to_hex(),
            "receiptsRoot": H256::ZERO.to_hex(),
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "gasUsed": "0x5208",
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), result.as_object()) {
            base.extend(extra.clone());
        }
        T8nOutput {
            alloc: Alloc::new(),
            result: serde_json::from_value(base).unwrap(),
        }
    }

    fn env() -> Environment {
        Environment {
            gas_limit: 30_000_000,
            ..Default::default()
        }
    }

    // ==================== Transaction expectations ====================

    #[test]
    fn test_rejected_indices_sorted() {
        let spec = BlockSpec {
            txs: vec![TransactionSpec::default(); 3],
            ..Default::default()
        };
        let out = output(json!({
            "rejected": [
                {"index": 2, "error": "nonce too high"},
                {"index": 0, "error": "nonce too low"},
            ]
        }));
        assert_eq!(check_transactions(&spec, &out).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_expected_error_must_reject() {
        let spec = BlockSpec {
            txs: vec![TransactionSpec {
                error: Some("TransactionException.INTRINSIC_GAS_TOO_LOW".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = check_transactions(&spec, &output(json!({}))).unwrap_err();
        assert!(err.contains("INTRINSIC_GAS_TOO_LOW"));

        let rejected = output(json!({
            "rejected": [{"index": 0, "error": "intrinsic gas too low"}]
        }));
        assert_eq!(check_transactions(&spec, &rejected).unwrap(), vec![0]);
    }

    // ==================== Result invariants ====================

    #[test]
    fn test_result_within_limits() {
        let out = output(json!({
            "receipts": [{"gasUsed": "0x5208", "cumulativeGasUsed": "0x5208"}]
        }));
        assert!(check_result(&env(), &out, 1).is_ok());
    }

    #[test]
    fn test_gas_above_limit() {
        let env = Environment {
            gas_limit: 21_000 - 1,
            ..Default::default()
        };
        let err = check_result(&env, &output(json!({})), 0).unwrap_err();
        assert!(err.contains("exceeds gas limit"));
    }

    #[test]
    fn test_receipt_count_mismatch() {
        let out = output(json!({"receipts": [{}, {}]}));
        let err = check_result(&env(), &out, 1).unwrap_err();
        assert_eq!(err, "2 receipts for 1 included transactions");
    }

    #[test]
    fn test_withdrawals_root_mismatch() {
        let env = Environment {
            withdrawals: Some(vec![Withdrawal {
                index: 0,
                validator_index: 1,
                address: Address::from_low_u64_be(0x200),
                amount: 10,
            }]),
            ..env()
        };
        let wrong = output(json!({"withdrawalsRoot": H256::from_low_u64_be(1).to_hex()}));
        assert!(check_result(&env, &wrong, 0).is_err());

        let root = env.withdrawals.as_deref().map(withdrawals_root).unwrap();
        let right = output(json!({"withdrawalsRoot": root.to_hex()}));
        assert!(check_result(&env, &right, 0).is_ok());
    }
}
