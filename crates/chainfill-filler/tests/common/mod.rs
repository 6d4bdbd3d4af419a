//! In-memory transition tool for pipeline tests
//!
//! Applies plain value transfers at a flat 21000 gas, checks nonces and
//! balances, credits withdrawals and block rewards, and derives every root
//! by hashing its inputs. Deterministic, but nothing like a real EVM.

#![allow(dead_code)]

use chainfill_crypto::keccak256;
use chainfill_filler::{BlockSpec, BlockchainTest, TransactionSpec};
use chainfill_primitives::{Address, H256, U256};
use chainfill_rlp::ordered_trie_root;
use chainfill_t8n::{
    EvaluateRequest, RejectedTx, T8nError, T8nOutput, T8nResult, TransitionResult,
    TransitionTool, TxReceipt,
};
use chainfill_types::{withdrawals_root, Account, Alloc, Bloom, SignedTransaction};
use parking_lot::Mutex;

/// Gas charged per transaction
pub const TX_GAS: u64 = 21_000;

/// Address of the conventional funded sender
pub fn sender() -> Address {
    Address::from_hex("0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b").unwrap()
}

/// One `evaluate` call as the mock saw it
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub fork_label: String,
    pub chain_id: u64,
    pub reward: Option<U256>,
    pub txs: usize,
    pub number: u64,
}

/// Transition tool backed by a toy state machine
#[derive(Default)]
pub struct MockTransitionTool {
    calls: Mutex<Vec<RecordedCall>>,
    fail: bool,
    extra_gas: u64,
}

impl MockTransitionTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the binary crashed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Report `extra` more gas than the transactions used
    pub fn with_extra_gas(extra: u64) -> Self {
        Self {
            extra_gas: extra,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn apply_tx(
        alloc: &mut Alloc,
        base_fee: Option<u64>,
        tx: &SignedTransaction,
    ) -> Result<U256, String> {
        let from = tx.sender();
        let account = alloc.get(&from).cloned().unwrap_or_default();
        if tx.body.nonce() < account.nonce {
            return Err("nonce too low".to_string());
        }
        if tx.body.nonce() > account.nonce {
            return Err("nonce too high".to_string());
        }
        let price = tx
            .body
            .effective_gas_price(base_fee)
            .ok_or_else(|| "max fee per gas less than block base fee".to_string())?;
        let fee = price * U256::from(TX_GAS);
        let cost = fee + tx.body.value();
        if account.balance < cost {
            return Err("insufficient funds for gas * price + value".to_string());
        }

        let sender = alloc.entry(from).or_default();
        sender.balance -= cost;
        sender.nonce += 1;
        if let Some(to) = tx.body.to() {
            alloc.entry(to).or_default().balance += tx.body.value();
        }
        let tip = price - U256::from(base_fee.unwrap_or(0)).min(price);
        Ok(tip * U256::from(TX_GAS))
    }
}

fn digest<T: serde::Serialize>(value: &T) -> H256 {
    keccak256(&serde_json::to_vec(value).unwrap())
}

impl TransitionTool for MockTransitionTool {
    fn name(&self) -> &str {
        "mock"
    }

    fn evaluate(&self, request: &EvaluateRequest<'_>) -> T8nResult<T8nOutput> {
        let env = request.env;
        let base_fee = env.base_fee.or(env.parent_base_fee);
        self.calls.lock().push(RecordedCall {
            fork_label: request.fork_label(),
            chain_id: request.chain_id,
            reward: request.reward,
            txs: request.txs.len(),
            number: env.number,
        });
        if self.fail {
            return Err(T8nError::Failed {
                status: "exit status: 2".to_string(),
                stderr: "mock failure".to_string(),
            });
        }

        let mut alloc = request.alloc.clone();
        let mut rejected = Vec::new();
        let mut receipts = Vec::new();
        let mut included = Vec::new();
        let mut gas_used = 0u64;

        for (index, tx) in request.txs.iter().enumerate() {
            match Self::apply_tx(&mut alloc, base_fee, tx) {
                Ok(tip) => {
                    if !tip.is_zero() {
                        alloc.entry(env.coinbase).or_default().balance += tip;
                    }
                    gas_used += TX_GAS;
                    receipts.push(TxReceipt {
                        transaction_hash: tx.hash(),
                        gas_used: TX_GAS,
                        cumulative_gas_used: gas_used,
                        status: Some(1),
                    });
                    included.push(tx.encoded());
                }
                Err(error) => rejected.push(RejectedTx { index, error }),
            }
        }

        if let Some(reward) = request.reward.filter(|r| !r.is_zero()) {
            alloc.entry(env.coinbase).or_default().balance += reward;
        }
        for withdrawal in env.withdrawals.iter().flatten() {
            let amount = U256::from(withdrawal.amount) * U256::exp10(9);
            alloc.entry(withdrawal.address).or_default().balance += amount;
        }
        alloc.retain(|address, account| {
            !account.is_empty()
                || request.alloc.contains_key(address)
                || !account.storage.is_empty()
        });

        let result = TransitionResult {
            state_root: digest(&alloc),
            tx_root: ordered_trie_root(included.iter()),
            receipts_root: digest(&receipts),
            logs_hash: keccak256(&[0xc0]),
            logs_bloom: Bloom::default(),
            receipts,
            rejected,
            current_difficulty: env.difficulty.or(env.parent_difficulty),
            gas_used: gas_used + self.extra_gas,
            current_base_fee: base_fee,
            withdrawals_root: env.withdrawals.as_deref().map(withdrawals_root),
            current_excess_blob_gas: env.excess_blob_gas.or(env.parent_excess_blob_gas),
            blob_gas_used: env.blob_gas_used,
        };
        Ok(T8nOutput { alloc, result })
    }
}

/// Pre-state funding the conventional sender with 1000 ether
pub fn funded_pre() -> Alloc {
    let mut pre = Alloc::new();
    pre.insert(sender(), Account::with_balance(U256::exp10(21)));
    pre
}

/// Transfer of `value` wei to `to` with the given nonce
pub fn transfer(nonce: u64, to: Address, value: u64) -> TransactionSpec {
    TransactionSpec {
        nonce,
        to: Some(to),
        value: U256::from(value),
        ..Default::default()
    }
}

/// Block holding `txs`
pub fn block_with(txs: Vec<TransactionSpec>) -> BlockSpec {
    BlockSpec {
        txs,
        ..Default::default()
    }
}

/// Test over `blocks` with the funded pre-state and no post expectations
pub fn test_with(blocks: Vec<BlockSpec>) -> BlockchainTest {
    BlockchainTest {
        pre: funded_pre(),
        blocks,
        tag: "pipeline".to_string(),
        chain_id: 1,
        ..Default::default()
    }
}
