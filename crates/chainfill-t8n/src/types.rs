//! Wire types of the `evm t8n` protocol
//!
//! Quantities on this wire are minimal hex (`0x0`, `0x5208`); the tool
//! accepts padded values too, but never emits them.

use chainfill_primitives::{quantity, Address, H256, U256};
use chainfill_types::{
    AccessListItem, Alloc, Bloom, Environment, SignedTransaction, TransactionBody,
};
use serde::{Deserialize, Serialize};

/// A transaction the tool could not include
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedTx {
    /// Position in the submitted transaction list
    pub index: usize,
    /// Reason given by the tool
    pub error: String,
}

/// Receipt of an included transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxReceipt {
    /// Hash of the transaction
    pub transaction_hash: H256,
    /// Gas used by this transaction alone
    #[serde(with = "quantity::quantity")]
    pub gas_used: u64,
    /// Cumulative gas used in the block
    #[serde(with = "quantity::quantity")]
    pub cumulative_gas_used: u64,
    /// Status code (Byzantium+)
    #[serde(with = "quantity::opt_quantity", skip_serializing_if = "Option::is_none")]
    pub status: Option<u64>,
}

/// `result` section of the tool output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    /// Post-state root
    pub state_root: H256,
    /// Transactions root
    pub tx_root: H256,
    /// Receipts root
    pub receipts_root: H256,
    /// Hash of the logs
    #[serde(default)]
    pub logs_hash: H256,
    /// Logs bloom
    pub logs_bloom: Bloom,
    /// Receipts of the included transactions
    #[serde(default)]
    pub receipts: Vec<TxReceipt>,
    /// Transactions rejected by the tool
    #[serde(default)]
    pub rejected: Vec<RejectedTx>,
    /// Difficulty the tool computed or was given
    #[serde(with = "quantity::opt_u256_quantity", default, skip_serializing_if = "Option::is_none")]
    pub current_difficulty: Option<U256>,
    /// Total gas used
    #[serde(with = "quantity::quantity")]
    pub gas_used: u64,
    /// Base fee the tool computed or was given
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub current_base_fee: Option<u64>,
    /// Withdrawals root (Shanghai)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<H256>,
    /// Excess blob gas (Cancun)
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub current_excess_blob_gas: Option<u64>,
    /// Blob gas used (Cancun)
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
}

impl TransitionResult {
    /// Whether the transaction at `index` was rejected
    pub fn is_rejected(&self, index: usize) -> bool {
        self.rejected.iter().any(|r| r.index == index)
    }
}

/// Transaction as `evm t8n` reads it from `txs`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct T8nTransaction {
    #[serde(rename = "type", with = "quantity::quantity")]
    tx_type: u64,
    #[serde(with = "quantity::opt_quantity", skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    #[serde(with = "quantity::quantity")]
    nonce: u64,
    to: Option<Address>,
    #[serde(with = "quantity::quantity")]
    gas: u64,
    #[serde(with = "quantity::opt_u256_quantity", skip_serializing_if = "Option::is_none")]
    gas_price: Option<U256>,
    #[serde(with = "quantity::opt_u256_quantity", skip_serializing_if = "Option::is_none")]
    max_priority_fee_per_gas: Option<U256>,
    #[serde(with = "quantity::opt_u256_quantity", skip_serializing_if = "Option::is_none")]
    max_fee_per_gas: Option<U256>,
    #[serde(with = "quantity::u256_quantity")]
    value: U256,
    #[serde(with = "quantity::bytes")]
    input: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_list: Option<Vec<AccessListItem>>,
    #[serde(with = "quantity::opt_u256_quantity", skip_serializing_if = "Option::is_none")]
    max_fee_per_blob_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blob_versioned_hashes: Option<Vec<H256>>,
    #[serde(with = "quantity::quantity")]
    v: u64,
    #[serde(with = "quantity::u256_quantity")]
    r: U256,
    #[serde(with = "quantity::u256_quantity")]
    s: U256,
    sender: Address,
    hash: H256,
}

impl From<&SignedTransaction> for T8nTransaction {
    fn from(tx: &SignedTransaction) -> Self {
        let body = &tx.body;
        let mut wire = T8nTransaction {
            tx_type: body.tx_type() as u64,
            chain_id: body.chain_id(),
            nonce: body.nonce(),
            to: body.to(),
            gas: body.gas_limit(),
            gas_price: None,
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            value: body.value(),
            input: body.data().to_vec(),
            access_list: None,
            max_fee_per_blob_gas: None,
            blob_versioned_hashes: None,
            v: tx.signature.v,
            r: tx.signature.r,
            s: tx.signature.s,
            sender: tx.sender(),
            hash: tx.hash(),
        };
        match body {
            TransactionBody::Legacy(inner) => wire.gas_price = Some(inner.gas_price),
            TransactionBody::AccessList(inner) => {
                wire.gas_price = Some(inner.gas_price);
                wire.access_list = Some(inner.access_list.clone());
            }
            TransactionBody::DynamicFee(inner) => {
                wire.max_priority_fee_per_gas = Some(inner.max_priority_fee_per_gas);
                wire.max_fee_per_gas = Some(inner.max_fee_per_gas);
                wire.access_list = Some(inner.access_list.clone());
            }
            TransactionBody::Blob(inner) => {
                wire.max_priority_fee_per_gas = Some(inner.max_priority_fee_per_gas);
                wire.max_fee_per_gas = Some(inner.max_fee_per_gas);
                wire.access_list = Some(inner.access_list.clone());
                wire.max_fee_per_blob_gas = Some(inner.max_fee_per_blob_gas);
                wire.blob_versioned_hashes = Some(inner.blob_versioned_hashes.clone());
            }
        }
        wire
    }
}

/// Document written to the tool's stdin
#[derive(Debug, Serialize)]
pub struct T8nInput<'a> {
    /// Pre-state
    pub alloc: &'a Alloc,
    /// Transactions
    pub txs: Vec<T8nTransaction>,
    /// Block environment
    pub env: &'a Environment,
}

/// Document read from the tool's stdout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct T8nOutput {
    /// Post-state
    pub alloc: Alloc,
    /// Execution result
    pub result: TransitionResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfill_types::{DynamicFeeTx, LegacyTx};

    fn secret() -> H256 {
        H256::from_hex("0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8")
            .unwrap()
    }

    #[test]
    fn test_legacy_wire_names() {
        let tx = TransactionBody::Legacy(LegacyTx {
            chain_id: Some(1),
            gas_price: U256::from(10),
            gas_limit: 21_000,
            to: None,
            data: vec![0x60, 0x00],
            ..Default::default()
        })
        .sign(&secret())
        .unwrap();
        let json = serde_json::to_value(T8nTransaction::from(&tx)).unwrap();
        assert_eq!(json["type"], "0x0");
        assert_eq!(json["gas"], "0x5208");
        assert_eq!(json["gasPrice"], "0xa");
        assert_eq!(json["input"], "0x6000");
        assert_eq!(json["v"], "0x25");
        assert!(json["to"].is_null());
        assert!(json.get("accessList").is_none());
        assert!(json.get("maxFeePerGas").is_none());
    }

    #[test]
    fn test_dynamic_fee_wire_names() {
        let tx = TransactionBody::DynamicFee(DynamicFeeTx {
            chain_id: 1,
            max_fee_per_gas: U256::from(1000),
            max_priority_fee_per_gas: U256::from(1),
            gas_limit: 21_000,
            to: Some(Address::from_low_u64_be(0x100)),
            ..Default::default()
        })
        .sign(&secret())
        .unwrap();
        let json = serde_json::to_value(T8nTransaction::from(&tx)).unwrap();
        assert_eq!(json["type"], "0x2");
        assert_eq!(json["chainId"], "0x1");
        assert_eq!(json["maxFeePerGas"], "0x3e8");
        assert_eq!(json["accessList"], serde_json::json!([]));
        assert!(json.get("gasPrice").is_none());
    }

    #[test]
    fn test_parse_geth_result() {
        let bloom = format!("0x{}", "00".repeat(256));
        let json = serde_json::json!({
            "alloc": {
                "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": {
                    "balance": "0x3635c9adc5de9f09e5",
                    "nonce": "0x1"
                }
            },
            "result": {
                "stateRoot": "0x1111111111111111111111111111111111111111111111111111111111111111",
                "txRoot": "0x2222222222222222222222222222222222222222222222222222222222222222",
                "receiptsRoot": "0x3333333333333333333333333333333333333333333333333333333333333333",
                "logsHash": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
                "logsBloom": bloom,
                "receipts": [{
                    "root": "0x",
                    "status": "0x1",
                    "cumulativeGasUsed": "0x5208",
                    "logsBloom": bloom,
                    "logs": null,
                    "transactionHash": "0x4444444444444444444444444444444444444444444444444444444444444444",
                    "contractAddress": "0x0000000000000000000000000000000000000000",
                    "gasUsed": "0x5208",
                    "blockHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
                    "transactionIndex": "0x0"
                }],
                "rejected": [{"index": 1, "error": "nonce too low"}],
                "currentDifficulty": null,
                "gasUsed": "0x5208",
                "currentBaseFee": "0x7",
                "withdrawalsRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
            }
        });
        let output: T8nOutput = serde_json::from_value(json).unwrap();
        assert_eq!(output.alloc.len(), 1);
        assert_eq!(output.result.gas_used, 21_000);
        assert_eq!(output.result.receipts[0].status, Some(1));
        assert_eq!(output.result.current_difficulty, None);
        assert_eq!(output.result.current_base_fee, Some(7));
        assert!(output.result.is_rejected(1));
        assert!(!output.result.is_rejected(0));
    }
}
