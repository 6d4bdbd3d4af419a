//! Block execution environment
//!
//! The environment is the per-block context handed to the transition tool.
//! Its JSON form uses the transition tool's `current*`/`parent*` names;
//! test definitions may also use the short names (`coinbase`, `gasLimit`,
//! `baseFee`, ...).

use crate::header::SealedHeader;
use crate::withdrawal::Withdrawal;
use chainfill_primitives::{quantity, Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default block gas limit
pub const DEFAULT_GAS_LIMIT: u64 = 100_000_000_000_000_000;

/// Default fee recipient
pub const DEFAULT_COINBASE: Address = Address::from_bytes([
    0x2a, 0xdc, 0x25, 0x66, 0x50, 0x18, 0xaa, 0x1f, 0xe0, 0xe6, 0xbc, 0x66, 0x6d, 0xac, 0x8f, 0xc2,
    0x69, 0x7f, 0xf9, 0xba,
]);

/// Seconds between consecutive blocks unless overridden
pub const BLOCK_TIME: u64 = 12;

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_coinbase() -> Address {
    DEFAULT_COINBASE
}

/// Block execution environment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Fee recipient
    #[serde(rename = "currentCoinbase", alias = "coinbase", default = "default_coinbase")]
    pub coinbase: Address,
    /// Block gas limit
    #[serde(
        rename = "currentGasLimit",
        alias = "gasLimit",
        with = "quantity::quantity",
        default = "default_gas_limit"
    )]
    pub gas_limit: u64,
    /// Block number
    #[serde(rename = "currentNumber", alias = "number", with = "quantity::quantity", default)]
    pub number: u64,
    /// Block timestamp
    #[serde(rename = "currentTimestamp", alias = "timestamp", with = "quantity::quantity", default)]
    pub timestamp: u64,
    /// Difficulty; left unset post-merge and for the tool to compute pre-merge
    #[serde(
        rename = "currentDifficulty",
        alias = "difficulty",
        with = "quantity::opt_u256_quantity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<U256>,
    /// prevRandao (post-merge)
    #[serde(
        rename = "currentRandom",
        alias = "prevRandao",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub prev_randao: Option<H256>,
    /// Base fee (London)
    #[serde(
        rename = "currentBaseFee",
        alias = "baseFee",
        with = "quantity::opt_quantity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub base_fee: Option<u64>,
    /// Header extra data; not part of the transition input
    #[serde(rename = "extraData", with = "quantity::bytes", skip_serializing, default)]
    pub extra_data: Vec<u8>,
    /// Withdrawals processed in this block (Shanghai)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Parent beacon block root (Cancun)
    #[serde(
        rename = "parentBeaconBlockRoot",
        alias = "beaconRoot",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub beacon_root: Option<H256>,
    /// Excess blob gas (Cancun)
    #[serde(
        rename = "currentExcessBlobGas",
        alias = "excessBlobGas",
        with = "quantity::opt_quantity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub excess_blob_gas: Option<u64>,
    /// Blob gas used (Cancun)
    #[serde(
        rename = "currentBlobGasUsed",
        alias = "blobGasUsed",
        with = "quantity::opt_quantity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub blob_gas_used: Option<u64>,

    /// Parent hash
    #[serde(default, skip_serializing)]
    pub parent_hash: H256,
    /// Parent difficulty
    #[serde(with = "quantity::opt_u256_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_difficulty: Option<U256>,
    /// Parent timestamp
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_timestamp: Option<u64>,
    /// Parent base fee
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_base_fee: Option<u64>,
    /// Parent gas used
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_gas_used: Option<u64>,
    /// Parent gas limit
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_gas_limit: Option<u64>,
    /// Parent ommers hash
    #[serde(rename = "parentUncleHash", default, skip_serializing_if = "Option::is_none")]
    pub parent_ommers_hash: Option<H256>,
    /// Parent blob gas used
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_blob_gas_used: Option<u64>,
    /// Parent excess blob gas
    #[serde(with = "quantity::opt_quantity", default, skip_serializing_if = "Option::is_none")]
    pub parent_excess_blob_gas: Option<u64>,
    /// Ancestor hashes by number, for BLOCKHASH
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub block_hashes: BTreeMap<u64, H256>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            coinbase: DEFAULT_COINBASE,
            gas_limit: DEFAULT_GAS_LIMIT,
            number: 0,
            timestamp: 0,
            difficulty: None,
            prev_randao: None,
            base_fee: None,
            extra_data: Vec::new(),
            withdrawals: None,
            beacon_root: None,
            excess_blob_gas: None,
            blob_gas_used: None,
            parent_hash: H256::ZERO,
            parent_difficulty: None,
            parent_timestamp: None,
            parent_base_fee: None,
            parent_gas_used: None,
            parent_gas_limit: None,
            parent_ommers_hash: None,
            parent_blob_gas_used: None,
            parent_excess_blob_gas: None,
            block_hashes: BTreeMap::new(),
        }
    }
}

impl Environment {
    /// Environment for the block right after `parent`
    pub fn from_parent_header(parent: &SealedHeader) -> Self {
        Environment {
            gas_limit: parent.gas_limit,
            ..Default::default()
        }
        .apply_new_parent(parent)
    }

    /// Move this environment forward onto `parent`.
    ///
    /// Parent fields and the ancestor hash list are refreshed and number and
    /// timestamp advance. Coinbase, gas limit and prevRandao carry over;
    /// values the transition tool derives from the parent (difficulty, base
    /// fee, blob gas) and the per-block payload (withdrawals, beacon root,
    /// extra data) are cleared.
    pub fn apply_new_parent(&self, parent: &SealedHeader) -> Self {
        let mut env = Environment {
            difficulty: None,
            base_fee: None,
            excess_blob_gas: None,
            blob_gas_used: None,
            withdrawals: None,
            beacon_root: None,
            extra_data: Vec::new(),
            ..self.clone()
        };
        env.parent_hash = parent.hash();
        env.parent_difficulty = Some(parent.difficulty);
        env.parent_timestamp = Some(parent.timestamp);
        env.parent_base_fee = parent.base_fee;
        env.parent_gas_used = Some(parent.gas_used);
        env.parent_gas_limit = Some(parent.gas_limit);
        env.parent_ommers_hash = Some(parent.ommers_hash);
        env.parent_blob_gas_used = parent.blob_gas_used;
        env.parent_excess_blob_gas = parent.excess_blob_gas;
        env.block_hashes.insert(parent.number, parent.hash());
        env.number = parent.number + 1;
        env.timestamp = parent.timestamp + BLOCK_TIME;
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn parent() -> SealedHeader {
        Header {
            number: 4,
            timestamp: 48,
            gas_limit: 30_000_000,
            gas_used: 21_000,
            difficulty: U256::from(0x20000),
            base_fee: Some(7),
            ..Default::default()
        }
        .seal()
    }

    #[test]
    fn test_from_parent_header() {
        let parent = parent();
        let env = Environment::from_parent_header(&parent);
        assert_eq!(env.number, 5);
        assert_eq!(env.timestamp, 60);
        assert_eq!(env.gas_limit, 30_000_000);
        assert_eq!(env.coinbase, DEFAULT_COINBASE);
        assert_eq!(env.parent_hash, parent.hash());
        assert_eq!(env.parent_base_fee, Some(7));
        assert_eq!(env.parent_gas_used, Some(21_000));
        assert_eq!(env.block_hashes.get(&4), Some(&parent.hash()));
    }

    #[test]
    fn test_apply_new_parent_carries_coinbase() {
        let mut env = Environment::from_parent_header(&parent());
        env.coinbase = Address::from_low_u64_be(0xcafe);
        env.base_fee = Some(100);

        let mut next_header = parent().unseal();
        next_header.number = 5;
        next_header.timestamp = 70;
        let next = env.apply_new_parent(&next_header.seal());

        assert_eq!(next.number, 6);
        assert_eq!(next.timestamp, 82);
        assert_eq!(next.coinbase, Address::from_low_u64_be(0xcafe));
        assert_eq!(next.base_fee, None);
        assert_eq!(next.parent_base_fee, Some(7));
        assert_eq!(next.block_hashes.len(), 2);
    }

    #[test]
    fn test_transition_tool_json_names() {
        let env = Environment {
            number: 1,
            base_fee: Some(7),
            prev_randao: Some(H256::ZERO),
            extra_data: vec![0xff],
            block_hashes: [(0u64, H256::ZERO)].into_iter().collect(),
            ..Default::default()
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["currentNumber"], "0x1");
        assert_eq!(json["currentBaseFee"], "0x7");
        assert_eq!(json["currentCoinbase"], DEFAULT_COINBASE.to_hex());
        assert_eq!(json["currentRandom"], H256::ZERO.to_hex());
        assert_eq!(json["blockHashes"]["0"], H256::ZERO.to_hex());
        assert!(json.get("extraData").is_none());
        assert!(json.get("currentDifficulty").is_none());
    }

    #[test]
    fn test_short_names_accepted() {
        let env: Environment = serde_json::from_str(
            r#"{"coinbase": "0x0000000000000000000000000000000000000001",
                "gasLimit": "30000000", "timestamp": "0x10", "baseFee": 1000,
                "extraData": "0xabcd"}"#,
        )
        .unwrap();
        assert_eq!(env.coinbase, Address::from_low_u64_be(1));
        assert_eq!(env.gas_limit, 30_000_000);
        assert_eq!(env.timestamp, 16);
        assert_eq!(env.base_fee, Some(1000));
        assert_eq!(env.extra_data, vec![0xab, 0xcd]);
        assert_eq!(env.number, 0);
    }
}
