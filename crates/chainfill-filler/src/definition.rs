//! Declarative blockchain test definitions
//!
//! A [`BlockchainTest`] is read from JSON: a pre-state, an ordered list of
//! blocks, and the accounts expected afterwards. Quantities may be hex or
//! decimal strings or plain JSON numbers.

use chainfill_primitives::{quantity, Address, H256, U256};
use chainfill_types::{
    AccessListItem, AccessListTx, Alloc, BlobTx, DynamicFeeTx, Environment, HeaderPatch, LegacyTx,
    SignedTransaction, Storage, TransactionBody, TxSignature, TxType, Withdrawal,
};
use serde::{de, Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::error::{FillError, FillResult};

/// Secret key of `0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b`, the
/// conventional funded sender of the public test suites
pub const TEST_SECRET_KEY: H256 = H256::from_bytes([
    0x45, 0xa9, 0x15, 0xe4, 0xd0, 0x60, 0x14, 0x9e, 0xb4, 0x36, 0x59, 0x60, 0xe6, 0xa7, 0xa4, 0x5f,
    0x33, 0x43, 0x93, 0x09, 0x30, 0x61, 0x11, 0x6b, 0x19, 0x7e, 0x32, 0x40, 0x06, 0x5f, 0xf2, 0xd8,
]);

const DEFAULT_TX_GAS_LIMIT: u64 = 21_000;
const DEFAULT_GAS_PRICE: u64 = 10;

fn default_chain_id() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

/// A multi-block test
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainTest {
    /// Accounts present at genesis
    #[serde(default)]
    pub pre: Alloc,
    /// Expected accounts after the last valid block; `null` means the
    /// account must not exist
    #[serde(default)]
    pub post: BTreeMap<Address, Option<AccountExpectation>>,
    /// Blocks, applied in order
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
    /// Genesis environment
    #[serde(default)]
    pub genesis_environment: Environment,
    /// Fixture name
    #[serde(default)]
    pub tag: String,
    /// Chain id
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

/// One block of a test.
///
/// Unset environment fields keep the value derived from the parent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockSpec {
    /// Transactions, in order
    pub txs: Vec<TransactionSpec>,
    /// Fee recipient
    pub coinbase: Option<Address>,
    /// Difficulty (pre-merge)
    #[serde(with = "quantity::opt_u256_quantity")]
    pub difficulty: Option<U256>,
    /// Gas limit
    #[serde(with = "quantity::opt_quantity")]
    pub gas_limit: Option<u64>,
    /// Block number
    #[serde(with = "quantity::opt_quantity")]
    pub number: Option<u64>,
    /// Timestamp
    #[serde(with = "quantity::opt_quantity")]
    pub timestamp: Option<u64>,
    /// prevRandao (post-merge)
    pub prev_randao: Option<H256>,
    /// Base fee
    #[serde(with = "quantity::opt_quantity")]
    pub base_fee: Option<u64>,
    /// Header extra data
    #[serde(with = "quantity::opt_bytes")]
    pub extra_data: Option<Vec<u8>>,
    /// Withdrawals
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Parent beacon block root
    pub beacon_root: Option<H256>,
    /// Excess blob gas
    #[serde(with = "quantity::opt_quantity")]
    pub excess_blob_gas: Option<u64>,
    /// Blob gas used
    #[serde(with = "quantity::opt_quantity")]
    pub blob_gas_used: Option<u64>,
    /// Literal block encoding to emit instead of building the block
    #[serde(with = "quantity::opt_bytes")]
    pub rlp: Option<Vec<u8>>,
    /// Exception a client must raise when importing this block
    pub exception: Option<String>,
    /// Engine API error code expected for this payload
    pub engine_api_error_code: Option<i64>,
    /// Values the constructed header must have
    pub header_verify: Option<HeaderPatch>,
    /// Values written into the header right before hashing
    pub rlp_modifier: Option<HeaderPatch>,
}

impl BlockSpec {
    /// Reject definitions that cannot produce a verifiable chain
    pub fn validate(&self, index: usize) -> FillResult<()> {
        if self.rlp.is_some() && self.exception.is_none() {
            return Err(FillError::Config(format!(
                "block {}: a literal rlp must declare the exception it triggers; \
                 the post-state of a block that is never executed cannot be verified",
                index
            )));
        }
        Ok(())
    }

    /// Whether clients must reject this block
    pub fn is_invalid(&self) -> bool {
        self.exception.is_some()
    }

    /// Environment of this block, given the environment derived from its parent
    pub fn set_environment(&self, previous: &Environment) -> Environment {
        let mut env = previous.clone();
        if let Some(coinbase) = self.coinbase {
            env.coinbase = coinbase;
        }
        if let Some(gas_limit) = self.gas_limit {
            env.gas_limit = gas_limit;
        }
        if let Some(number) = self.number {
            env.number = number;
        }
        if let Some(timestamp) = self.timestamp {
            env.timestamp = timestamp;
        }
        if let Some(extra_data) = &self.extra_data {
            env.extra_data = extra_data.clone();
        }
        if let Some(withdrawals) = &self.withdrawals {
            env.withdrawals = Some(withdrawals.clone());
        }
        env.difficulty = self.difficulty.or(env.difficulty);
        env.prev_randao = self.prev_randao.or(env.prev_randao);
        env.base_fee = self.base_fee.or(env.base_fee);
        env.beacon_root = self.beacon_root.or(env.beacon_root);
        env.excess_blob_gas = self.excess_blob_gas.or(env.excess_blob_gas);
        env.blob_gas_used = self.blob_gas_used.or(env.blob_gas_used);
        env
    }
}

/// `to` may be an address, `null` or `""`; the latter two create a contract
fn deserialize_to<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Address>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) if s.is_empty() || s == "0x" => Ok(None),
        Some(s) => Address::from_hex(&s).map(Some).map_err(de::Error::custom),
    }
}

/// A transaction to sign and include
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionSpec {
    /// Transaction type; inferred from the fee fields when absent
    #[serde(rename = "type", with = "quantity::opt_quantity")]
    pub tx_type: Option<u64>,
    /// Chain id; the test's chain id when absent
    #[serde(with = "quantity::opt_quantity")]
    pub chain_id: Option<u64>,
    /// Replay-protect legacy transactions (EIP-155)
    #[serde(default = "default_true")]
    pub protected: bool,
    /// Nonce
    #[serde(with = "quantity::quantity")]
    pub nonce: u64,
    /// Gas price (types 0 and 1)
    #[serde(with = "quantity::opt_u256_quantity")]
    pub gas_price: Option<U256>,
    /// Max fee per gas (types 2 and 3)
    #[serde(with = "quantity::opt_u256_quantity")]
    pub max_fee_per_gas: Option<U256>,
    /// Max priority fee per gas (types 2 and 3)
    #[serde(with = "quantity::opt_u256_quantity")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// Max fee per blob gas (type 3)
    #[serde(with = "quantity::opt_u256_quantity")]
    pub max_fee_per_blob_gas: Option<U256>,
    /// Blob versioned hashes (type 3)
    pub blob_versioned_hashes: Option<Vec<H256>>,
    /// Gas limit
    #[serde(with = "quantity::opt_quantity")]
    pub gas_limit: Option<u64>,
    /// Recipient; contract creation when empty
    #[serde(deserialize_with = "deserialize_to")]
    pub to: Option<Address>,
    /// Value in wei
    #[serde(with = "quantity::u256_quantity")]
    pub value: U256,
    /// Call data or init code
    #[serde(with = "quantity::bytes")]
    pub data: Vec<u8>,
    /// Access list (types 1 to 3)
    pub access_list: Option<Vec<AccessListItem>>,
    /// Signing key
    pub secret_key: Option<H256>,
    /// Explicit signature `v`; requires `r` and `s`
    #[serde(with = "quantity::opt_quantity")]
    pub v: Option<u64>,
    /// Explicit signature `r`
    #[serde(with = "quantity::opt_u256_quantity")]
    pub r: Option<U256>,
    /// Explicit signature `s`
    #[serde(with = "quantity::opt_u256_quantity")]
    pub s: Option<U256>,
    /// Rejection reason the transition tool is expected to report
    pub error: Option<String>,
}

impl Default for TransactionSpec {
    fn default() -> Self {
        TransactionSpec {
            tx_type: None,
            chain_id: None,
            protected: true,
            nonce: 0,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            max_fee_per_blob_gas: None,
            blob_versioned_hashes: None,
            gas_limit: None,
            to: None,
            value: U256::zero(),
            data: Vec::new(),
            access_list: None,
            secret_key: None,
            v: None,
            r: None,
            s: None,
            error: None,
        }
    }
}

impl TransactionSpec {
    /// Type given explicitly or implied by the fields present
    pub fn resolved_type(&self) -> FillResult<TxType> {
        match self.tx_type {
            Some(t) => u8::try_from(t)
                .ok()
                .and_then(|t| TxType::try_from(t).ok())
                .ok_or_else(|| FillError::Config(format!("unsupported transaction type {}", t))),
            None if self.max_fee_per_blob_gas.is_some() || self.blob_versioned_hashes.is_some() => {
                Ok(TxType::Blob)
            }
            None if self.max_fee_per_gas.is_some() => Ok(TxType::DynamicFee),
            None if self.access_list.is_some() => Ok(TxType::AccessList),
            None => Ok(TxType::Legacy),
        }
    }

    fn body(&self, default_chain_id: u64) -> FillResult<TransactionBody> {
        let chain_id = self.chain_id.unwrap_or(default_chain_id);
        let gas_limit = self.gas_limit.unwrap_or(DEFAULT_TX_GAS_LIMIT);
        let gas_price = self.gas_price.unwrap_or_else(|| U256::from(DEFAULT_GAS_PRICE));
        let access_list = self.access_list.clone().unwrap_or_default();
        let max_fee_per_gas = self.max_fee_per_gas.unwrap_or(gas_price);
        let max_priority_fee_per_gas = self.max_priority_fee_per_gas.unwrap_or_default();

        let body = match self.resolved_type()? {
            TxType::Legacy => TransactionBody::Legacy(LegacyTx {
                chain_id: self.protected.then_some(chain_id),
                nonce: self.nonce,
                gas_price,
                gas_limit,
                to: self.to,
                value: self.value,
                data: self.data.clone(),
            }),
            TxType::AccessList => TransactionBody::AccessList(AccessListTx {
                chain_id,
                nonce: self.nonce,
                gas_price,
                gas_limit,
                to: self.to,
                value: self.value,
                data: self.data.clone(),
                access_list,
            }),
            TxType::DynamicFee => TransactionBody::DynamicFee(DynamicFeeTx {
                chain_id,
                nonce: self.nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to: self.to,
                value: self.value,
                data: self.data.clone(),
                access_list,
            }),
            TxType::Blob => TransactionBody::Blob(BlobTx {
                chain_id,
                nonce: self.nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                to: self.to.ok_or_else(|| {
                    FillError::Config("blob transactions cannot create contracts".to_string())
                })?,
                value: self.value,
                data: self.data.clone(),
                access_list,
                max_fee_per_blob_gas: self.max_fee_per_blob_gas.unwrap_or_else(U256::one),
                blob_versioned_hashes: self.blob_versioned_hashes.clone().unwrap_or_default(),
            }),
        };
        Ok(body)
    }

    /// Build the signed transaction, resolving its sender
    pub fn to_signed(&self, default_chain_id: u64) -> FillResult<SignedTransaction> {
        let body = self.body(default_chain_id)?;
        let signed = match (self.v, self.r, self.s) {
            (Some(v), Some(r), Some(s)) => {
                SignedTransaction::from_signature(body, TxSignature { v, r, s })
            }
            (None, None, None) => body.sign(&self.secret_key.unwrap_or(TEST_SECRET_KEY)),
            _ => {
                return Err(FillError::Config(
                    "explicit signatures need all of v, r and s".to_string(),
                ))
            }
        };
        signed.map_err(|e| FillError::Config(format!("invalid transaction: {}", e)))
    }
}

/// Expected state of one account; unset fields are not checked
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AccountExpectation {
    /// Balance
    #[serde(with = "quantity::opt_u256_quantity")]
    pub balance: Option<U256>,
    /// Nonce
    #[serde(with = "quantity::opt_quantity")]
    pub nonce: Option<u64>,
    /// Code
    #[serde(with = "quantity::opt_bytes")]
    pub code: Option<Vec<u8>>,
    /// Complete storage; slots not listed must be zero
    pub storage: Option<Storage>,
}
