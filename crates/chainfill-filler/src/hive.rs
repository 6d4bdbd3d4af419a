//! Hive fixtures: the chain replayed as engine API payloads

use chainfill_forks::Fork;
use chainfill_primitives::{quantity, Address, H256};
use chainfill_types::{Alloc, Block, Bloom, SealedHeader, Withdrawal};
use serde::{Serialize, Serializer};

use crate::chain::{AssembledChain, BlockOutcome};
use crate::error::{FillError, FillResult};
use crate::fixture::{FixtureInfo, SEAL_ENGINE};

fn serialize_transactions<S: Serializer>(txs: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(txs.iter().map(|tx| quantity::to_hex_bytes(tx)))
}

/// `engine_newPayload` execution payload; quantities are minimal hex
#[allow(missing_docs)]
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    pub parent_hash: H256,
    pub fee_recipient: Address,
    pub state_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub prev_randao: H256,
    #[serde(with = "quantity::quantity")]
    pub block_number: u64,
    #[serde(with = "quantity::quantity")]
    pub gas_limit: u64,
    #[serde(with = "quantity::quantity")]
    pub gas_used: u64,
    #[serde(with = "quantity::quantity")]
    pub timestamp: u64,
    #[serde(with = "quantity::bytes")]
    pub extra_data: Vec<u8>,
    #[serde(with = "quantity::opt_quantity", skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<u64>,
    pub block_hash: H256,
    /// Encoded transactions, typed ones in their envelope
    #[serde(serialize_with = "serialize_transactions")]
    pub transactions: Vec<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    #[serde(with = "quantity::opt_quantity", skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    #[serde(with = "quantity::opt_quantity", skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
}

impl From<&Block> for ExecutionPayload {
    fn from(block: &Block) -> Self {
        let header = &block.header;
        ExecutionPayload {
            parent_hash: header.parent_hash,
            fee_recipient: header.coinbase,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.bloom,
            prev_randao: header.mix_hash,
            block_number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: header.extra_data.clone(),
            base_fee_per_gas: header.base_fee,
            block_hash: header.hash(),
            transactions: block.transactions.iter().map(|tx| tx.encoded()).collect(),
            withdrawals: block.withdrawals.clone(),
            blob_gas_used: header.blob_gas_used,
            excess_blob_gas: header.excess_blob_gas,
        }
    }
}

fn serialize_decimal<S: Serializer>(value: &impl ToString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

fn serialize_opt_decimal<S: Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serialize_decimal(value, s),
        None => s.serialize_none(),
    }
}

/// One `engine_newPayloadVX` call
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineNewPayload {
    /// Payload
    pub execution_payload: ExecutionPayload,
    /// Versioned hashes of every blob in the payload (V3 and later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<H256>>,
    /// Beacon root of the payload (V3 and later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<H256>,
    /// `engine_newPayload` version
    #[serde(serialize_with = "serialize_decimal")]
    pub version: u8,
    /// Whether clients must accept the payload
    pub valid: bool,
    /// Expected engine API error code
    #[serde(
        serialize_with = "serialize_opt_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_code: Option<i64>,
}

impl EngineNewPayload {
    /// Payload for `block` under `fork`
    pub fn new(
        fork: &dyn Fork,
        block: &Block,
        valid: bool,
        error_code: Option<i64>,
    ) -> FillResult<Self> {
        let header = &block.header;
        let version = fork
            .engine_new_payload_version(header.number, header.timestamp)
            .ok_or_else(|| {
                FillError::Config(format!(
                    "{} has no engine API at block {}",
                    fork.fork_name(header.number, header.timestamp),
                    header.number
                ))
            })?;
        let (blob_versioned_hashes, parent_beacon_block_root) = if version >= 3 {
            let hashes = block
                .transactions
                .iter()
                .flat_map(|tx| tx.body.blob_versioned_hashes().iter().copied())
                .collect();
            (Some(hashes), header.parent_beacon_block_root)
        } else {
            (None, None)
        };
        Ok(EngineNewPayload {
            execution_payload: block.into(),
            blob_versioned_hashes,
            parent_beacon_block_root,
            version,
            valid,
            error_code,
        })
    }
}

/// A hive fixture
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveFixture {
    /// Metadata
    #[serde(rename = "_info")]
    pub info: FixtureInfo,
    /// Fork label
    pub network: String,
    /// Genesis header
    pub genesis_block_header: SealedHeader,
    /// Payloads in definition order; literal-rlp blocks have none
    pub engine_new_payloads: Vec<EngineNewPayload>,
    /// `engine_forkchoiceUpdated` version
    #[serde(serialize_with = "serialize_decimal")]
    pub engine_fcu_version: u8,
    /// Genesis allocation
    pub pre: Alloc,
    /// Allocation after the last valid block
    pub post_state: Alloc,
    /// Always [`SEAL_ENGINE`]
    pub seal_engine: String,
}

impl HiveFixture {
    /// Render an assembled chain as engine API payloads
    pub fn from_chain(
        chain: &AssembledChain,
        fork: &dyn Fork,
        network: &str,
        name: &str,
    ) -> FillResult<Self> {
        let mut payloads = Vec::with_capacity(chain.outcomes.len());
        for outcome in &chain.outcomes {
            let payload = match outcome {
                BlockOutcome::Valid {
                    block,
                    engine_api_error_code,
                    ..
                } => EngineNewPayload::new(fork, block, true, *engine_api_error_code)?,
                BlockOutcome::InvalidConstructed {
                    block,
                    engine_api_error_code,
                    ..
                } => EngineNewPayload::new(fork, block, false, *engine_api_error_code)?,
                BlockOutcome::InvalidRawOverride { .. } => continue,
            };
            payloads.push(payload);
        }

        let last = chain.last_built_header();
        let engine_fcu_version = fork
            .forkchoice_updated_version(last.number, last.timestamp)
            .ok_or_else(|| {
                FillError::Config(format!(
                    "{} has no engine API",
                    fork.fork_name(last.number, last.timestamp)
                ))
            })?;

        tracing::info!(
            payloads = payloads.len(),
            fcu_version = engine_fcu_version,
            "Rendered hive fixture"
        );

        Ok(HiveFixture {
            info: FixtureInfo::new(name),
            network: network.to_string(),
            genesis_block_header: chain.genesis.header.clone(),
            engine_new_payloads: payloads,
            engine_fcu_version,
            pre: chain.genesis.alloc.clone(),
            post_state: chain.state.alloc.clone(),
            seal_engine: SEAL_ENGINE.to_string(),
        })
    }
}
