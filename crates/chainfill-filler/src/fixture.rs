//! Standard blockchain fixtures
//!
//! Rendered in the ethereum/tests `BlockchainTests` layout: the genesis
//! header and encoding, one record per block, the head hash and the pre and
//! post allocations. Quantities are zero-padded even-length hex.

use chainfill_primitives::{quantity, H256};
use chainfill_types::{Alloc, Block, Header, SealedHeader, SignedTransaction, Withdrawal};
use serde::{Serialize, Serializer};

use crate::chain::{AssembledChain, BlockOutcome};

/// Name of the tool recorded in `_info`
pub const FILLING_TOOL: &str = concat!("chainfill ", env!("CARGO_PKG_VERSION"));

/// Seal engine of every generated fixture
pub const SEAL_ENGINE: &str = "NoProof";

pub(crate) fn serialize_hex<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&quantity::to_hex_bytes(bytes))
}

/// Fixture metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FixtureInfo {
    /// Fixture name
    pub comment: String,
    /// Tool and version that produced the fixture
    #[serde(rename = "filling-tool")]
    pub filling_tool: String,
}

impl FixtureInfo {
    /// Metadata naming `comment`
    pub fn new(comment: impl Into<String>) -> Self {
        FixtureInfo {
            comment: comment.into(),
            filling_tool: FILLING_TOOL.to_string(),
        }
    }
}

/// Decoded view of a block: header, body and withdrawals
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBlockBody {
    /// Header, with its hash
    pub block_header: SealedHeader,
    /// Block number in decimal
    #[serde(rename = "blocknumber")]
    pub block_number: String,
    /// Transactions
    pub transactions: Vec<SignedTransaction>,
    /// Ommer headers; always empty for generated blocks
    pub uncle_headers: Vec<Header>,
    /// Withdrawals, when the fork has them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl From<&Block> for FixtureBlockBody {
    fn from(block: &Block) -> Self {
        FixtureBlockBody {
            block_header: block.header.clone(),
            block_number: block.number().to_string(),
            transactions: block.transactions.clone(),
            uncle_headers: block.ommers.clone(),
            withdrawals: block.withdrawals.clone(),
        }
    }
}

/// Record of a block clients must import
#[derive(Clone, Debug, Serialize)]
pub struct ValidBlockRecord {
    /// Encoded block
    #[serde(serialize_with = "serialize_hex")]
    pub rlp: Vec<u8>,
    /// Decoded block
    #[serde(flatten)]
    pub body: FixtureBlockBody,
}

/// Record of a block clients must reject
#[derive(Clone, Debug, Serialize)]
pub struct InvalidBlockRecord {
    /// Encoded block, constructed or literal
    #[serde(serialize_with = "serialize_hex")]
    pub rlp: Vec<u8>,
    /// Exception clients must raise
    #[serde(rename = "expectException")]
    pub expect_exception: String,
    /// Decoded block, when it was constructed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rlp_decoded: Option<FixtureBlockBody>,
}

/// One block record of a standard fixture
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum FixtureBlock {
    /// A block clients must import
    Valid(ValidBlockRecord),
    /// A block clients must reject
    Invalid(InvalidBlockRecord),
}

impl From<&BlockOutcome> for FixtureBlock {
    fn from(outcome: &BlockOutcome) -> Self {
        match outcome {
            BlockOutcome::Valid { block, rlp, .. } => FixtureBlock::Valid(ValidBlockRecord {
                rlp: rlp.clone(),
                body: block.into(),
            }),
            BlockOutcome::InvalidConstructed {
                block,
                rlp,
                exception,
                ..
            } => FixtureBlock::Invalid(InvalidBlockRecord {
                rlp: rlp.clone(),
                expect_exception: exception.clone(),
                rlp_decoded: Some(block.into()),
            }),
            BlockOutcome::InvalidRawOverride { rlp, exception } => {
                FixtureBlock::Invalid(InvalidBlockRecord {
                    rlp: rlp.clone(),
                    expect_exception: exception.clone(),
                    rlp_decoded: None,
                })
            }
        }
    }
}

/// A standard blockchain fixture
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Metadata
    #[serde(rename = "_info")]
    pub info: FixtureInfo,
    /// Fork label, `Fork` or `Fork+eip+eip`
    pub network: String,
    /// Genesis header
    pub genesis_block_header: SealedHeader,
    /// Encoded genesis block
    #[serde(rename = "genesisRLP", serialize_with = "serialize_hex")]
    pub genesis_rlp: Vec<u8>,
    /// Blocks in definition order
    pub blocks: Vec<FixtureBlock>,
    /// Hash of the last valid block
    #[serde(rename = "lastblockhash")]
    pub last_block_hash: H256,
    /// Genesis allocation
    pub pre: Alloc,
    /// Allocation after the last valid block
    pub post_state: Alloc,
    /// Always [`SEAL_ENGINE`]
    pub seal_engine: String,
}

impl Fixture {
    /// Render an assembled chain
    pub fn from_chain(chain: &AssembledChain, network: &str, name: &str) -> Self {
        Fixture {
            info: FixtureInfo::new(name),
            network: network.to_string(),
            genesis_block_header: chain.genesis.header.clone(),
            genesis_rlp: chain.genesis.rlp.clone(),
            blocks: chain.outcomes.iter().map(FixtureBlock::from).collect(),
            last_block_hash: chain.state.head,
            pre: chain.genesis.alloc.clone(),
            post_state: chain.state.alloc.clone(),
            seal_engine: SEAL_ENGINE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64) -> Block {
        let header = Header {
            number,
            gas_limit: 30_000_000,
            ..Default::default()
        };
        Block::new(header.seal(), Vec::new(), None)
    }

    // ==================== Block records ====================

    #[test]
    fn test_valid_block_record() {
        let block = block(1);
        let outcome = BlockOutcome::Valid {
            rlp: block.rlp_bytes(),
            block: block.clone(),
            engine_api_error_code: None,
        };
        let value = serde_json::to_value(FixtureBlock::from(&outcome)).unwrap();
        assert_eq!(value["rlp"], quantity::to_hex_bytes(&block.rlp_bytes()));
        assert_eq!(value["blocknumber"], "1");
        assert_eq!(value["blockHeader"]["number"], "0x01");
        assert_eq!(value["blockHeader"]["hash"], block.hash().to_hex());
        assert_eq!(value["transactions"], serde_json::json!([]));
        assert_eq!(value["uncleHeaders"], serde_json::json!([]));
        assert!(value.get("withdrawals").is_none());
        assert!(value.get("expectException").is_none());
    }

    #[test]
    fn test_invalid_constructed_record_has_decoded_block() {
        let block = block(2);
        let outcome = BlockOutcome::InvalidConstructed {
            rlp: block.rlp_bytes(),
            block,
            exception: "TransactionException.NONCE_MISMATCH_TOO_LOW".to_string(),
            engine_api_error_code: None,
        };
        let value = serde_json::to_value(FixtureBlock::from(&outcome)).unwrap();
        assert_eq!(value["expectException"], "TransactionException.NONCE_MISMATCH_TOO_LOW");
        assert_eq!(value["rlp_decoded"]["blocknumber"], "2");
    }

    #[test]
    fn test_raw_override_record() {
        let outcome = BlockOutcome::InvalidRawOverride {
            rlp: vec![0xde, 0xad],
            exception: "BlockException.RLP_STRUCTURES_ENCODING".to_string(),
        };
        let value = serde_json::to_value(FixtureBlock::from(&outcome)).unwrap();
        assert_eq!(value["rlp"], "0xdead");
        assert!(value.get("rlp_decoded").is_none());
        assert!(value.get("blockHeader").is_none());
    }

    // ==================== Metadata ====================

    #[test]
    fn test_info_names_tool() {
        let info = serde_json::to_value(FixtureInfo::new("transfer")).unwrap();
        assert_eq!(info["comment"], "transfer");
        assert!(info["filling-tool"].as_str().unwrap().starts_with("chainfill "));
    }
}
