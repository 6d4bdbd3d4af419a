//! Chain assembly: sequencing blocks and threading state

use chainfill_forks::Fork;
use chainfill_primitives::H256;
use chainfill_t8n::TransitionTool;
use chainfill_types::{Alloc, Block, Environment, SealedHeader};

use crate::applier::BlockApplier;
use crate::definition::BlockSpec;
use crate::error::FillResult;
use crate::genesis::Genesis;

/// What became of one block of the test
#[derive(Clone, Debug)]
pub enum BlockOutcome {
    /// Built and applied; the chain advanced onto it
    Valid {
        /// The block
        block: Block,
        /// Its encoding
        rlp: Vec<u8>,
        /// Engine API error code declared for the payload
        engine_api_error_code: Option<i64>,
    },
    /// Built but expected to be rejected; the chain did not advance
    InvalidConstructed {
        /// The block
        block: Block,
        /// Its encoding
        rlp: Vec<u8>,
        /// Exception clients must raise
        exception: String,
        /// Engine API error code declared for the payload
        engine_api_error_code: Option<i64>,
    },
    /// Literal encoding supplied by the test; never executed
    InvalidRawOverride {
        /// The literal bytes
        rlp: Vec<u8>,
        /// Exception clients must raise
        exception: String,
    },
}

impl BlockOutcome {
    /// Whether the chain advanced onto this block
    pub fn is_valid(&self) -> bool {
        matches!(self, BlockOutcome::Valid { .. })
    }

    /// Constructed block, if the block was built
    pub fn block(&self) -> Option<&Block> {
        match self {
            BlockOutcome::Valid { block, .. } | BlockOutcome::InvalidConstructed { block, .. } => {
                Some(block)
            }
            BlockOutcome::InvalidRawOverride { .. } => None,
        }
    }

    /// Encoding as it goes into the fixture
    pub fn rlp(&self) -> &[u8] {
        match self {
            BlockOutcome::Valid { rlp, .. }
            | BlockOutcome::InvalidConstructed { rlp, .. }
            | BlockOutcome::InvalidRawOverride { rlp, .. } => rlp,
        }
    }
}

/// State threaded from one valid block to the next
#[derive(Clone, Debug)]
pub struct ChainState {
    /// Environment for the next block
    pub env: Environment,
    /// Current allocation
    pub alloc: Alloc,
    /// Hash of the last valid block
    pub head: H256,
}

/// A fully assembled chain
#[derive(Clone, Debug)]
pub struct AssembledChain {
    /// Genesis block
    pub genesis: Genesis,
    /// One outcome per block of the test, in order
    pub outcomes: Vec<BlockOutcome>,
    /// State after the last valid block
    pub state: ChainState,
}

impl AssembledChain {
    /// Header of the last block that was built, valid or not; genesis when
    /// no block was built
    pub fn last_built_header(&self) -> &SealedHeader {
        self.outcomes
            .iter()
            .rev()
            .find_map(|outcome| outcome.block())
            .map(|block| &block.header)
            .unwrap_or(&self.genesis.header)
    }
}

/// Sequences block application over a test's blocks
pub struct ChainAssembler<'a> {
    applier: BlockApplier<'a>,
}

impl<'a> ChainAssembler<'a> {
    /// Create a new assembler
    pub fn new(
        fork: &'a dyn Fork,
        t8n: &'a dyn TransitionTool,
        chain_id: u64,
        eips: &'a [u32],
    ) -> Self {
        Self {
            applier: BlockApplier::new(fork, t8n, chain_id, eips),
        }
    }

    /// Apply `blocks` in order on top of `genesis`.
    ///
    /// Only valid blocks advance the state; invalid ones are recorded and
    /// the next block builds on the last valid state again.
    pub fn assemble(&self, genesis: Genesis, blocks: &[BlockSpec]) -> FillResult<AssembledChain> {
        for (index, spec) in blocks.iter().enumerate() {
            spec.validate(index)?;
        }

        let mut state = ChainState {
            env: Environment::from_parent_header(&genesis.header),
            alloc: genesis.alloc.clone(),
            head: genesis.hash(),
        };
        let mut outcomes = Vec::with_capacity(blocks.len());

        for (index, spec) in blocks.iter().enumerate() {
            let outcome = match (&spec.rlp, &spec.exception) {
                (Some(rlp), Some(exception)) => {
                    tracing::warn!(
                        block = index,
                        exception = %exception,
                        "Using literal block rlp"
                    );
                    BlockOutcome::InvalidRawOverride {
                        rlp: rlp.clone(),
                        exception: exception.clone(),
                    }
                }
                _ => {
                    let applied = self.applier.apply(index, spec, &state.env, &state.alloc)?;
                    match &spec.exception {
                        None => {
                            state = ChainState {
                                env: applied.env.apply_new_parent(&applied.block.header),
                                alloc: applied.alloc,
                                head: applied.block.hash(),
                            };
                            BlockOutcome::Valid {
                                block: applied.block,
                                rlp: applied.rlp,
                                engine_api_error_code: spec.engine_api_error_code,
                            }
                        }
                        Some(exception) => {
                            tracing::warn!(
                                block = index,
                                exception = %exception,
                                rejected = applied.rejected.len(),
                                "Block expected to be invalid"
                            );
                            BlockOutcome::InvalidConstructed {
                                block: applied.block,
                                rlp: applied.rlp,
                                exception: exception.clone(),
                                engine_api_error_code: spec.engine_api_error_code,
                            }
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        tracing::info!(
            blocks = outcomes.len(),
            valid = outcomes.iter().filter(|o| o.is_valid()).count(),
            head = %state.head,
            "Assembled chain"
        );

        Ok(AssembledChain {
            genesis,
            outcomes,
            state,
        })
    }
}
