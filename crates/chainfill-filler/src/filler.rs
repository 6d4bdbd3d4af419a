//! Blockchain test filler

use chainfill_forks::Fork;
use chainfill_t8n::TransitionTool;

use crate::chain::{AssembledChain, ChainAssembler};
use crate::definition::BlockchainTest;
use crate::error::{FillError, FillResult};
use crate::fixture::Fixture;
use crate::genesis::GenesisBuilder;
use crate::hive::HiveFixture;
use crate::post_state::verify_post_state;

/// Fills blockchain tests for one fork and EIP set
pub struct BlockchainFiller<'a> {
    fork: &'a dyn Fork,
    t8n: &'a dyn TransitionTool,
    eips: Vec<u32>,
}

impl<'a> BlockchainFiller<'a> {
    /// Create a new filler
    pub fn new(fork: &'a dyn Fork, t8n: &'a dyn TransitionTool) -> Self {
        Self {
            fork,
            t8n,
            eips: Vec::new(),
        }
    }

    /// Enable extra EIPs on top of the fork
    pub fn with_eips(mut self, eips: impl IntoIterator<Item = u32>) -> Self {
        self.eips = eips.into_iter().collect();
        self
    }

    /// `Fork` or `Fork+eip+eip`
    pub fn network(&self) -> String {
        let mut label = self.fork.name();
        for eip in &self.eips {
            label.push('+');
            label.push_str(&eip.to_string());
        }
        label
    }

    /// Produce the standard fixture for `test`
    pub fn fill(&self, test: &BlockchainTest) -> FillResult<Fixture> {
        let chain = self.assemble(test)?;
        let fixture = Fixture::from_chain(&chain, &self.network(), &test.tag);
        tracing::info!(
            name = %test.tag,
            network = %fixture.network,
            blocks = fixture.blocks.len(),
            "Filled fixture"
        );
        Ok(fixture)
    }

    /// Produce the hive fixture for `test`
    pub fn fill_hive(&self, test: &BlockchainTest) -> FillResult<HiveFixture> {
        let chain = self.assemble(test)?;
        HiveFixture::from_chain(&chain, self.fork, &self.network(), &test.tag)
    }

    /// Build and verify the chain both fixture kinds render
    pub fn assemble(&self, test: &BlockchainTest) -> FillResult<AssembledChain> {
        let genesis =
            GenesisBuilder::new(self.fork, self.t8n).build(&test.pre, &test.genesis_environment)?;
        let chain = ChainAssembler::new(self.fork, self.t8n, test.chain_id, &self.eips)
            .assemble(genesis, &test.blocks)?;

        verify_post_state(&test.post, &chain.state.alloc).map_err(|mismatches| {
            FillError::PostStateMismatch {
                mismatches,
                traces: self.t8n.traces(),
            }
        })?;
        Ok(chain)
    }
}
