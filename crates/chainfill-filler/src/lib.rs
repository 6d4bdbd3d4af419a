//! # chainfill-filler
//!
//! Blockchain test fixture generation.
//!
//! This crate provides:
//! - JSON test definitions (pre-state, blocks, expected post-state)
//! - Genesis construction and per-block application through a transition tool
//! - Chain assembly with valid and invalid block outcomes
//! - Post-state verification
//! - Standard and hive fixture rendering
//!
//! ## Pipeline
//!
//! ```text
//! BlockchainTest -> GenesisBuilder -> ChainAssembler (BlockApplier per block)
//!                -> verify_post_state -> Fixture | HiveFixture
//! ```
//!
//! Only valid blocks advance the chain. A block declaring an exception is
//! still built and recorded, and the next block builds on the last valid one.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod applier;
mod chain;
mod definition;
mod error;
mod filler;
mod fixture;
mod genesis;
mod hive;
mod post_state;

pub use applier::{AppliedBlock, BlockApplier};
pub use chain::{AssembledChain, BlockOutcome, ChainAssembler, ChainState};
pub use definition::{
    AccountExpectation, BlockSpec, BlockchainTest, TransactionSpec, TEST_SECRET_KEY,
};
pub use error::{Diagnostics, FillError, FillResult};
pub use filler::BlockchainFiller;
pub use fixture::{
    Fixture, FixtureBlock, FixtureBlockBody, FixtureInfo, InvalidBlockRecord, ValidBlockRecord,
    FILLING_TOOL, SEAL_ENGINE,
};
pub use genesis::{Genesis, GenesisBuilder, GENESIS_DIFFICULTY};
pub use hive::{EngineNewPayload, ExecutionPayload, HiveFixture};
pub use post_state::{verify_post_state, AccountField, AccountMismatch};
