//! # chainfill-types
//!
//! Chain data types used while building fixtures.
//!
//! This crate provides:
//! - [`Header`](header::Header) and [`SealedHeader`](header::SealedHeader) -
//!   block headers with fork-dependent trailing fields
//! - [`HeaderPatch`](header::HeaderPatch) - header assertions and pre-hash overrides
//! - [`Block`](block::Block) - canonical block encoding
//! - [`SignedTransaction`](transaction::SignedTransaction) - legacy and typed transactions
//! - [`Withdrawal`](withdrawal::Withdrawal), [`Account`](account::Account),
//!   [`Environment`](environment::Environment)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod block;
pub mod environment;
pub mod error;
pub mod header;
pub mod transaction;
pub mod withdrawal;

pub use account::{merge_allocs, Account, Alloc, Storage};
pub use block::Block;
pub use environment::Environment;
pub use error::{TypesError, TypesResult};
pub use header::{
    Bloom, FieldMismatch, Header, HeaderField, HeaderPatch, SealedHeader, EMPTY_OMMERS_HASH,
    EMPTY_TRIE_ROOT,
};
pub use transaction::{
    AccessListItem, AccessListTx, BlobTx, DynamicFeeTx, LegacyTx, SignedTransaction,
    TransactionBody, TxSignature, TxType,
};
pub use withdrawal::{withdrawals_root, Withdrawal};
