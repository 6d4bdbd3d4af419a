//! # chainfill-primitives
//!
//! Primitive types shared by every chainfill crate.
//!
//! - [`Address`]: 20-byte account address
//! - [`H256`]: 32-byte hash
//! - [`U256`]: re-exported from `primitive-types`
//! - [`quantity`]: hex quantity parsing and the serde adapters used by the
//!   fixture and transition-tool wire formats

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;
pub mod quantity;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{HashError, H256};

pub use primitive_types::U256;

/// Block number type
pub type BlockNumber = u64;

/// Transaction nonce type
pub type Nonce = u64;

/// Gas type
pub type Gas = u64;

impl From<hex::FromHexError> for PrimitiveError {
    fn from(err: hex::FromHexError) -> Self {
        PrimitiveError::InvalidBytes(err.to_string())
    }
}
