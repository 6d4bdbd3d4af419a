//! Common error types for primitives

use crate::address::AddressError;
use crate::hash::HashError;
use thiserror::Error;

/// Primitive operation error
#[derive(Debug, Error)]
pub enum PrimitiveError {
    /// Address error
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Hash error
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Quantity could not be parsed as hex or decimal
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Byte string was not valid hex
    #[error("invalid hex bytes: {0}")]
    InvalidBytes(String),
}
