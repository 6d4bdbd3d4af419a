//! # chainfill-crypto
//!
//! Cryptographic primitives for fixture generation.
//!
//! - Keccak-256 hashing
//! - Deterministic (RFC 6979) secp256k1 signing with EIP-2 low-s
//! - Sender recovery from `(y_parity, r, s)`

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::{keccak256, keccak256_concat};
pub use signature::{
    address_from_secret, public_key_to_address, recover_address, secret_from_bytes, sign,
    PrivateKey, PublicKey, Signature,
};
