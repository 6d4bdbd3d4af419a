//! Type-level errors

use chainfill_crypto::CryptoError;
use chainfill_rlp::DecoderError;
use thiserror::Error;

/// Errors raised while building, signing or decoding chain types
#[derive(Debug, Error)]
pub enum TypesError {
    /// Malformed RLP
    #[error("rlp decode error: {0}")]
    Rlp(#[from] DecoderError),

    /// Signing or sender recovery failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Typed transaction envelope with an unknown type byte
    #[error("unsupported transaction type: {0:#04x}")]
    UnsupportedTxType(u8),

    /// Header patch touches a field it cannot change
    #[error("invalid header patch: {0}")]
    InvalidHeaderPatch(String),

    /// Transaction fields are inconsistent
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Result alias for this crate
pub type TypesResult<T> = Result<T, TypesError>;
