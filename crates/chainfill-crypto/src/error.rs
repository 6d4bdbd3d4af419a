//! Cryptographic errors

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signing failed
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// r/s do not form a valid signature
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// y-parity outside {0, 1}
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Recovery failed
    #[error("sender recovery failed: {0}")]
    RecoveryFailed(String),

    /// Secret key is zero or not below the curve order
    #[error("invalid secret key")]
    InvalidPrivateKey,
}
