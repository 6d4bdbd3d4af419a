//! secp256k1 signing and sender recovery

use crate::{keccak256, CryptoError};
use chainfill_primitives::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use std::cmp::Ordering;

/// Half of the secp256k1 curve order (n/2)
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Full secp256k1 curve order (n)
const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Public key
pub type PublicKey = VerifyingKey;

/// Private key
pub type PrivateKey = SigningKey;

/// Recoverable ECDSA signature.
///
/// `y_parity` is the raw recovery id (0 or 1). Legacy transactions fold it
/// into `v` together with the chain id; typed transactions carry it as is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Recovery id, 0 or 1
    pub y_parity: u8,
    /// r component
    pub r: [u8; 32],
    /// s component
    pub s: [u8; 32],
}

impl Signature {
    /// Create signature from components
    pub fn new(y_parity: u8, r: [u8; 32], s: [u8; 32]) -> Self {
        Signature { y_parity, r, s }
    }
}

/// n - s, for s normalization
fn subtract_from_n(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: u16 = 0;
    for i in (0..32).rev() {
        let diff = (SECP256K1_N[i] as u16)
            .wrapping_sub(s[i] as u16)
            .wrapping_sub(borrow);
        result[i] = diff as u8;
        borrow = if diff > 255 { 1 } else { 0 };
    }
    result
}

/// Load a secret key from its 32 raw bytes
pub fn secret_from_bytes(secret: &H256) -> Result<PrivateKey, CryptoError> {
    SigningKey::from_slice(secret.as_bytes()).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Sign a 32-byte prehash.
///
/// Nonces follow RFC 6979, so the same key and hash always give the same
/// signature; fixture hashes depend on that.
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (signature, recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let r: [u8; 32] = signature.r().to_bytes().into();
    let mut s: [u8; 32] = signature.s().to_bytes().into();
    let mut y_parity = recovery_id.to_byte();

    if s.cmp(&SECP256K1_N_DIV_2) == Ordering::Greater {
        s = subtract_from_n(&s);
        y_parity ^= 1;
    }

    Ok(Signature { y_parity, r, s })
}

/// Recover the signer's address from a prehash and signature
pub fn recover_address(message_hash: &H256, signature: &Signature) -> Result<Address, CryptoError> {
    let r: k256::FieldBytes = signature.r.into();
    let s: k256::FieldBytes = signature.s.into();
    let k256_sig = K256Signature::from_scalars(r, s)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    let recovery_id = RecoveryId::from_byte(signature.y_parity)
        .ok_or(CryptoError::InvalidRecoveryId(signature.y_parity))?;

    let key = VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
    Ok(public_key_to_address(&key))
}

/// Derive address from public key
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    // skip the 0x04 prefix
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(addr_bytes)
}

/// Address controlled by a raw secret key
pub fn address_from_secret(secret: &H256) -> Result<Address, CryptoError> {
    let key = secret_from_bytes(secret)?;
    Ok(public_key_to_address(key.verifying_key()))
}
