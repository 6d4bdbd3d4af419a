//! Hex quantity and byte-string helpers.
//!
//! Two renderings of numbers are in use:
//! - *minimal* (`0x0`, `0x1a`): what the transition tool expects for
//!   transactions and environment values;
//! - *padded* (`0x00`, `0x1a`, `0x020000`): even-length hex, the form used
//!   throughout fixture files.
//!
//! Parsing accepts either rendering as well as plain decimal strings and JSON
//! numbers.

use crate::PrimitiveError;
use primitive_types::U256;

/// Parse a quantity given as `0x`-hex or decimal
pub fn parse_u256(s: &str) -> Result<U256, PrimitiveError> {
    let s = s.trim();
    if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex_part.is_empty() {
            return Ok(U256::zero());
        }
        U256::from_str_radix(hex_part, 16).map_err(|_| PrimitiveError::InvalidQuantity(s.into()))
    } else {
        U256::from_dec_str(s).map_err(|_| PrimitiveError::InvalidQuantity(s.into()))
    }
}

/// Parse a quantity that must fit in 64 bits
pub fn parse_u64(s: &str) -> Result<u64, PrimitiveError> {
    let value = parse_u256(s)?;
    if value > U256::from(u64::MAX) {
        return Err(PrimitiveError::InvalidQuantity(s.into()));
    }
    Ok(value.low_u64())
}

/// Parse `0x`-prefixed (or bare) hex into bytes
pub fn parse_bytes(s: &str) -> Result<Vec<u8>, PrimitiveError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| PrimitiveError::InvalidBytes(e.to_string()))
}

/// Minimal hex rendering, `0x0` for zero
pub fn to_minimal_hex(value: U256) -> String {
    format!("0x{:x}", value)
}

/// Even-length hex rendering, `0x00` for zero
pub fn to_padded_hex(value: U256) -> String {
    let digits = format!("{:x}", value);
    if digits.len() % 2 == 1 {
        format!("0x0{}", digits)
    } else {
        format!("0x{}", digits)
    }
}

/// `0x`-prefixed hex of a byte string
pub fn to_hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(feature = "serde")]
pub use self::serde_impl::*;

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    fn raw_u256<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Str(s) => parse_u256(&s).map_err(de::Error::custom),
            Raw::Num(n) => Ok(U256::from(n)),
        }
    }

    fn raw_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Str(s) => parse_u64(&s).map_err(de::Error::custom),
            Raw::Num(n) => Ok(n),
        }
    }

    /// `u64` as minimal hex
    pub mod quantity {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&to_minimal_hex(U256::from(*value)))
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
            raw_u64(d)
        }
    }

    /// `u64` as even-length hex
    pub mod padded {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&to_padded_hex(U256::from(*value)))
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
            raw_u64(d)
        }
    }

    /// `U256` as minimal hex
    pub mod u256_quantity {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&to_minimal_hex(*value))
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
            raw_u256(d)
        }
    }

    /// `U256` as even-length hex
    pub mod u256_padded {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&to_padded_hex(*value))
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
            raw_u256(d)
        }
    }

    /// `Option<u64>` as minimal hex
    pub mod opt_quantity {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&to_minimal_hex(U256::from(*v))),
                None => s.serialize_none(),
            }
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            match Option::<Raw>::deserialize(d)? {
                Some(Raw::Str(s)) => parse_u64(&s).map(Some).map_err(de::Error::custom),
                Some(Raw::Num(n)) => Ok(Some(n)),
                None => Ok(None),
            }
        }
    }

    /// `Option<u64>` as even-length hex
    pub mod opt_padded {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&to_padded_hex(U256::from(*v))),
                None => s.serialize_none(),
            }
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            super::opt_quantity::deserialize(d)
        }
    }

    /// `Option<U256>` as minimal hex
    pub mod opt_u256_quantity {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &Option<U256>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&to_minimal_hex(*v)),
                None => s.serialize_none(),
            }
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<U256>, D::Error> {
            match Option::<Raw>::deserialize(d)? {
                Some(Raw::Str(s)) => parse_u256(&s).map(Some).map_err(de::Error::custom),
                Some(Raw::Num(n)) => Ok(Some(U256::from(n))),
                None => Ok(None),
            }
        }
    }

    /// `Option<U256>` as even-length hex
    pub mod opt_u256_padded {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &Option<U256>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&to_padded_hex(*v)),
                None => s.serialize_none(),
            }
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<U256>, D::Error> {
            super::opt_u256_quantity::deserialize(d)
        }
    }

    /// `Vec<u8>` as `0x` hex
    pub mod bytes {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&to_hex_bytes(value))
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
            let s = String::deserialize(d)?;
            parse_bytes(&s).map_err(de::Error::custom)
        }
    }

    /// `Option<Vec<u8>>` as `0x` hex
    pub mod opt_bytes {
        use super::*;

        /// Serialize
        pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&to_hex_bytes(v)),
                None => s.serialize_none(),
            }
        }

        /// Deserialize
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(s) => parse_bytes(&s).map(Some).map_err(de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
