//! # chainfill-rlp
//!
//! RLP (Recursive Length Prefix) helpers for block and transaction encoding,
//! built on the `rlp` crate, plus the ordered Merkle-Patricia trie root used
//! for transaction, receipt and withdrawal roots.
//!
//! ## RLP Encoding Rules
//!
//! - Single byte `[0x00, 0x7f]`: itself
//! - Short string (0-55 bytes): `0x80 + len` + data
//! - Long string (>55 bytes): `0xb7 + len_of_len` + len + data
//! - Short list (0-55 bytes payload): `0xc0 + len` + items
//! - Long list (>55 bytes payload): `0xf7 + len_of_len` + len + items

#![warn(missing_docs)]
#![warn(clippy::all)]

mod trie;

pub use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

pub use chainfill_primitives::{Address, H256, U256};
pub use trie::{ordered_trie_root, EMPTY_TRIE_ROOT};

/// Encode a value to RLP bytes
pub fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    rlp::encode(value).to_vec()
}

/// Decode RLP bytes to a value
pub fn decode<T: Decodable>(data: &[u8]) -> Result<T, DecoderError> {
    rlp::decode(data)
}

/// Small helpers shared by the block and transaction codecs
pub mod utils {
    use super::*;

    /// Whether an encoded item starts with a list prefix.
    ///
    /// Inside a block body, legacy transactions are lists while typed
    /// transactions are byte strings wrapping `type || payload`.
    pub fn is_list(first_byte: u8) -> bool {
        first_byte >= 0xc0
    }

    /// Append an optional trailing field.
    ///
    /// Header fields added by later forks are simply absent from the list
    /// when unset, so a `None` appends nothing.
    pub fn append_opt<T: Encodable>(s: &mut RlpStream, value: &Option<T>) {
        if let Some(v) = value {
            s.append(v);
        }
    }

    /// Append `Some(address)` as 20 bytes and `None` as the empty string
    /// (contract creation).
    pub fn append_to(s: &mut RlpStream, to: &Option<Address>) {
        match to {
            Some(addr) => s.append(addr),
            None => s.append_empty_data(),
        };
    }

    /// Decode an optional `to` field
    pub fn decode_to(item: &Rlp) -> Result<Option<Address>, DecoderError> {
        if item.is_empty() {
            Ok(None)
        } else {
            item.as_val().map(Some)
        }
    }

    /// Decode list item `index` if the list is long enough
    pub fn decode_opt<T: Decodable>(list: &Rlp, index: usize) -> Result<Option<T>, DecoderError> {
        if index < list.item_count()? {
            list.val_at(index).map(Some)
        } else {
            Ok(None)
        }
    }
}
