//! Ordered Merkle-Patricia trie root.
//!
//! Only the root is ever needed (transactions, withdrawals), so items go
//! straight into `alloy-trie`'s hash builder keyed by `rlp(index)`.

use alloy_trie::root::ordered_trie_root_with_encoder;
use chainfill_primitives::H256;

/// Root of a trie with no entries, `keccak(rlp(""))`
pub const EMPTY_TRIE_ROOT: H256 = H256::from_bytes([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);

/// Root of the trie mapping `rlp(index)` to each item's encoding
pub fn ordered_trie_root<I, V>(items: I) -> H256
where
    I: IntoIterator<Item = V>,
    V: AsRef<[u8]>,
{
    let items: Vec<V> = items.into_iter().collect();
    if items.is_empty() {
        return EMPTY_TRIE_ROOT;
    }
    let root = ordered_trie_root_with_encoder(&items, |item, buf| {
        buf.extend_from_slice(item.as_ref())
    });
    H256::from_bytes(root.0)
}
