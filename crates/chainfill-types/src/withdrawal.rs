//! Beacon-chain withdrawals (EIP-4895)

use chainfill_primitives::{quantity, Address, H256};
use chainfill_rlp::{ordered_trie_root, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// A withdrawal credited to an execution-layer address.
///
/// `amount` is denominated in gwei. JSON quantities are minimal hex, which is
/// what both the transition tool and the engine API accept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Monotonic withdrawal index
    #[serde(with = "quantity::quantity")]
    pub index: u64,
    /// Validator index
    #[serde(with = "quantity::quantity")]
    pub validator_index: u64,
    /// Recipient
    pub address: Address,
    /// Amount in gwei
    #[serde(with = "quantity::quantity")]
    pub amount: u64,
}

impl Encodable for Withdrawal {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.index);
        s.append(&self.validator_index);
        s.append(&self.address);
        s.append(&self.amount);
    }
}

impl Decodable for Withdrawal {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Withdrawal {
            index: rlp.val_at(0)?,
            validator_index: rlp.val_at(1)?,
            address: rlp.val_at(2)?,
            amount: rlp.val_at(3)?,
        })
    }
}

/// Ordered-trie root over the RLP encodings of `withdrawals`
pub fn withdrawals_root(withdrawals: &[Withdrawal]) -> H256 {
    ordered_trie_root(withdrawals.iter().map(chainfill_rlp::encode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfill_rlp::EMPTY_TRIE_ROOT;

    fn sample(index: u64) -> Withdrawal {
        Withdrawal {
            index,
            validator_index: index + 100,
            address: Address::from_low_u64_be(0x200),
            amount: 1_000_000_000,
        }
    }

    #[test]
    fn test_withdrawal_rlp_roundtrip() {
        let w = sample(3);
        let decoded: Withdrawal = chainfill_rlp::decode(&chainfill_rlp::encode(&w)).unwrap();
        assert_eq!(decoded, w);
    }

    #[test]
    fn test_withdrawal_json_is_minimal_hex() {
        let json = serde_json::to_value(sample(0)).unwrap();
        assert_eq!(json["index"], "0x0");
        assert_eq!(json["validatorIndex"], "0x64");
        assert_eq!(json["amount"], "0x3b9aca00");
    }

    #[test]
    fn test_withdrawals_root() {
        assert_eq!(withdrawals_root(&[]), EMPTY_TRIE_ROOT);
        let one = withdrawals_root(&[sample(0)]);
        let two = withdrawals_root(&[sample(0), sample(1)]);
        assert_ne!(one, EMPTY_TRIE_ROOT);
        assert_ne!(one, two);
    }
}
