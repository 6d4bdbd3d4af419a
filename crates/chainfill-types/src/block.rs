//! Block encoding

use crate::error::TypesResult;
use crate::header::{Header, SealedHeader};
use crate::transaction::SignedTransaction;
use crate::withdrawal::Withdrawal;
use chainfill_primitives::H256;
use chainfill_rlp::{utils, Rlp, RlpStream};

/// Complete block: header, transactions, ommers and (Shanghai+) withdrawals
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Sealed header
    pub header: SealedHeader,
    /// Transactions in block order
    pub transactions: Vec<SignedTransaction>,
    /// Ommer headers; always empty for blocks built here
    pub ommers: Vec<Header>,
    /// Withdrawals, `None` before Shanghai
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl Block {
    /// Create a new block with no ommers
    pub fn new(
        header: SealedHeader,
        transactions: Vec<SignedTransaction>,
        withdrawals: Option<Vec<Withdrawal>>,
    ) -> Self {
        Block {
            header,
            transactions,
            ommers: Vec::new(),
            withdrawals,
        }
    }

    /// Block hash
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Get block number
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// `rlp([header, transactions, ommers, withdrawals?])`
    pub fn rlp_bytes(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(if self.withdrawals.is_some() { 4 } else { 3 });
        s.append(self.header.header());
        s.begin_list(self.transactions.len());
        for tx in &self.transactions {
            let encoded = tx.encoded();
            if utils::is_list(encoded[0]) {
                s.append_raw(&encoded, 1);
            } else {
                s.append(&encoded);
            }
        }
        s.append_list::<Header, _>(&self.ommers);
        if let Some(withdrawals) = &self.withdrawals {
            s.append_list::<Withdrawal, _>(withdrawals);
        }
        s.out().to_vec()
    }

    /// Decode a full block, recovering every transaction sender
    pub fn decode(bytes: &[u8]) -> TypesResult<Self> {
        let rlp = Rlp::new(bytes);
        let items = rlp.item_count()?;
        if !(3..=4).contains(&items) {
            return Err(chainfill_rlp::DecoderError::RlpIncorrectListLen.into());
        }
        let header: Header = rlp.val_at(0)?;
        let transactions = rlp
            .at(1)?
            .iter()
            .map(|item| SignedTransaction::decode_block_item(&item))
            .collect::<TypesResult<Vec<_>>>()?;
        let ommers: Vec<Header> = rlp.list_at(2)?;
        let withdrawals = if items == 4 {
            Some(rlp.list_at(3)?)
        } else {
            None
        };
        Ok(Block {
            header: header.seal(),
            transactions,
            ommers,
            withdrawals,
        })
    }
}
