//! Transaction types: legacy, EIP-2930, EIP-1559 and EIP-4844

use crate::error::{TypesError, TypesResult};
use chainfill_crypto::{
    keccak256, keccak256_concat, public_key_to_address, recover_address, secret_from_bytes, sign,
    Signature,
};
use chainfill_primitives::{quantity, Address, H256, U256};
use chainfill_rlp::{utils, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize, Serializer};

/// Transaction type identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TxType {
    /// Legacy transaction (pre-EIP-2718)
    #[default]
    Legacy = 0,
    /// EIP-2930 access list transaction
    AccessList = 1,
    /// EIP-1559 dynamic fee transaction
    DynamicFee = 2,
    /// EIP-4844 blob transaction
    Blob = 3,
}

impl TryFrom<u8> for TxType {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TxType::Legacy),
            1 => Ok(TxType::AccessList),
            2 => Ok(TxType::DynamicFee),
            3 => Ok(TxType::Blob),
            other => Err(TypesError::UnsupportedTxType(other)),
        }
    }
}

/// Access list item (address + storage keys)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Account address
    pub address: Address,
    /// Storage keys
    pub storage_keys: Vec<H256>,
}

impl Encodable for AccessListItem {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append_list::<H256, _>(&self.storage_keys);
    }
}

impl Decodable for AccessListItem {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(AccessListItem {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

/// Legacy transaction (type 0), EIP-155 replay-protected when `chain_id` is set
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LegacyTx {
    /// Chain id folded into `v`; `None` signs a pre-EIP-155 transaction
    pub chain_id: Option<u64>,
    /// Transaction nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Vec<u8>,
}

/// EIP-2930 access list transaction (type 1)
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AccessListTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Vec<u8>,
    /// Access list
    pub access_list: Vec<AccessListItem>,
}

/// EIP-1559 dynamic fee transaction (type 2)
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DynamicFeeTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: u64,
    /// Max priority fee per gas (tip)
    pub max_priority_fee_per_gas: U256,
    /// Max fee per gas
    pub max_fee_per_gas: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Vec<u8>,
    /// Access list
    pub access_list: Vec<AccessListItem>,
}

/// EIP-4844 blob transaction (type 3); cannot create contracts
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlobTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: u64,
    /// Max priority fee per gas (tip)
    pub max_priority_fee_per_gas: U256,
    /// Max fee per gas
    pub max_fee_per_gas: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient
    pub to: Address,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Vec<u8>,
    /// Access list
    pub access_list: Vec<AccessListItem>,
    /// Max fee per blob gas
    pub max_fee_per_blob_gas: U256,
    /// Versioned hashes of the blobs
    pub blob_versioned_hashes: Vec<H256>,
}

/// Transaction body (unsigned)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionBody {
    /// Legacy transaction
    Legacy(LegacyTx),
    /// EIP-2930 transaction
    AccessList(AccessListTx),
    /// EIP-1559 transaction
    DynamicFee(DynamicFeeTx),
    /// EIP-4844 transaction
    Blob(BlobTx),
}

impl TransactionBody {
    /// Transaction type
    pub fn tx_type(&self) -> TxType {
        match self {
            TransactionBody::Legacy(_) => TxType::Legacy,
            TransactionBody::AccessList(_) => TxType::AccessList,
            TransactionBody::DynamicFee(_) => TxType::DynamicFee,
            TransactionBody::Blob(_) => TxType::Blob,
        }
    }

    /// Chain id, if the transaction commits to one
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            TransactionBody::Legacy(tx) => tx.chain_id,
            TransactionBody::AccessList(tx) => Some(tx.chain_id),
            TransactionBody::DynamicFee(tx) => Some(tx.chain_id),
            TransactionBody::Blob(tx) => Some(tx.chain_id),
        }
    }

    /// Get transaction nonce
    pub fn nonce(&self) -> u64 {
        match self {
            TransactionBody::Legacy(tx) => tx.nonce,
            TransactionBody::AccessList(tx) => tx.nonce,
            TransactionBody::DynamicFee(tx) => tx.nonce,
            TransactionBody::Blob(tx) => tx.nonce,
        }
    }

    /// Get gas limit
    pub fn gas_limit(&self) -> u64 {
        match self {
            TransactionBody::Legacy(tx) => tx.gas_limit,
            TransactionBody::AccessList(tx) => tx.gas_limit,
            TransactionBody::DynamicFee(tx) => tx.gas_limit,
            TransactionBody::Blob(tx) => tx.gas_limit,
        }
    }

    /// Get recipient address
    pub fn to(&self) -> Option<Address> {
        match self {
            TransactionBody::Legacy(tx) => tx.to,
            TransactionBody::AccessList(tx) => tx.to,
            TransactionBody::DynamicFee(tx) => tx.to,
            TransactionBody::Blob(tx) => Some(tx.to),
        }
    }

    /// Get transfer value
    pub fn value(&self) -> U256 {
        match self {
            TransactionBody::Legacy(tx) => tx.value,
            TransactionBody::AccessList(tx) => tx.value,
            TransactionBody::DynamicFee(tx) => tx.value,
            TransactionBody::Blob(tx) => tx.value,
        }
    }

    /// Get input data
    pub fn data(&self) -> &[u8] {
        match self {
            TransactionBody::Legacy(tx) => &tx.data,
            TransactionBody::AccessList(tx) => &tx.data,
            TransactionBody::DynamicFee(tx) => &tx.data,
            TransactionBody::Blob(tx) => &tx.data,
        }
    }

    /// Access list; empty for legacy transactions
    pub fn access_list(&self) -> &[AccessListItem] {
        match self {
            TransactionBody::Legacy(_) => &[],
            TransactionBody::AccessList(tx) => &tx.access_list,
            TransactionBody::DynamicFee(tx) => &tx.access_list,
            TransactionBody::Blob(tx) => &tx.access_list,
        }
    }

    /// Blob versioned hashes; empty unless this is a blob transaction
    pub fn blob_versioned_hashes(&self) -> &[H256] {
        match self {
            TransactionBody::Blob(tx) => &tx.blob_versioned_hashes,
            _ => &[],
        }
    }

    /// Get effective gas price for the given base fee
    ///
    /// Returns `None` if `base_fee > max_fee_per_gas` for fee-market transactions
    /// (transaction cannot be included in a block with this base fee).
    pub fn effective_gas_price(&self, base_fee: Option<u64>) -> Option<U256> {
        let base_fee = U256::from(base_fee.unwrap_or(0));
        let (max_priority, max_fee) = match self {
            TransactionBody::Legacy(tx) => return Some(tx.gas_price),
            TransactionBody::AccessList(tx) => return Some(tx.gas_price),
            TransactionBody::DynamicFee(tx) => (tx.max_priority_fee_per_gas, tx.max_fee_per_gas),
            TransactionBody::Blob(tx) => (tx.max_priority_fee_per_gas, tx.max_fee_per_gas),
        };
        if base_fee > max_fee {
            return None;
        }
        Some(base_fee + max_priority.min(max_fee - base_fee))
    }

    fn field_count(&self) -> usize {
        match self {
            TransactionBody::Legacy(_) => 6,
            TransactionBody::AccessList(_) => 8,
            TransactionBody::DynamicFee(_) => 9,
            TransactionBody::Blob(_) => 11,
        }
    }

    /// Append the unsigned fields (without list header)
    fn append_fields(&self, s: &mut RlpStream) {
        match self {
            TransactionBody::Legacy(tx) => {
                s.append(&tx.nonce);
                s.append(&tx.gas_price);
                s.append(&tx.gas_limit);
                utils::append_to(s, &tx.to);
                s.append(&tx.value);
                s.append(&tx.data);
            }
            TransactionBody::AccessList(tx) => {
                s.append(&tx.chain_id);
                s.append(&tx.nonce);
                s.append(&tx.gas_price);
                s.append(&tx.gas_limit);
                utils::append_to(s, &tx.to);
                s.append(&tx.value);
                s.append(&tx.data);
                s.append_list::<AccessListItem, _>(&tx.access_list);
            }
            TransactionBody::DynamicFee(tx) => {
                s.append(&tx.chain_id);
                s.append(&tx.nonce);
                s.append(&tx.max_priority_fee_per_gas);
                s.append(&tx.max_fee_per_gas);
                s.append(&tx.gas_limit);
                utils::append_to(s, &tx.to);
                s.append(&tx.value);
                s.append(&tx.data);
                s.append_list::<AccessListItem, _>(&tx.access_list);
            }
            TransactionBody::Blob(tx) => {
                s.append(&tx.chain_id);
                s.append(&tx.nonce);
                s.append(&tx.max_priority_fee_per_gas);
                s.append(&tx.max_fee_per_gas);
                s.append(&tx.gas_limit);
                s.append(&tx.to);
                s.append(&tx.value);
                s.append(&tx.data);
                s.append_list::<AccessListItem, _>(&tx.access_list);
                s.append(&tx.max_fee_per_blob_gas);
                s.append_list::<H256, _>(&tx.blob_versioned_hashes);
            }
        }
    }

    /// Hash the signer commits to
    pub fn signing_hash(&self) -> H256 {
        match self {
            TransactionBody::Legacy(tx) => {
                let mut s = match tx.chain_id {
                    Some(_) => RlpStream::new_list(9),
                    None => RlpStream::new_list(6),
                };
                self.append_fields(&mut s);
                if let Some(chain_id) = tx.chain_id {
                    s.append(&chain_id);
                    s.append(&0u8);
                    s.append(&0u8);
                }
                keccak256(&s.out())
            }
            _ => {
                let mut s = RlpStream::new_list(self.field_count());
                self.append_fields(&mut s);
                keccak256_concat(&[&[self.tx_type() as u8], &s.out()])
            }
        }
    }

    /// Sign with a raw secret key
    pub fn sign(self, secret: &H256) -> TypesResult<SignedTransaction> {
        let key = secret_from_bytes(secret)?;
        let sig = sign(&self.signing_hash(), &key)?;
        let y = sig.y_parity as u64;
        let v = match &self {
            TransactionBody::Legacy(LegacyTx { chain_id: Some(c), .. }) => c * 2 + 35 + y,
            TransactionBody::Legacy(_) => 27 + y,
            _ => y,
        };
        let signature = TxSignature {
            v,
            r: U256::from_big_endian(&sig.r),
            s: U256::from_big_endian(&sig.s),
        };
        let sender = public_key_to_address(key.verifying_key());
        Ok(SignedTransaction::assemble(self, signature, sender))
    }
}

/// Signature components as they appear on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxSignature {
    /// `v`: y-parity for typed transactions, 27/28 or EIP-155 value for legacy
    pub v: u64,
    /// R component
    pub r: U256,
    /// S component
    pub s: U256,
}

impl TxSignature {
    /// Recovery id for the given transaction type
    fn y_parity(&self, tx_type: TxType) -> TypesResult<u8> {
        let y = match (tx_type, self.v) {
            (TxType::Legacy, 27 | 28) => self.v - 27,
            (TxType::Legacy, v) if v >= 35 => (v - 35) % 2,
            (TxType::Legacy, v) => {
                return Err(TypesError::InvalidTransaction(format!("invalid legacy v {}", v)))
            }
            (_, v @ (0 | 1)) => v,
            (_, v) => {
                return Err(TypesError::InvalidTransaction(format!("invalid y-parity {}", v)))
            }
        };
        Ok(y as u8)
    }

    fn to_crypto(&self, tx_type: TxType) -> TypesResult<Signature> {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        self.r.to_big_endian(&mut r);
        self.s.to_big_endian(&mut s);
        Ok(Signature::new(self.y_parity(tx_type)?, r, s))
    }
}

/// Signed transaction together with its resolved sender and hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Transaction body
    pub body: TransactionBody,
    /// Signature
    pub signature: TxSignature,
    sender: Address,
    hash: H256,
}

impl SignedTransaction {
    fn assemble(body: TransactionBody, signature: TxSignature, sender: Address) -> Self {
        let mut tx = SignedTransaction {
            body,
            signature,
            sender,
            hash: H256::ZERO,
        };
        tx.hash = keccak256(&tx.encoded());
        tx
    }

    /// Attach an explicit signature, recovering the sender from it
    pub fn from_signature(body: TransactionBody, signature: TxSignature) -> TypesResult<Self> {
        if let TransactionBody::Legacy(tx) = &body {
            if signature.v >= 35 && tx.chain_id != Some((signature.v - 35) / 2) {
                return Err(TypesError::InvalidTransaction(format!(
                    "v {} does not match chain id {:?}",
                    signature.v, tx.chain_id
                )));
            }
        }
        let crypto_sig = signature.to_crypto(body.tx_type())?;
        let sender = recover_address(&body.signing_hash(), &crypto_sig)?;
        Ok(Self::assemble(body, signature, sender))
    }

    /// Resolved sender
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Transaction hash, `keccak(encoded())`
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Transaction type
    pub fn tx_type(&self) -> TxType {
        self.body.tx_type()
    }

    /// Canonical encoding: an RLP list for legacy transactions,
    /// `type || rlp(fields)` otherwise.
    ///
    /// This is what the transactions trie commits to and what engine API
    /// payloads carry.
    pub fn encoded(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(self.body.field_count() + 3);
        self.body.append_fields(&mut s);
        s.append(&self.signature.v);
        s.append(&self.signature.r);
        s.append(&self.signature.s);
        let payload = s.out();
        match self.tx_type() {
            TxType::Legacy => payload.to_vec(),
            other => {
                let mut out = Vec::with_capacity(payload.len() + 1);
                out.push(other as u8);
                out.extend_from_slice(&payload);
                out
            }
        }
    }

    /// Decode the canonical encoding
    pub fn decode_enveloped(bytes: &[u8]) -> TypesResult<Self> {
        let first = *bytes.first().ok_or(DecoderError::RlpIsTooShort)?;
        if utils::is_list(first) {
            return Self::decode_fields(TxType::Legacy, &Rlp::new(bytes));
        }
        let tx_type = TxType::try_from(first)?;
        if tx_type == TxType::Legacy {
            return Err(TypesError::UnsupportedTxType(first));
        }
        Self::decode_fields(tx_type, &Rlp::new(&bytes[1..]))
    }

    /// Decode a transaction as it appears inside a block body
    pub fn decode_block_item(item: &Rlp) -> TypesResult<Self> {
        if item.is_list() {
            Self::decode_enveloped(item.as_raw())
        } else {
            Self::decode_enveloped(item.data()?)
        }
    }

    fn decode_fields(tx_type: TxType, rlp: &Rlp) -> TypesResult<Self> {
        let signature_at = |i: usize| -> TypesResult<TxSignature> {
            Ok(TxSignature {
                v: rlp.val_at(i)?,
                r: rlp.val_at(i + 1)?,
                s: rlp.val_at(i + 2)?,
            })
        };
        let (body, signature) = match tx_type {
            TxType::Legacy => {
                expect_items(rlp, 9)?;
                let signature = signature_at(6)?;
                let chain_id = (signature.v >= 35).then(|| (signature.v - 35) / 2);
                let body = TransactionBody::Legacy(LegacyTx {
                    chain_id,
                    nonce: rlp.val_at(0)?,
                    gas_price: rlp.val_at(1)?,
                    gas_limit: rlp.val_at(2)?,
                    to: utils::decode_to(&rlp.at(3)?)?,
                    value: rlp.val_at(4)?,
                    data: rlp.val_at(5)?,
                });
                (body, signature)
            }
            TxType::AccessList => {
                expect_items(rlp, 11)?;
                let body = TransactionBody::AccessList(AccessListTx {
                    chain_id: rlp.val_at(0)?,
                    nonce: rlp.val_at(1)?,
                    gas_price: rlp.val_at(2)?,
                    gas_limit: rlp.val_at(3)?,
                    to: utils::decode_to(&rlp.at(4)?)?,
                    value: rlp.val_at(5)?,
                    data: rlp.val_at(6)?,
                    access_list: rlp.list_at(7)?,
                });
                (body, signature_at(8)?)
            }
            TxType::DynamicFee => {
                expect_items(rlp, 12)?;
                let body = TransactionBody::DynamicFee(DynamicFeeTx {
                    chain_id: rlp.val_at(0)?,
                    nonce: rlp.val_at(1)?,
                    max_priority_fee_per_gas: rlp.val_at(2)?,
                    max_fee_per_gas: rlp.val_at(3)?,
                    gas_limit: rlp.val_at(4)?,
                    to: utils::decode_to(&rlp.at(5)?)?,
                    value: rlp.val_at(6)?,
                    data: rlp.val_at(7)?,
                    access_list: rlp.list_at(8)?,
                });
                (body, signature_at(9)?)
            }
            TxType::Blob => {
                expect_items(rlp, 14)?;
                let body = TransactionBody::Blob(BlobTx {
                    chain_id: rlp.val_at(0)?,
                    nonce: rlp.val_at(1)?,
                    max_priority_fee_per_gas: rlp.val_at(2)?,
                    max_fee_per_gas: rlp.val_at(3)?,
                    gas_limit: rlp.val_at(4)?,
                    to: rlp.val_at(5)?,
                    value: rlp.val_at(6)?,
                    data: rlp.val_at(7)?,
                    access_list: rlp.list_at(8)?,
                    max_fee_per_blob_gas: rlp.val_at(9)?,
                    blob_versioned_hashes: rlp.list_at(10)?,
                });
                (body, signature_at(11)?)
            }
        };
        Self::from_signature(body, signature)
    }
}

fn expect_items(rlp: &Rlp, count: usize) -> TypesResult<()> {
    if !rlp.is_list() || rlp.item_count()? != count {
        return Err(DecoderError::RlpIncorrectListLen.into());
    }
    Ok(())
}

/// Fixture rendering of a transaction (ethereum/tests key names)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionJson<'a> {
    #[serde(rename = "type", with = "quantity::padded")]
    tx_type: u64,
    #[serde(with = "quantity::opt_padded", skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    #[serde(with = "quantity::padded")]
    nonce: u64,
    #[serde(with = "quantity::opt_u256_padded", skip_serializing_if = "Option::is_none")]
    gas_price: Option<U256>,
    #[serde(with = "quantity::opt_u256_padded", skip_serializing_if = "Option::is_none")]
    max_priority_fee_per_gas: Option<U256>,
    #[serde(with = "quantity::opt_u256_padded", skip_serializing_if = "Option::is_none")]
    max_fee_per_gas: Option<U256>,
    #[serde(with = "quantity::padded")]
    gas_limit: u64,
    #[serde(serialize_with = "serialize_to")]
    to: Option<Address>,
    #[serde(with = "quantity::u256_padded")]
    value: U256,
    #[serde(with = "quantity::bytes")]
    data: &'a [u8],
    #[serde(skip_serializing_if = "Option::is_none")]
    access_list: Option<&'a [AccessListItem]>,
    #[serde(with = "quantity::opt_u256_padded", skip_serializing_if = "Option::is_none")]
    max_fee_per_blob_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blob_versioned_hashes: Option<&'a [H256]>,
    #[serde(with = "quantity::padded")]
    v: u64,
    #[serde(with = "quantity::u256_padded")]
    r: U256,
    #[serde(with = "quantity::u256_padded")]
    s: U256,
    sender: Address,
    hash: H256,
}

/// Contract creation renders as an empty string
fn serialize_to<S: Serializer>(to: &Option<Address>, s: S) -> Result<S::Ok, S::Error> {
    match to {
        Some(addr) => addr.serialize(s),
        None => s.serialize_str(""),
    }
}

impl Serialize for SignedTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = &self.body;
        let (gas_price, max_priority, max_fee, max_blob_fee) = match body {
            TransactionBody::Legacy(tx) => (Some(tx.gas_price), None, None, None),
            TransactionBody::AccessList(tx) => (Some(tx.gas_price), None, None, None),
            TransactionBody::DynamicFee(tx) => {
                (None, Some(tx.max_priority_fee_per_gas), Some(tx.max_fee_per_gas), None)
            }
            TransactionBody::Blob(tx) => (
                None,
                Some(tx.max_priority_fee_per_gas),
                Some(tx.max_fee_per_gas),
                Some(tx.max_fee_per_blob_gas),
            ),
        };
        let typed = body.tx_type() != TxType::Legacy;
        TransactionJson {
            tx_type: body.tx_type() as u64,
            chain_id: body.chain_id(),
            nonce: body.nonce(),
            gas_price,
            max_priority_fee_per_gas: max_priority,
            max_fee_per_gas: max_fee,
            gas_limit: body.gas_limit(),
            to: body.to(),
            value: body.value(),
            data: body.data(),
            access_list: typed.then(|| body.access_list()),
            max_fee_per_blob_gas: max_blob_fee,
            blob_versioned_hashes: (body.tx_type() == TxType::Blob)
                .then(|| body.blob_versioned_hashes()),
            v: self.signature.v,
            r: self.signature.r,
            s: self.signature.s,
            sender: self.sender,
            hash: self.hash,
        }
        .serialize(serializer)
    }
}
