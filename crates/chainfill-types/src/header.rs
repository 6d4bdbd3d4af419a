//! Block header, header field names, and header patches

use crate::error::{TypesError, TypesResult};
use chainfill_crypto::keccak256;
use chainfill_primitives::{quantity, Address, H256, U256};
use chainfill_rlp::{utils, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

/// Empty ommers hash (keccak256 of empty RLP list)
pub const EMPTY_OMMERS_HASH: H256 = H256::from_bytes([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4, 0x1a,
    0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4, 0x93, 0x47,
]);

pub use chainfill_rlp::EMPTY_TRIE_ROOT;

/// Logs bloom filter (2048 bits = 256 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Bloom(pub [u8; 256]);

impl Default for Bloom {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Bloom {
    /// Empty bloom filter
    pub const ZERO: Bloom = Bloom([0u8; 256]);

    /// Create bloom from a slice, which must be exactly 256 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 256] = bytes.try_into().ok()?;
        Some(Bloom(arr))
    }

    /// Check if bloom filter is empty
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Hex rendering with 0x prefix
    pub fn to_hex(&self) -> String {
        quantity::to_hex_bytes(&self.0)
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Bloom(0)")
        } else {
            write!(f, "Bloom({})", self.to_hex())
        }
    }
}

impl Encodable for Bloom {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for Bloom {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        rlp.decoder()
            .decode_value(|bytes| Bloom::from_slice(bytes).ok_or(DecoderError::RlpInvalidLength))
    }
}

impl Serialize for Bloom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bloom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = quantity::parse_bytes(&s).map_err(de::Error::custom)?;
        Bloom::from_slice(&bytes).ok_or_else(|| de::Error::custom("bloom must be 256 bytes"))
    }
}

/// The 8-byte header nonce is rendered as fixed-width hex.
mod nonce_hex {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{:016x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let s = String::deserialize(d)?;
        quantity::parse_u64(&s).map_err(de::Error::custom)
    }
}

/// Names of the header fields.
///
/// Forks declare which optional fields they carry through these names, and
/// header patches use them to strip fields before hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderField {
    /// Parent block hash
    ParentHash,
    /// Ommers hash
    #[serde(rename = "uncleHash")]
    OmmersHash,
    /// Beneficiary
    Coinbase,
    /// State root
    StateRoot,
    /// Transactions root
    #[serde(rename = "transactionsTrie")]
    TransactionsRoot,
    /// Receipts root
    #[serde(rename = "receiptTrie")]
    ReceiptsRoot,
    /// Logs bloom
    Bloom,
    /// Difficulty
    Difficulty,
    /// Block number
    Number,
    /// Gas limit
    GasLimit,
    /// Gas used
    GasUsed,
    /// Timestamp
    Timestamp,
    /// Extra data
    ExtraData,
    /// Mix digest / prevRandao
    MixHash,
    /// PoW nonce
    Nonce,
    /// EIP-1559 base fee
    #[serde(rename = "baseFeePerGas")]
    BaseFee,
    /// EIP-4895 withdrawals root
    WithdrawalsRoot,
    /// EIP-4844 blob gas used
    BlobGasUsed,
    /// EIP-4844 excess blob gas
    ExcessBlobGas,
    /// EIP-4788 parent beacon block root
    ParentBeaconBlockRoot,
}

impl HeaderField {
    /// Fields introduced after Frontier, which a header may omit
    pub const OPTIONAL: [HeaderField; 5] = [
        HeaderField::BaseFee,
        HeaderField::WithdrawalsRoot,
        HeaderField::BlobGasUsed,
        HeaderField::ExcessBlobGas,
        HeaderField::ParentBeaconBlockRoot,
    ];

    /// Whether the field may be absent from a header
    pub fn is_optional(&self) -> bool {
        Self::OPTIONAL.contains(self)
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => write!(f, "{}", name),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Block header
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Parent block hash
    pub parent_hash: H256,
    /// Ommers hash, always the empty-list hash here
    #[serde(rename = "uncleHash")]
    pub ommers_hash: H256,
    /// Beneficiary
    pub coinbase: Address,
    /// State root after executing the block
    pub state_root: H256,
    /// Transactions trie root
    #[serde(rename = "transactionsTrie")]
    pub transactions_root: H256,
    /// Receipts trie root
    #[serde(rename = "receiptTrie")]
    pub receipts_root: H256,
    /// Logs bloom
    pub bloom: Bloom,
    /// Difficulty (zero after the merge)
    #[serde(with = "quantity::u256_padded")]
    pub difficulty: U256,
    /// Block number
    #[serde(with = "quantity::padded")]
    pub number: u64,
    /// Gas limit
    #[serde(with = "quantity::padded")]
    pub gas_limit: u64,
    /// Gas used by all transactions
    #[serde(with = "quantity::padded")]
    pub gas_used: u64,
    /// Timestamp (seconds)
    #[serde(with = "quantity::padded")]
    pub timestamp: u64,
    /// Extra data
    #[serde(with = "quantity::bytes")]
    pub extra_data: Vec<u8>,
    /// Mix digest, prevRandao after the merge
    pub mix_hash: H256,
    /// PoW nonce
    #[serde(with = "nonce_hex")]
    pub nonce: u64,
    /// Base fee per gas (London)
    #[serde(
        rename = "baseFeePerGas",
        with = "quantity::opt_padded",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub base_fee: Option<u64>,
    /// Withdrawals root (Shanghai)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<H256>,
    /// Blob gas used (Cancun)
    #[serde(with = "quantity::opt_padded", default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    /// Excess blob gas (Cancun)
    #[serde(with = "quantity::opt_padded", default, skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
    /// Parent beacon block root (Cancun)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<H256>,
}

impl Header {
    /// Whether an optional field is present
    pub fn has_field(&self, field: HeaderField) -> bool {
        match field {
            HeaderField::BaseFee => self.base_fee.is_some(),
            HeaderField::WithdrawalsRoot => self.withdrawals_root.is_some(),
            HeaderField::BlobGasUsed => self.blob_gas_used.is_some(),
            HeaderField::ExcessBlobGas => self.excess_blob_gas.is_some(),
            HeaderField::ParentBeaconBlockRoot => self.parent_beacon_block_root.is_some(),
            _ => true,
        }
    }

    /// Drop an optional field; mandatory fields cannot be cleared.
    pub fn clear_field(&mut self, field: HeaderField) -> TypesResult<()> {
        if !field.is_optional() {
            return Err(TypesError::InvalidHeaderPatch(format!(
                "field {} cannot be removed",
                field
            )));
        }
        self.clear_optional(field);
        Ok(())
    }

    /// Drop `field` if it is optional; mandatory fields are left alone
    fn clear_optional(&mut self, field: HeaderField) {
        match field {
            HeaderField::BaseFee => self.base_fee = None,
            HeaderField::WithdrawalsRoot => self.withdrawals_root = None,
            HeaderField::BlobGasUsed => self.blob_gas_used = None,
            HeaderField::ExcessBlobGas => self.excess_blob_gas = None,
            HeaderField::ParentBeaconBlockRoot => self.parent_beacon_block_root = None,
            _ => {}
        }
    }

    /// Clear every optional field the predicate rejects
    pub fn retain_fields(&mut self, mut supported: impl FnMut(HeaderField) -> bool) {
        for field in HeaderField::OPTIONAL {
            if !supported(field) {
                self.clear_optional(field);
            }
        }
    }

    fn field_count(&self) -> usize {
        15 + HeaderField::OPTIONAL
            .iter()
            .filter(|f| self.has_field(**f))
            .count()
    }

    /// RLP encoding
    pub fn rlp_bytes(&self) -> Vec<u8> {
        chainfill_rlp::encode(self)
    }

    /// Hash of the RLP encoding
    pub fn hash_slow(&self) -> H256 {
        keccak256(&self.rlp_bytes())
    }

    /// Freeze the header together with its hash
    pub fn seal(self) -> SealedHeader {
        let hash = self.hash_slow();
        SealedHeader { header: self, hash }
    }
}

impl Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(self.field_count());
        s.append(&self.parent_hash);
        s.append(&self.ommers_hash);
        s.append(&self.coinbase);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.bloom);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data);
        s.append(&self.mix_hash);
        s.append(&self.nonce.to_be_bytes().to_vec());
        utils::append_opt(s, &self.base_fee);
        utils::append_opt(s, &self.withdrawals_root);
        utils::append_opt(s, &self.blob_gas_used);
        utils::append_opt(s, &self.excess_blob_gas);
        utils::append_opt(s, &self.parent_beacon_block_root);
    }
}

impl Decodable for Header {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        let count = rlp.item_count()?;
        if !(15..=20).contains(&count) {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let nonce_bytes: Vec<u8> = rlp.val_at(14)?;
        let nonce_arr: [u8; 8] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| DecoderError::RlpInvalidLength)?;
        Ok(Header {
            parent_hash: rlp.val_at(0)?,
            ommers_hash: rlp.val_at(1)?,
            coinbase: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            bloom: rlp.val_at(6)?,
            difficulty: rlp.val_at(7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: rlp.val_at(12)?,
            mix_hash: rlp.val_at(13)?,
            nonce: u64::from_be_bytes(nonce_arr),
            base_fee: utils::decode_opt(rlp, 15)?,
            withdrawals_root: utils::decode_opt(rlp, 16)?,
            blob_gas_used: utils::decode_opt(rlp, 17)?,
            excess_blob_gas: utils::decode_opt(rlp, 18)?,
            parent_beacon_block_root: utils::decode_opt(rlp, 19)?,
        })
    }
}

/// A header frozen together with its hash.
///
/// The hash is computed once from the RLP encoding and is the only source
/// for "the hash of a block".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedHeader {
    header: Header,
    hash: H256,
}

impl SealedHeader {
    /// Block hash
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// The unsealed header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Give back the header for modification; it must be sealed again.
    pub fn unseal(self) -> Header {
        self.header
    }
}

impl Deref for SealedHeader {
    type Target = Header;

    fn deref(&self) -> &Header {
        &self.header
    }
}

#[derive(Serialize)]
struct SealedHeaderRef<'a> {
    #[serde(flatten)]
    header: &'a Header,
    hash: H256,
}

#[derive(Deserialize)]
struct SealedHeaderOwned {
    #[serde(flatten)]
    header: Header,
    hash: Option<H256>,
}

impl Serialize for SealedHeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SealedHeaderRef {
            header: &self.header,
            hash: self.hash,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SealedHeader {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let owned = SealedHeaderOwned::deserialize(deserializer)?;
        let sealed = owned.header.seal();
        match owned.hash {
            Some(hash) if hash != sealed.hash => Err(de::Error::custom(format!(
                "header hash mismatch: declared {}, computed {}",
                hash, sealed.hash
            ))),
            _ => Ok(sealed),
        }
    }
}

/// One field whose value differs from what was expected
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMismatch {
    /// Field name
    pub field: HeaderField,
    /// Expected value
    pub expected: String,
    /// Value found in the header
    pub actual: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Partial header.
///
/// Used two ways by block definitions: as a set of expected values checked
/// against the constructed header, and as overrides written into the header
/// right before it is hashed (with `removeFields` dropping optional fields).
/// Field names and encodings mirror [`Header`].
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderPatch {
    pub parent_hash: Option<H256>,
    #[serde(rename = "uncleHash")]
    pub ommers_hash: Option<H256>,
    pub coinbase: Option<Address>,
    pub state_root: Option<H256>,
    #[serde(rename = "transactionsTrie")]
    pub transactions_root: Option<H256>,
    #[serde(rename = "receiptTrie")]
    pub receipts_root: Option<H256>,
    pub bloom: Option<Bloom>,
    #[serde(with = "quantity::opt_u256_padded")]
    pub difficulty: Option<U256>,
    #[serde(with = "quantity::opt_padded")]
    pub number: Option<u64>,
    #[serde(with = "quantity::opt_padded")]
    pub gas_limit: Option<u64>,
    #[serde(with = "quantity::opt_padded")]
    pub gas_used: Option<u64>,
    #[serde(with = "quantity::opt_padded")]
    pub timestamp: Option<u64>,
    #[serde(with = "quantity::opt_bytes")]
    pub extra_data: Option<Vec<u8>>,
    pub mix_hash: Option<H256>,
    #[serde(with = "quantity::opt_padded")]
    pub nonce: Option<u64>,
    #[serde(rename = "baseFeePerGas", with = "quantity::opt_padded")]
    pub base_fee: Option<u64>,
    pub withdrawals_root: Option<H256>,
    #[serde(with = "quantity::opt_padded")]
    pub blob_gas_used: Option<u64>,
    #[serde(with = "quantity::opt_padded")]
    pub excess_blob_gas: Option<u64>,
    pub parent_beacon_block_root: Option<H256>,
    /// Optional fields to drop from the header
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_fields: Vec<HeaderField>,
}

fn overwrite<T: Clone>(dst: &mut T, src: &Option<T>) {
    if let Some(v) = src {
        *dst = v.clone();
    }
}

fn overwrite_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

struct Checker(Vec<FieldMismatch>);

impl Checker {
    fn check<T: PartialEq>(
        &mut self,
        field: HeaderField,
        expected: &Option<T>,
        actual: Option<&T>,
        render: impl Fn(&T) -> String,
    ) {
        let Some(expected) = expected else { return };
        if actual != Some(expected) {
            self.0.push(FieldMismatch {
                field,
                expected: render(expected),
                actual: actual.map(&render).unwrap_or_else(|| "absent".to_string()),
            });
        }
    }
}

impl HeaderPatch {
    /// Compare every set field against `header`
    pub fn verify(&self, header: &Header) -> Result<(), Vec<FieldMismatch>> {
        use HeaderField as F;
        let mut c = Checker(Vec::new());
        c.check(F::ParentHash, &self.parent_hash, Some(&header.parent_hash), H256::to_hex);
        c.check(F::OmmersHash, &self.ommers_hash, Some(&header.ommers_hash), H256::to_hex);
        c.check(F::Coinbase, &self.coinbase, Some(&header.coinbase), Address::to_hex);
        c.check(F::StateRoot, &self.state_root, Some(&header.state_root), H256::to_hex);
        c.check(
            F::TransactionsRoot,
            &self.transactions_root,
            Some(&header.transactions_root),
            H256::to_hex,
        );
        c.check(F::ReceiptsRoot, &self.receipts_root, Some(&header.receipts_root), H256::to_hex);
        c.check(F::Bloom, &self.bloom, Some(&header.bloom), Bloom::to_hex);
        c.check(F::Difficulty, &self.difficulty, Some(&header.difficulty), |v| v.to_string());
        c.check(F::Number, &self.number, Some(&header.number), u64::to_string);
        c.check(F::GasLimit, &self.gas_limit, Some(&header.gas_limit), u64::to_string);
        c.check(F::GasUsed, &self.gas_used, Some(&header.gas_used), u64::to_string);
        c.check(F::Timestamp, &self.timestamp, Some(&header.timestamp), u64::to_string);
        c.check(
            F::ExtraData,
            &self.extra_data,
            Some(&header.extra_data),
            |v| quantity::to_hex_bytes(v),
        );
        c.check(F::MixHash, &self.mix_hash, Some(&header.mix_hash), H256::to_hex);
        c.check(F::Nonce, &self.nonce, Some(&header.nonce), u64::to_string);
        c.check(F::BaseFee, &self.base_fee, header.base_fee.as_ref(), u64::to_string);
        c.check(
            F::WithdrawalsRoot,
            &self.withdrawals_root,
            header.withdrawals_root.as_ref(),
            H256::to_hex,
        );
        c.check(F::BlobGasUsed, &self.blob_gas_used, header.blob_gas_used.as_ref(), u64::to_string);
        c.check(
            F::ExcessBlobGas,
            &self.excess_blob_gas,
            header.excess_blob_gas.as_ref(),
            u64::to_string,
        );
        c.check(
            F::ParentBeaconBlockRoot,
            &self.parent_beacon_block_root,
            header.parent_beacon_block_root.as_ref(),
            H256::to_hex,
        );
        if c.0.is_empty() {
            Ok(())
        } else {
            Err(c.0)
        }
    }

    /// Write every set field into `header`, then drop `remove_fields`
    pub fn apply(&self, header: &mut Header) -> TypesResult<()> {
        overwrite(&mut header.parent_hash, &self.parent_hash);
        overwrite(&mut header.ommers_hash, &self.ommers_hash);
        overwrite(&mut header.coinbase, &self.coinbase);
        overwrite(&mut header.state_root, &self.state_root);
        overwrite(&mut header.transactions_root, &self.transactions_root);
        overwrite(&mut header.receipts_root, &self.receipts_root);
        overwrite(&mut header.bloom, &self.bloom);
        overwrite(&mut header.difficulty, &self.difficulty);
        overwrite(&mut header.number, &self.number);
        overwrite(&mut header.gas_limit, &self.gas_limit);
        overwrite(&mut header.gas_used, &self.gas_used);
        overwrite(&mut header.timestamp, &self.timestamp);
        overwrite(&mut header.extra_data, &self.extra_data);
        overwrite(&mut header.mix_hash, &self.mix_hash);
        overwrite(&mut header.nonce, &self.nonce);
        overwrite_opt(&mut header.base_fee, &self.base_fee);
        overwrite_opt(&mut header.withdrawals_root, &self.withdrawals_root);
        overwrite_opt(&mut header.blob_gas_used, &self.blob_gas_used);
        overwrite_opt(&mut header.excess_blob_gas, &self.excess_blob_gas);
        overwrite_opt(&mut header.parent_beacon_block_root, &self.parent_beacon_block_root);
        for field in &self.remove_fields {
            header.clear_field(*field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn london_header() -> Header {
        Header {
            ommers_hash: EMPTY_OMMERS_HASH,
            state_root: H256::from_bytes([0x11; 32]),
            transactions_root: EMPTY_TRIE_ROOT,
            receipts_root: EMPTY_TRIE_ROOT,
            difficulty: U256::from(0x20000),
            number: 1,
            gas_limit: 100_000_000_000_000_000,
            timestamp: 12,
            extra_data: vec![0x00],
            base_fee: Some(7),
            ..Default::default()
        }
    }

    // ==================== Constants ====================

    #[test]
    fn test_empty_ommers_hash() {
        assert_eq!(EMPTY_OMMERS_HASH, keccak256(&[0xc0]));
    }

    // ==================== RLP ====================

    #[test]
    fn test_header_rlp_roundtrip() {
        let header = london_header();
        let encoded = header.rlp_bytes();
        let decoded: Header = chainfill_rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.hash_slow(), header.hash_slow());
    }

    #[test]
    fn test_optional_fields_extend_the_list() {
        let mut header = london_header();
        let london = Rlp::new(&header.rlp_bytes()).item_count().unwrap();
        assert_eq!(london, 16);

        header.withdrawals_root = Some(EMPTY_TRIE_ROOT);
        assert_eq!(Rlp::new(&header.rlp_bytes()).item_count().unwrap(), 17);

        header.retain_fields(|f| f != HeaderField::WithdrawalsRoot && f != HeaderField::BaseFee);
        assert_eq!(Rlp::new(&header.rlp_bytes()).item_count().unwrap(), 15);
    }

    #[test]
    fn test_retain_fields_keeps_mandatory_fields() {
        let mut header = london_header();
        header.withdrawals_root = Some(EMPTY_TRIE_ROOT);
        header.retain_fields(|_| false);
        assert_eq!(header.base_fee, None);
        assert_eq!(header.withdrawals_root, None);
        assert_eq!(header.number, 1);
        assert_eq!(header.gas_limit, 100_000_000_000_000_000);
        assert_eq!(Rlp::new(&header.rlp_bytes()).item_count().unwrap(), 15);
    }

    #[test]
    fn test_clear_field_rejects_mandatory_field() {
        let mut header = london_header();
        assert!(matches!(
            header.clear_field(HeaderField::GasUsed),
            Err(TypesError::InvalidHeaderPatch(_))
        ));
        header.clear_field(HeaderField::BaseFee).unwrap();
        assert!(!header.has_field(HeaderField::BaseFee));
    }

    #[test]
    fn test_nonce_is_eight_bytes() {
        let header = Header::default();
        let encoded = header.rlp_bytes();
        let rlp = Rlp::new(&encoded);
        let nonce: Vec<u8> = rlp.val_at(14).unwrap();
        assert_eq!(nonce, vec![0u8; 8]);
    }

    #[test]
    fn test_seal_hash_changes_with_fields() {
        let a = london_header().seal();
        let mut other = london_header();
        other.timestamp += 1;
        assert_ne!(a.hash(), other.seal().hash());
        assert_eq!(a.hash(), london_header().seal().hash());
    }

    // ==================== JSON ====================

    #[test]
    fn test_header_json_names_and_padding() {
        let sealed = london_header().seal();
        let json = serde_json::to_value(&sealed).unwrap();
        assert_eq!(json["number"], "0x01");
        assert_eq!(json["difficulty"], "0x020000");
        assert_eq!(json["baseFeePerGas"], "0x07");
        assert_eq!(json["nonce"], "0x0000000000000000");
        assert_eq!(json["extraData"], "0x00");
        assert_eq!(json["uncleHash"], EMPTY_OMMERS_HASH.to_hex());
        assert!(json.get("withdrawalsRoot").is_none());
        assert_eq!(json["hash"], sealed.hash().to_hex());

        let back: SealedHeader = serde_json::from_value(json).unwrap();
        assert_eq!(back, sealed);
    }

    #[test]
    fn test_sealed_header_rejects_wrong_hash() {
        let mut json = serde_json::to_value(london_header().seal()).unwrap();
        json["hash"] = serde_json::Value::String(H256::ZERO.to_hex());
        assert!(serde_json::from_value::<SealedHeader>(json).is_err());
    }

    #[test]
    fn test_header_field_display() {
        assert_eq!(HeaderField::OmmersHash.to_string(), "uncleHash");
        assert_eq!(HeaderField::BaseFee.to_string(), "baseFeePerGas");
        assert_eq!(HeaderField::GasLimit.to_string(), "gasLimit");
    }

    // ==================== Patches ====================

    #[test]
    fn test_patch_verify_reports_all_mismatches() {
        let header = london_header();
        let patch = HeaderPatch {
            number: Some(1),
            gas_used: Some(21_000),
            withdrawals_root: Some(EMPTY_TRIE_ROOT),
            ..Default::default()
        };
        let mismatches = patch.verify(&header).unwrap_err();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].field, HeaderField::GasUsed);
        assert_eq!(mismatches[0].expected, "21000");
        assert_eq!(mismatches[1].field, HeaderField::WithdrawalsRoot);
        assert_eq!(mismatches[1].actual, "absent");
    }

    #[test]
    fn test_patch_apply_and_remove() {
        let mut header = london_header();
        let patch: HeaderPatch = serde_json::from_str(
            r#"{"stateRoot": "0x01", "gasLimit": "0x5208", "removeFields": ["baseFeePerGas"]}"#,
        )
        .unwrap();
        patch.apply(&mut header).unwrap();
        assert_eq!(header.state_root, H256::from_hex_padded("0x01").unwrap());
        assert_eq!(header.gas_limit, 21_000);
        assert_eq!(header.base_fee, None);
    }

    #[test]
    fn test_patch_cannot_remove_mandatory_field() {
        let mut header = london_header();
        let patch = HeaderPatch {
            remove_fields: vec![HeaderField::Number],
            ..Default::default()
        };
        assert!(matches!(
            patch.apply(&mut header),
            Err(TypesError::InvalidHeaderPatch(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_header_rlp_roundtrip(
            number in any::<u64>(),
            gas_limit in any::<u64>(),
            gas_used in any::<u64>(),
            timestamp in any::<u64>(),
            nonce in any::<u64>(),
            extra in proptest::collection::vec(any::<u8>(), 0..32),
            base_fee in proptest::option::of(any::<u64>()),
        ) {
            let header = Header {
                number, gas_limit, gas_used, timestamp, nonce,
                extra_data: extra,
                base_fee,
                ..Default::default()
            };
            let decoded: Header = chainfill_rlp::decode(&header.rlp_bytes()).unwrap();
            prop_assert_eq!(decoded, header);
        }
    }
}
