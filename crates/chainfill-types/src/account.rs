//! Account state and allocations

use chainfill_primitives::{quantity, Address, U256};
use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Contract storage, slot to value.
///
/// Both keys and values are rendered as even-length hex and parsed from any
/// hex or decimal quantity, so `"0x01"` and `"1"` name the same slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage(pub BTreeMap<U256, U256>);

impl Storage {
    /// Value at `slot`, zero when unset
    pub fn get(&self, slot: &U256) -> U256 {
        self.0.get(slot).copied().unwrap_or_default()
    }

    /// Set a slot
    pub fn insert(&mut self, slot: U256, value: U256) {
        self.0.insert(slot, value);
    }

    /// Slots holding a non-zero value
    pub fn non_zero(&self) -> impl Iterator<Item = (&U256, &U256)> {
        self.0.iter().filter(|(_, v)| !v.is_zero())
    }

    /// Whether no slot holds a non-zero value
    pub fn is_empty(&self) -> bool {
        self.non_zero().next().is_none()
    }
}

impl FromIterator<(U256, U256)> for Storage {
    fn from_iter<I: IntoIterator<Item = (U256, U256)>>(iter: I) -> Self {
        Storage(iter.into_iter().collect())
    }
}

impl Serialize for Storage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(&quantity::to_padded_hex(*k), &quantity::to_padded_hex(*v))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Storage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.iter()
            .map(|(k, v)| {
                let key = quantity::parse_u256(k).map_err(de::Error::custom)?;
                let value = quantity::parse_u256(v).map_err(de::Error::custom)?;
                Ok::<_, D::Error>((key, value))
            })
            .collect()
    }
}

/// State of a single account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Balance in wei
    #[serde(with = "quantity::u256_padded")]
    pub balance: U256,
    /// Nonce
    #[serde(with = "quantity::padded")]
    pub nonce: u64,
    /// Runtime code
    #[serde(with = "quantity::bytes")]
    pub code: Vec<u8>,
    /// Storage
    pub storage: Storage,
}

impl Account {
    /// Account holding only a balance
    pub fn with_balance(balance: U256) -> Self {
        Account {
            balance,
            ..Default::default()
        }
    }

    /// EIP-161 emptiness: no code, zero nonce, zero balance
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.nonce == 0 && self.balance.is_zero()
    }
}

/// Address to account mapping.
///
/// Ordered by address so that every rendering of an allocation is
/// byte-identical across runs.
pub type Alloc = BTreeMap<Address, Account>;

/// Overlay `overlay` on `base`; entries in `overlay` replace whole accounts.
pub fn merge_allocs(base: Alloc, overlay: &Alloc) -> Alloc {
    let mut merged = base;
    for (address, account) in overlay {
        merged.insert(*address, account.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_json_roundtrip() {
        let json = r#"{
            "balance": "1000000000000000000000",
            "nonce": "0x01",
            "code": "0x6001600055",
            "storage": {"0x00": "0x01", "2": "0x0a"}
        }"#;
        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.balance, U256::exp10(21));
        assert_eq!(account.nonce, 1);
        assert_eq!(account.code, vec![0x60, 0x01, 0x60, 0x00, 0x55]);
        assert_eq!(account.storage.get(&U256::zero()), U256::one());
        assert_eq!(account.storage.get(&U256::from(2)), U256::from(10));

        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["nonce"], "0x01");
        assert_eq!(value["storage"]["0x02"], "0x0a");
        let back: Account = serde_json::from_value(value).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn test_account_defaults() {
        let account: Account = serde_json::from_str(r#"{"balance": "0x10"}"#).unwrap();
        assert_eq!(account.nonce, 0);
        assert!(account.code.is_empty());
        assert!(account.storage.is_empty());
        assert!(!account.is_empty());
    }

    #[test]
    fn test_storage_zero_values_are_empty() {
        let storage: Storage = [(U256::one(), U256::zero())].into_iter().collect();
        assert!(storage.is_empty());
        assert_eq!(storage.get(&U256::from(99)), U256::zero());
    }

    #[test]
    fn test_merge_allocs_overlay_wins() {
        let addr = Address::from_low_u64_be(1);
        let mut base = Alloc::new();
        base.insert(addr, Account::with_balance(U256::from(1)));
        base.insert(Address::from_low_u64_be(2), Account::with_balance(U256::from(2)));

        let mut overlay = Alloc::new();
        overlay.insert(addr, Account::with_balance(U256::from(100)));

        let merged = merge_allocs(base, &overlay);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&addr].balance, U256::from(100));
    }

    #[test]
    fn test_alloc_serialization_is_ordered() {
        let mut alloc = Alloc::new();
        alloc.insert(Address::from_low_u64_be(2), Account::default());
        alloc.insert(Address::from_low_u64_be(1), Account::default());
        let json = serde_json::to_string(&alloc).unwrap();
        let first = json.find("0x0000000000000000000000000000000000000001").unwrap();
        let second = json.find("0x0000000000000000000000000000000000000002").unwrap();
        assert!(first < second);
    }
}
