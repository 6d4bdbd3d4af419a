//! Post-state verification

use chainfill_primitives::{quantity, Address, U256};
use chainfill_types::{Account, Alloc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::definition::AccountExpectation;

/// Part of an account that differs from its expectation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountField {
    /// The account should not exist, or should but does not
    Existence,
    /// Balance
    Balance,
    /// Nonce
    Nonce,
    /// Code
    Code,
    /// One storage slot
    Storage(U256),
}

impl fmt::Display for AccountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountField::Existence => f.write_str("existence"),
            AccountField::Balance => f.write_str("balance"),
            AccountField::Nonce => f.write_str("nonce"),
            AccountField::Code => f.write_str("code"),
            AccountField::Storage(slot) => write!(f, "storage[{}]", quantity::to_padded_hex(*slot)),
        }
    }
}

/// One differing account field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountMismatch {
    /// Account address
    pub address: Address,
    /// Which field differs
    pub field: AccountField,
    /// Expected value
    pub expected: String,
    /// Value found in the final allocation
    pub actual: String,
}

impl fmt::Display for AccountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: expected {}, got {}",
            self.address, self.field, self.expected, self.actual
        )
    }
}

/// Check every listed account against `alloc`.
///
/// A `None` expectation means the account must be absent. Addresses not
/// listed in `expected` are not looked at.
pub fn verify_post_state(
    expected: &BTreeMap<Address, Option<AccountExpectation>>,
    alloc: &Alloc,
) -> Result<(), Vec<AccountMismatch>> {
    let mut mismatches = Vec::new();
    for (address, expectation) in expected {
        match (expectation, alloc.get(address)) {
            (None, None) => {}
            (None, Some(_)) => mismatches.push(AccountMismatch {
                address: *address,
                field: AccountField::Existence,
                expected: "absent".to_string(),
                actual: "present".to_string(),
            }),
            (Some(_), None) => mismatches.push(AccountMismatch {
                address: *address,
                field: AccountField::Existence,
                expected: "present".to_string(),
                actual: "absent".to_string(),
            }),
            (Some(expectation), Some(account)) => {
                check_account(*address, expectation, account, &mut mismatches)
            }
        }
    }
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(mismatches)
    }
}

fn check_account(
    address: Address,
    expected: &AccountExpectation,
    account: &Account,
    out: &mut Vec<AccountMismatch>,
) {
    let mut push = |field, expected: String, actual: String| {
        out.push(AccountMismatch {
            address,
            field,
            expected,
            actual,
        })
    };

    if let Some(balance) = expected.balance {
        if balance != account.balance {
            push(
                AccountField::Balance,
                quantity::to_padded_hex(balance),
                quantity::to_padded_hex(account.balance),
            );
        }
    }
    if let Some(nonce) = expected.nonce {
        if nonce != account.nonce {
            push(AccountField::Nonce, nonce.to_string(), account.nonce.to_string());
        }
    }
    if let Some(code) = &expected.code {
        if code != &account.code {
            push(
                AccountField::Code,
                quantity::to_hex_bytes(code),
                quantity::to_hex_bytes(&account.code),
            );
        }
    }
    if let Some(storage) = &expected.storage {
        let slots: BTreeSet<U256> = storage
            .0
            .keys()
            .chain(account.storage.0.keys())
            .copied()
            .collect();
        for slot in slots {
            let want = storage.get(&slot);
            let got = account.storage.get(&slot);
            if want != got {
                push(
                    AccountField::Storage(slot),
                    quantity::to_padded_hex(want),
                    quantity::to_padded_hex(got),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfill_types::Storage;
    use proptest::prelude::*;

    fn alloc_with(address: Address, account: Account) -> Alloc {
        let mut alloc = Alloc::new();
        alloc.insert(address, account);
        alloc
    }

    // ==================== Listed accounts ====================

    #[test]
    fn test_matching_account_passes() {
        let addr = Address::from_low_u64_be(0x100);
        let alloc = alloc_with(addr, Account::with_balance(U256::from(1000)));
        let mut expected = BTreeMap::new();
        expected.insert(
            addr,
            Some(AccountExpectation {
                balance: Some(U256::from(1000)),
                nonce: Some(0),
                ..Default::default()
            }),
        );
        assert!(verify_post_state(&expected, &alloc).is_ok());
    }

    #[test]
    fn test_collects_every_mismatch() {
        let addr = Address::from_low_u64_be(0x100);
        let alloc = alloc_with(
            addr,
            Account {
                balance: U256::from(1),
                nonce: 2,
                code: vec![0x00],
                storage: Storage::default(),
            },
        );
        let mut expected = BTreeMap::new();
        expected.insert(
            addr,
            Some(AccountExpectation {
                balance: Some(U256::from(5)),
                nonce: Some(1),
                code: Some(vec![]),
                storage: None,
            }),
        );
        let mismatches = verify_post_state(&expected, &alloc).unwrap_err();
        let fields: Vec<_> = mismatches.iter().map(|m| m.field.clone()).collect();
        assert_eq!(
            fields,
            vec![AccountField::Balance, AccountField::Nonce, AccountField::Code]
        );
        assert!(mismatches[0].to_string().contains("balance"));
    }

    // ==================== Existence ====================

    #[test]
    fn test_null_expectation_requires_absence() {
        let addr = Address::from_low_u64_be(0x200);
        let mut expected = BTreeMap::new();
        expected.insert(addr, None);
        assert!(verify_post_state(&expected, &Alloc::new()).is_ok());

        let alloc = alloc_with(addr, Account::default());
        let mismatches = verify_post_state(&expected, &alloc).unwrap_err();
        assert_eq!(mismatches[0].field, AccountField::Existence);
    }

    #[test]
    fn test_missing_account() {
        let mut expected = BTreeMap::new();
        expected.insert(Address::from_low_u64_be(1), Some(AccountExpectation::default()));
        let mismatches = verify_post_state(&expected, &Alloc::new()).unwrap_err();
        assert_eq!(mismatches[0].expected, "present");
    }

    #[test]
    fn test_unlisted_accounts_ignored() {
        let alloc = alloc_with(Address::from_low_u64_be(9), Account::with_balance(U256::one()));
        assert!(verify_post_state(&BTreeMap::new(), &alloc).is_ok());
    }

    // ==================== Storage ====================

    #[test]
    fn test_storage_checked_both_ways() {
        let addr = Address::from_low_u64_be(0x100);
        let actual: Storage = [(U256::zero(), U256::one()), (U256::from(2), U256::from(3))]
            .into_iter()
            .collect();
        let alloc = alloc_with(
            addr,
            Account {
                storage: actual,
                ..Default::default()
            },
        );

        let listed: Storage = [(U256::zero(), U256::one()), (U256::from(1), U256::zero())]
            .into_iter()
            .collect();
        let mut expected = BTreeMap::new();
        expected.insert(
            addr,
            Some(AccountExpectation {
                storage: Some(listed),
                ..Default::default()
            }),
        );
        let mismatches = verify_post_state(&expected, &alloc).unwrap_err();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, AccountField::Storage(U256::from(2)));
        assert_eq!(mismatches[0].expected, "0x00");
    }

    // ==================== Properties ====================

    proptest! {
        #[test]
        fn prop_account_matches_its_own_expectation(
            balance in any::<u64>(),
            nonce in any::<u64>(),
            code in proptest::collection::vec(any::<u8>(), 0..32),
            slots in proptest::collection::btree_map(any::<u64>(), 1u64.., 0..8),
        ) {
            let addr = Address::from_low_u64_be(0x42);
            let storage: Storage = slots
                .into_iter()
                .map(|(k, v)| (U256::from(k), U256::from(v)))
                .collect();
            let account = Account {
                balance: U256::from(balance),
                nonce,
                code: code.clone(),
                storage: storage.clone(),
            };
            let mut expected = BTreeMap::new();
            expected.insert(
                addr,
                Some(AccountExpectation {
                    balance: Some(U256::from(balance)),
                    nonce: Some(nonce),
                    code: Some(code),
                    storage: Some(storage),
                }),
            );
            prop_assert!(verify_post_state(&expected, &alloc_with(addr, account)).is_ok());
        }
    }
}
