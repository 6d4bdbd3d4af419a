//! Named mainnet forks and the rules each one introduces

use chainfill_primitives::{Address, U256};
use chainfill_types::{Account, Alloc, HeaderField};
use std::fmt;
use std::str::FromStr;

use crate::error::ForkError;

/// EIP-4788 beacon roots contract address
pub const BEACON_ROOTS_ADDRESS: Address = Address::from_bytes([
    0x00, 0x0f, 0x3d, 0xf6, 0xd7, 0x32, 0x80, 0x7e, 0xf1, 0x31, 0x9f, 0xb7, 0xb8, 0xbb, 0x85, 0x22,
    0xd0, 0xbe, 0xac, 0x02,
]);

/// EIP-4788 beacon roots contract runtime code
pub const BEACON_ROOTS_CODE: &[u8] = &[
    0x33, 0x73, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0x14, 0x60, 0x4d, 0x57, 0x60, 0x20, 0x36, 0x14, 0x60, 0x24,
    0x57, 0x5f, 0x5f, 0xfd, 0x5b, 0x5f, 0x35, 0x80, 0x15, 0x60, 0x49, 0x57, 0x62, 0x00, 0x1f, 0xff,
    0x81, 0x06, 0x90, 0x81, 0x54, 0x14, 0x60, 0x3c, 0x57, 0x5f, 0x5f, 0xfd, 0x5b, 0x62, 0x00, 0x1f,
    0xff, 0x01, 0x54, 0x5f, 0x52, 0x60, 0x20, 0x5f, 0xf3, 0x5b, 0x5f, 0x5f, 0xfd, 0x5b, 0x62, 0x00,
    0x1f, 0xff, 0x42, 0x06, 0x42, 0x81, 0x55, 0x5f, 0x35, 0x90, 0x62, 0x00, 0x1f, 0xff, 0x01, 0x55,
    0x00,
];

const ETHER: u64 = 1_000_000_000_000_000_000;

/// Mainnet forks in activation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamedFork {
    /// Frontier
    Frontier,
    /// Homestead
    Homestead,
    /// Byzantium
    Byzantium,
    /// Constantinople (with Petersburg fixes)
    Constantinople,
    /// Istanbul
    Istanbul,
    /// Berlin
    Berlin,
    /// London
    London,
    /// Paris (the merge)
    Paris,
    /// Shanghai
    Shanghai,
    /// Cancun
    Cancun,
}

impl NamedFork {
    /// Every named fork, oldest first
    pub const ALL: [NamedFork; 10] = [
        NamedFork::Frontier,
        NamedFork::Homestead,
        NamedFork::Byzantium,
        NamedFork::Constantinople,
        NamedFork::Istanbul,
        NamedFork::Berlin,
        NamedFork::London,
        NamedFork::Paris,
        NamedFork::Shanghai,
        NamedFork::Cancun,
    ];

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            NamedFork::Frontier => "Frontier",
            NamedFork::Homestead => "Homestead",
            NamedFork::Byzantium => "Byzantium",
            NamedFork::Constantinople => "ConstantinopleFix",
            NamedFork::Istanbul => "Istanbul",
            NamedFork::Berlin => "Berlin",
            NamedFork::London => "London",
            NamedFork::Paris => "Paris",
            NamedFork::Shanghai => "Shanghai",
            NamedFork::Cancun => "Cancun",
        }
    }

    /// Name understood by `evm t8n --state.fork`
    pub fn transition_tool_name(&self) -> &'static str {
        match self {
            NamedFork::Paris => "Merge",
            other => other.as_str(),
        }
    }

    /// Whether blocks are produced by the beacon chain
    pub fn is_post_merge(&self) -> bool {
        *self >= NamedFork::Paris
    }

    /// Whether the optional header field exists from this fork on
    pub fn has_header_field(&self, field: HeaderField) -> bool {
        match field {
            HeaderField::BaseFee => *self >= NamedFork::London,
            HeaderField::WithdrawalsRoot => *self >= NamedFork::Shanghai,
            HeaderField::BlobGasUsed
            | HeaderField::ExcessBlobGas
            | HeaderField::ParentBeaconBlockRoot => *self >= NamedFork::Cancun,
            _ => true,
        }
    }

    /// Miner reward per block, in wei
    pub fn block_reward(&self) -> U256 {
        let ether = match self {
            NamedFork::Frontier | NamedFork::Homestead => 5,
            NamedFork::Byzantium => 3,
            f if f.is_post_merge() => 0,
            _ => 2,
        };
        U256::from(ether) * U256::from(ETHER)
    }

    /// Accounts the fork requires in every genesis
    pub fn required_accounts(&self) -> Alloc {
        let mut alloc = Alloc::new();
        if *self >= NamedFork::Cancun {
            alloc.insert(
                BEACON_ROOTS_ADDRESS,
                Account {
                    nonce: 1,
                    code: BEACON_ROOTS_CODE.to_vec(),
                    ..Default::default()
                },
            );
        }
        alloc
    }

    /// `engine_newPayloadVN`, `None` before the merge
    pub fn new_payload_version(&self) -> Option<u8> {
        match self {
            NamedFork::Paris => Some(1),
            NamedFork::Shanghai => Some(2),
            NamedFork::Cancun => Some(3),
            _ => None,
        }
    }

    /// `engine_forkchoiceUpdatedVN`, `None` before the merge
    pub fn fcu_version(&self) -> Option<u8> {
        self.new_payload_version()
    }
}

impl fmt::Display for NamedFork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamedFork {
    type Err = ForkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let fork = match lower.as_str() {
            "merge" => NamedFork::Paris,
            "constantinople" | "petersburg" => NamedFork::Constantinople,
            other => NamedFork::ALL
                .into_iter()
                .find(|f| f.as_str().to_ascii_lowercase() == other)
                .ok_or_else(|| ForkError::UnknownFork(s.to_string()))?,
        };
        Ok(fork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewards() {
        assert_eq!(NamedFork::Frontier.block_reward(), U256::from(5) * U256::from(ETHER));
        assert_eq!(NamedFork::Byzantium.block_reward(), U256::from(3) * U256::from(ETHER));
        assert_eq!(NamedFork::London.block_reward(), U256::from(2) * U256::from(ETHER));
        assert!(NamedFork::Paris.block_reward().is_zero());
        assert!(NamedFork::Cancun.block_reward().is_zero());
    }

    #[test]
    fn test_header_fields() {
        assert!(!NamedFork::Berlin.has_header_field(HeaderField::BaseFee));
        assert!(NamedFork::London.has_header_field(HeaderField::BaseFee));
        assert!(!NamedFork::Paris.has_header_field(HeaderField::WithdrawalsRoot));
        assert!(NamedFork::Shanghai.has_header_field(HeaderField::WithdrawalsRoot));
        assert!(!NamedFork::Shanghai.has_header_field(HeaderField::ParentBeaconBlockRoot));
        assert!(NamedFork::Cancun.has_header_field(HeaderField::ExcessBlobGas));
        assert!(NamedFork::Frontier.has_header_field(HeaderField::StateRoot));
    }

    #[test]
    fn test_cancun_pre_allocation() {
        assert!(NamedFork::Shanghai.required_accounts().is_empty());
        let alloc = NamedFork::Cancun.required_accounts();
        let account = &alloc[&BEACON_ROOTS_ADDRESS];
        assert_eq!(account.nonce, 1);
        assert_eq!(account.code.len(), 97);
        assert_eq!(
            BEACON_ROOTS_ADDRESS.to_hex(),
            "0x000f3df6d732807ef1319fb7b8bb8522d0beac02"
        );
    }

    #[test]
    fn test_engine_versions() {
        assert_eq!(NamedFork::London.new_payload_version(), None);
        assert_eq!(NamedFork::Paris.new_payload_version(), Some(1));
        assert_eq!(NamedFork::Shanghai.fcu_version(), Some(2));
        assert_eq!(NamedFork::Cancun.new_payload_version(), Some(3));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cancun".parse::<NamedFork>().unwrap(), NamedFork::Cancun);
        assert_eq!("Merge".parse::<NamedFork>().unwrap(), NamedFork::Paris);
        assert_eq!("ConstantinopleFix".parse::<NamedFork>().unwrap(), NamedFork::Constantinople);
        assert!("Prague".parse::<NamedFork>().is_err());
        assert_eq!(NamedFork::Paris.transition_tool_name(), "Merge");
    }
}
