//! The fork capability interface

use chainfill_primitives::{H256, U256};
use chainfill_types::{Alloc, Environment, HeaderField};
use std::fmt;

use crate::named::NamedFork;

/// Everything the filler needs to know about a fork.
///
/// A fork may change rules mid-chain (see [`TransitionFork`]); every
/// capability is therefore asked at a block number and timestamp.
pub trait Fork: fmt::Debug + Send + Sync {
    /// Label used in fixture names and the `network` field
    fn name(&self) -> String;

    /// Rules in force at the given block
    fn fork_at(&self, number: u64, timestamp: u64) -> NamedFork;

    /// Fork name passed to the transition tool for this block
    fn fork_name(&self, number: u64, timestamp: u64) -> String {
        self.fork_at(number, timestamp)
            .transition_tool_name()
            .to_string()
    }

    /// Accounts that must exist in genesis
    fn pre_allocation(&self, number: u64, timestamp: u64) -> Alloc {
        self.fork_at(number, timestamp).required_accounts()
    }

    /// Block reward in wei
    fn get_reward(&self, number: u64, timestamp: u64) -> U256 {
        self.fork_at(number, timestamp).block_reward()
    }

    /// Whether headers at this block carry `field`
    fn supports_field(&self, field: HeaderField, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).has_header_field(field)
    }

    /// Fill in the environment values the fork requires but the block left
    /// unset.
    ///
    /// Values the transition tool derives from the parent (base fee, excess
    /// blob gas, pre-merge difficulty) are only defaulted when there is no
    /// parent to derive them from.
    fn set_field_defaults(&self, mut env: Environment) -> Environment {
        let fork = self.fork_at(env.number, env.timestamp);
        if fork.is_post_merge() {
            env.difficulty = Some(U256::zero());
            env.prev_randao.get_or_insert(H256::ZERO);
        }
        if fork.has_header_field(HeaderField::BaseFee) {
            if env.base_fee.is_none() && env.parent_base_fee.is_none() {
                env.base_fee = Some(7);
            }
        } else {
            env.base_fee = None;
        }
        if fork.has_header_field(HeaderField::WithdrawalsRoot) {
            env.withdrawals.get_or_insert_with(Vec::new);
        }
        if fork.has_header_field(HeaderField::ExcessBlobGas) {
            if env.excess_blob_gas.is_none() && env.parent_excess_blob_gas.is_none() {
                env.excess_blob_gas = Some(0);
            }
            env.blob_gas_used.get_or_insert(0);
            env.beacon_root.get_or_insert(H256::ZERO);
        } else {
            env.excess_blob_gas = None;
            env.blob_gas_used = None;
            env.beacon_root = None;
        }
        env
    }

    /// `engine_newPayload` version for this block
    fn engine_new_payload_version(&self, number: u64, timestamp: u64) -> Option<u8> {
        self.fork_at(number, timestamp).new_payload_version()
    }

    /// `engine_forkchoiceUpdated` version for this block
    fn forkchoice_updated_version(&self, number: u64, timestamp: u64) -> Option<u8> {
        self.fork_at(number, timestamp).fcu_version()
    }
}

impl Fork for NamedFork {
    fn name(&self) -> String {
        self.as_str().to_string()
    }

    fn fork_at(&self, _number: u64, _timestamp: u64) -> NamedFork {
        *self
    }
}

/// When a transition fork switches rules
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// From this block number on
    Block(u64),
    /// From this timestamp on
    Timestamp(u64),
}

/// Chain that starts on one fork and switches to the next mid-way
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionFork {
    /// Rules before activation
    pub from: NamedFork,
    /// Rules from activation on
    pub to: NamedFork,
    /// Switch point
    pub at: Activation,
}

impl TransitionFork {
    /// Create a new transition fork
    pub const fn new(from: NamedFork, to: NamedFork, at: Activation) -> Self {
        TransitionFork { from, to, at }
    }
}

impl Fork for TransitionFork {
    fn name(&self) -> String {
        match self.at {
            Activation::Block(n) => format!("{}To{}AtBlock{}", self.from, self.to, n),
            Activation::Timestamp(t) if t % 1000 == 0 => {
                format!("{}To{}AtTime{}k", self.from, self.to, t / 1000)
            }
            Activation::Timestamp(t) => format!("{}To{}AtTime{}", self.from, self.to, t),
        }
    }

    fn fork_at(&self, number: u64, timestamp: u64) -> NamedFork {
        let active = match self.at {
            Activation::Block(n) => number >= n,
            Activation::Timestamp(t) => timestamp >= t,
        };
        if active {
            self.to
        } else {
            self.from
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Defaults ====================

    #[test]
    fn test_cancun_genesis_defaults() {
        let env = NamedFork::Cancun.set_field_defaults(Environment::default());
        assert_eq!(env.base_fee, Some(7));
        assert_eq!(env.difficulty, Some(U256::zero()));
        assert_eq!(env.prev_randao, Some(H256::ZERO));
        assert_eq!(env.withdrawals, Some(vec![]));
        assert_eq!(env.excess_blob_gas, Some(0));
        assert_eq!(env.blob_gas_used, Some(0));
        assert_eq!(env.beacon_root, Some(H256::ZERO));
    }

    #[test]
    fn test_pre_merge_defaults() {
        let env = NamedFork::Berlin.set_field_defaults(Environment {
            base_fee: Some(1),
            ..Default::default()
        });
        assert_eq!(env.base_fee, None);
        assert_eq!(env.difficulty, None);
        assert_eq!(env.prev_randao, None);
        assert_eq!(env.withdrawals, None);
        assert_eq!(env.beacon_root, None);
    }

    #[test]
    fn test_base_fee_left_to_tool_with_parent() {
        let env = NamedFork::London.set_field_defaults(Environment {
            parent_base_fee: Some(7),
            ..Default::default()
        });
        assert_eq!(env.base_fee, None);
    }

    #[test]
    fn test_explicit_values_kept() {
        let env = NamedFork::Shanghai.set_field_defaults(Environment {
            base_fee: Some(1000),
            prev_randao: Some(H256::from_low_u64_be(1)),
            ..Default::default()
        });
        assert_eq!(env.base_fee, Some(1000));
        assert_eq!(env.prev_randao, Some(H256::from_low_u64_be(1)));
    }

    // ==================== Transitions ====================

    #[test]
    fn test_transition_by_timestamp() {
        let fork = TransitionFork::new(
            NamedFork::Shanghai,
            NamedFork::Cancun,
            Activation::Timestamp(15_000),
        );
        assert_eq!(fork.name(), "ShanghaiToCancunAtTime15k");
        assert_eq!(fork.fork_at(0, 14_999), NamedFork::Shanghai);
        assert_eq!(fork.fork_at(1, 15_000), NamedFork::Cancun);
        assert_eq!(fork.fork_name(1, 15_000), "Cancun");
        assert!(!fork.supports_field(HeaderField::BlobGasUsed, 0, 0));
        assert!(fork.supports_field(HeaderField::BlobGasUsed, 2, 20_000));
        assert_eq!(fork.forkchoice_updated_version(0, 0), Some(2));
        assert_eq!(fork.forkchoice_updated_version(3, 15_012), Some(3));
    }

    #[test]
    fn test_transition_by_block() {
        let fork = TransitionFork::new(NamedFork::Berlin, NamedFork::London, Activation::Block(5));
        assert_eq!(fork.name(), "BerlinToLondonAtBlock5");
        assert_eq!(fork.fork_at(4, 1_000_000), NamedFork::Berlin);
        assert_eq!(fork.fork_at(5, 0), NamedFork::London);
        assert!(!fork.get_reward(5, 0).is_zero());
    }
}
