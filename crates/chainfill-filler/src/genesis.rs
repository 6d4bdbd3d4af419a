//! Genesis block construction

use chainfill_forks::Fork;
use chainfill_primitives::{Address, H256, U256};
use chainfill_t8n::TransitionTool;
use chainfill_types::{
    merge_allocs, withdrawals_root, Alloc, Block, Bloom, Environment, Header, SealedHeader,
    EMPTY_OMMERS_HASH, EMPTY_TRIE_ROOT,
};

use crate::error::{FillError, FillResult};

/// Difficulty of pre-merge genesis blocks unless the environment sets one
pub const GENESIS_DIFFICULTY: u64 = 0x20000;

/// The genesis block and the state it commits to
#[derive(Clone, Debug)]
pub struct Genesis {
    /// Normalized genesis allocation
    pub alloc: Alloc,
    /// Sealed genesis header
    pub header: SealedHeader,
    /// Encoded genesis block
    pub rlp: Vec<u8>,
}

impl Genesis {
    /// Genesis block hash
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }
}

/// Builds genesis blocks for one fork
pub struct GenesisBuilder<'a> {
    fork: &'a dyn Fork,
    t8n: &'a dyn TransitionTool,
}

impl<'a> GenesisBuilder<'a> {
    /// Create a new builder
    pub fn new(fork: &'a dyn Fork, t8n: &'a dyn TransitionTool) -> Self {
        Self { fork, t8n }
    }

    /// Build the genesis block for `pre` under `environment`.
    ///
    /// Fork-mandated accounts are merged under `pre` (entries in `pre` win)
    /// and the state root comes from the transition tool.
    pub fn build(&self, pre: &Alloc, environment: &Environment) -> FillResult<Genesis> {
        let env = self.fork.set_field_defaults(environment.clone());
        if env.withdrawals.as_ref().map_or(false, |w| !w.is_empty()) {
            return Err(FillError::Config(
                "genesis environment must not contain withdrawals".to_string(),
            ));
        }
        if env.beacon_root.map_or(false, |root| !root.is_zero()) {
            return Err(FillError::Config(
                "genesis environment must not set a beacon root".to_string(),
            ));
        }

        let required = self.fork.pre_allocation(0, env.timestamp);
        let merged = merge_allocs(required, pre);
        let (alloc, state_root) = self.t8n.calc_state_root(&merged, self.fork)?;

        let mut header = Header {
            parent_hash: H256::ZERO,
            ommers_hash: EMPTY_OMMERS_HASH,
            coinbase: Address::ZERO,
            state_root,
            transactions_root: EMPTY_TRIE_ROOT,
            receipts_root: EMPTY_TRIE_ROOT,
            bloom: Bloom::ZERO,
            difficulty: env
                .difficulty
                .unwrap_or_else(|| U256::from(GENESIS_DIFFICULTY)),
            number: 0,
            gas_limit: env.gas_limit,
            gas_used: 0,
            timestamp: env.timestamp,
            extra_data: vec![0x00],
            mix_hash: H256::ZERO,
            nonce: 0,
            base_fee: env.base_fee,
            withdrawals_root: env.withdrawals.as_deref().map(withdrawals_root),
            blob_gas_used: env.blob_gas_used,
            excess_blob_gas: env.excess_blob_gas,
            parent_beacon_block_root: env.beacon_root,
        };
        header.retain_fields(|field| self.fork.supports_field(field, 0, env.timestamp));

        let block = Block::new(header.seal(), Vec::new(), env.withdrawals.clone());
        let rlp = block.rlp_bytes();
        tracing::info!(
            fork = %self.fork.name(),
            hash = %block.hash(),
            accounts = alloc.len(),
            "Built genesis"
        );

        Ok(Genesis {
            alloc,
            header: block.header,
            rlp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfill_forks::{Activation, NamedFork, TransitionFork, BEACON_ROOTS_ADDRESS};
    use chainfill_t8n::{EvaluateRequest, T8nOutput, T8nResult};
    use chainfill_types::Account;

    /// Echoes the allocation back with a fixed state root
    struct FixedRootTool;

    impl TransitionTool for FixedRootTool {
        fn name(&self) -> &str {
            "fixed-root"
        }

        fn evaluate(&self, request: &EvaluateRequest<'_>) -> T8nResult<T8nOutput> {
            let result = serde_json::from_value(serde_json::json!({
                "stateRoot": H256::from_low_u64_be(0xabc).to_hex(),
                "txRoot": EMPTY_TRIE_ROOT.to_hex(),
                "receiptsRoot": EMPTY_TRIE_ROOT.to_hex(),
                "logsBloom": format!("0x{}", "00".repeat(256)),
                "gasUsed": "0x0",
            }))?;
            Ok(T8nOutput {
                alloc: request.alloc.clone(),
                result,
            })
        }
    }

    // ==================== Header fields ====================

    #[test]
    fn test_pre_merge_genesis() {
        let genesis = GenesisBuilder::new(&NamedFork::London, &FixedRootTool)
            .build(&Alloc::new(), &Environment::default())
            .unwrap();
        let header = &genesis.header;
        assert_eq!(header.number, 0);
        assert_eq!(header.parent_hash, H256::ZERO);
        assert_eq!(header.state_root, H256::from_low_u64_be(0xabc));
        assert_eq!(header.difficulty, U256::from(GENESIS_DIFFICULTY));
        assert_eq!(header.extra_data, vec![0x00]);
        assert_eq!(header.base_fee, Some(7));
        assert!(header.withdrawals_root.is_none());
        assert!(header.parent_beacon_block_root.is_none());
    }

    #[test]
    fn test_cancun_genesis_fields() {
        let env = Environment {
            timestamp: 3,
            ..Default::default()
        };
        let genesis = GenesisBuilder::new(&NamedFork::Cancun, &FixedRootTool)
            .build(&Alloc::new(), &env)
            .unwrap();
        let header = &genesis.header;
        assert_eq!(header.timestamp, 3);
        assert_eq!(header.difficulty, U256::zero());
        assert_eq!(header.withdrawals_root, Some(EMPTY_TRIE_ROOT));
        assert_eq!(header.parent_beacon_block_root, Some(H256::ZERO));
        assert_eq!(header.blob_gas_used, Some(0));
        assert_eq!(genesis.hash(), Block::decode(&genesis.rlp).unwrap().hash());
    }

    #[test]
    fn test_genesis_timestamp_selects_transition_fork() {
        let fork = TransitionFork::new(
            NamedFork::Shanghai,
            NamedFork::Cancun,
            Activation::Timestamp(15_000),
        );
        let build = |timestamp| {
            let env = Environment {
                timestamp,
                ..Default::default()
            };
            GenesisBuilder::new(&fork, &FixedRootTool)
                .build(&Alloc::new(), &env)
                .unwrap()
        };

        let before = build(0);
        assert_eq!(before.header.timestamp, 0);
        assert_eq!(before.header.withdrawals_root, Some(EMPTY_TRIE_ROOT));
        assert_eq!(before.header.parent_beacon_block_root, None);
        assert_eq!(before.header.blob_gas_used, None);
        assert!(!before.alloc.contains_key(&BEACON_ROOTS_ADDRESS));

        // A genesis at the activation time is already a Cancun block
        let after = build(15_000);
        assert_eq!(after.header.timestamp, 15_000);
        assert_eq!(after.header.parent_beacon_block_root, Some(H256::ZERO));
        assert_eq!(after.header.blob_gas_used, Some(0));
        assert_eq!(after.header.excess_blob_gas, Some(0));
        assert!(after.alloc.contains_key(&BEACON_ROOTS_ADDRESS));
        assert_ne!(before.hash(), after.hash());
    }

    // ==================== Allocation ====================

    #[test]
    fn test_user_pre_wins_over_required_accounts() {
        let mut pre = Alloc::new();
        pre.insert(BEACON_ROOTS_ADDRESS, Account::with_balance(U256::from(5)));
        pre.insert(Address::from_low_u64_be(1), Account::with_balance(U256::one()));

        let genesis = GenesisBuilder::new(&NamedFork::Cancun, &FixedRootTool)
            .build(&pre, &Environment::default())
            .unwrap();
        assert_eq!(genesis.alloc.len(), 2);
        assert_eq!(genesis.alloc[&BEACON_ROOTS_ADDRESS].balance, U256::from(5));
        assert!(genesis.alloc[&BEACON_ROOTS_ADDRESS].code.is_empty());
    }

    #[test]
    fn test_required_accounts_added() {
        let genesis = GenesisBuilder::new(&NamedFork::Cancun, &FixedRootTool)
            .build(&Alloc::new(), &Environment::default())
            .unwrap();
        assert_eq!(genesis.alloc[&BEACON_ROOTS_ADDRESS].nonce, 1);
    }

    #[test]
    fn test_nonzero_beacon_root_rejected() {
        let env = Environment {
            beacon_root: Some(H256::from_low_u64_be(1)),
            ..Default::default()
        };
        let err = GenesisBuilder::new(&NamedFork::Cancun, &FixedRootTool)
            .build(&Alloc::new(), &env)
            .unwrap_err();
        assert!(matches!(err, FillError::Config(_)));
    }
}
