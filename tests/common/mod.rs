// tests/common/mod.rs
#![allow(dead_code)]

use rollup_custody_core::{
    CallContext, CommitmentSubmission, Hash32, Identity, InMemoryCustody, RollupConfig,
    RollupCore, TokenId, NATIVE_TOKEN,
};
use solana_program::pubkey::Pubkey;

pub const DISPUTE_WINDOW: u64 = 100;
pub const OPERATOR_BOND: u64 = 1000;
pub const CHALLENGE_BOND: u64 = 500;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A core with one registered, funded operator
pub struct Harness {
    pub core: RollupCore<InMemoryCustody>,
    pub owner: Identity,
    pub custody_address: Identity,
    pub treasury: Identity,
    pub operator: Identity,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(adjust: impl FnOnce(RollupConfig) -> RollupConfig) -> Self {
        init_logger();

        let owner = Pubkey::new_unique();
        let custody_address = Pubkey::new_unique();
        let treasury = Pubkey::new_unique();
        let operator = Pubkey::new_unique();

        let config = adjust(
            RollupConfig::new(owner, custody_address, treasury).with_dispute_window(DISPUTE_WINDOW),
        );
        let mut custody = InMemoryCustody::new();
        custody.fund(operator, NATIVE_TOKEN, 10 * OPERATOR_BOND);

        let mut core = RollupCore::new(config, custody).expect("valid config");
        core.register_operator(&CallContext::new(owner, 1), operator)
            .expect("owner registers operator");

        Self {
            core,
            owner,
            custody_address,
            treasury,
            operator,
        }
    }

    pub fn ctx(&self, caller: Identity, height: u64) -> CallContext {
        call_ctx(caller, height)
    }

    pub fn fund(&mut self, account: Identity, token: TokenId, amount: u64) {
        self.core.custody_mut().fund(account, token, amount);
    }

    pub fn base_balance(&self, account: &Identity, token: TokenId) -> u64 {
        self.core.custody().balance_of(account, token)
    }

    /// Submit a commitment for `block` from the harness operator at height `block`
    pub fn submit(&mut self, block: u64, hash: Hash32, root: Hash32) {
        let ctx = self.ctx(self.operator, block);
        self.core
            .submit_commitment(&ctx, submission(block, hash, root))
            .expect("commitment accepted");
    }

    /// A new user holding `amount` of `token` on the base chain
    pub fn funded_user(&mut self, token: TokenId, amount: u64) -> Identity {
        let user = Pubkey::new_unique();
        self.fund(user, token, amount);
        user
    }
}

pub fn call_ctx(caller: Identity, height: u64) -> CallContext {
    CallContext::new(caller, height)
}

pub fn submission(block: u64, hash: Hash32, root: Hash32) -> CommitmentSubmission {
    CommitmentSubmission {
        block,
        hash,
        tx_count: 12,
        total_value: 5_000,
        root,
        bond: OPERATOR_BOND,
    }
}
