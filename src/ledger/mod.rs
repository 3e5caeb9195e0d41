// src/ledger/mod.rs
//! Balance Ledger
//!
//! Token-scoped balances of the rollup account space. Deposits credit,
//! proof-gated withdrawals debit and internal transfers move value between
//! accounts. Per-token deposited and withdrawn counters back the conservation
//! invariant `sum(balances) <= deposited - withdrawn`.

use std::collections::{HashMap, HashSet};

use log::info;

use crate::commitment::CommitmentKey;
use crate::error::{require, RollupError, RollupResult};
use crate::types::{is_valid_principal, short_hex, CallContext, Hash32, Identity, TokenId, NATIVE_TOKEN};

/// Balance ledger
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    /// Balances by (user, token)
    balances: HashMap<(Identity, TokenId), u64>,

    /// Total deposited per token
    deposited: HashMap<TokenId, u64>,

    /// Total withdrawn per token
    withdrawn: HashMap<TokenId, u64>,

    /// Leaves already used for a withdrawal, per commitment
    spent_leaves: HashSet<(CommitmentKey, Hash32)>,

    /// Custody address, never a valid account
    custody_address: Identity,
}

impl BalanceLedger {
    /// Create an empty ledger
    pub fn new(custody_address: Identity) -> Self {
        Self {
            balances: HashMap::new(),
            deposited: HashMap::new(),
            withdrawn: HashMap::new(),
            spent_leaves: HashSet::new(),
            custody_address,
        }
    }

    fn check_amount_and_token(&self, amount: u64, token: TokenId) -> RollupResult<()> {
        require(
            amount > 0,
            RollupError::InvalidInput("amount must be positive".to_string()),
        )?;
        require(
            token != NATIVE_TOKEN,
            RollupError::InvalidInput(format!("token id must be positive, got {}", token)),
        )
    }

    fn check_principal(&self, address: &Identity) -> RollupResult<()> {
        require(
            is_valid_principal(address, &self.custody_address),
            RollupError::InvalidInput(format!("{} is not a valid account", address)),
        )
    }

    /// Get the balance of `user` for `token`
    pub fn get_balance(&self, user: &Identity, token: TokenId) -> u64 {
        self.balances.get(&(*user, token)).copied().unwrap_or(0)
    }

    /// Sum of all balances for `token`
    pub fn total_balance(&self, token: TokenId) -> u128 {
        self.balances
            .iter()
            .filter(|((_, balance_token), _)| *balance_token == token)
            .map(|(_, amount)| *amount as u128)
            .sum()
    }

    /// Total deposited for `token`
    pub fn deposited(&self, token: TokenId) -> u64 {
        self.deposited.get(&token).copied().unwrap_or(0)
    }

    /// Total withdrawn for `token`
    pub fn withdrawn(&self, token: TokenId) -> u64 {
        self.withdrawn.get(&token).copied().unwrap_or(0)
    }

    /// Whether balances of `token` are covered by the funds in custody
    pub fn is_conserved(&self, token: TokenId) -> bool {
        match (self.deposited(token) as u128).checked_sub(self.withdrawn(token) as u128) {
            Some(locked) => self.total_balance(token) <= locked,
            None => false,
        }
    }

    /// Validate a deposit by `ctx.caller`
    pub fn check_deposit(&self, ctx: &CallContext, amount: u64, token: TokenId) -> RollupResult<()> {
        self.check_amount_and_token(amount, token)?;
        self.check_principal(&ctx.caller)?;
        require(
            self.deposited(token).checked_add(amount).is_some(),
            RollupError::InvalidInput(format!("deposits of token {} would overflow", token)),
        )
    }

    /// Credit a validated deposit; balances are additive
    pub(crate) fn apply_deposit(&mut self, user: Identity, amount: u64, token: TokenId) {
        // Per-user balances never exceed the per-token deposit total.
        let balance = self.balances.entry((user, token)).or_insert(0);
        *balance = balance.saturating_add(amount);
        let deposited = self.deposited.entry(token).or_insert(0);
        *deposited = deposited.saturating_add(amount);

        info!("Deposit: {} of token {} for {}", amount, token, user);
    }

    /// Validate the arguments of a withdrawal by `ctx.caller`
    pub fn check_withdrawal_input(&self, ctx: &CallContext, amount: u64, token: TokenId) -> RollupResult<()> {
        self.check_amount_and_token(amount, token)?;
        self.check_principal(&ctx.caller)
    }

    /// Whether `leaf` was already used to withdraw against `commitment`
    pub fn is_spent(&self, commitment: &CommitmentKey, leaf: &Hash32) -> bool {
        self.spent_leaves.contains(&(*commitment, *leaf))
    }

    /// Check that `user` holds at least `amount` of `token`
    pub fn check_debit(&self, user: &Identity, amount: u64, token: TokenId) -> RollupResult<u64> {
        let balance = self.get_balance(user, token);
        balance.checked_sub(amount).ok_or_else(|| {
            RollupError::InsufficientFunds(format!(
                "{} holds {} of token {}, needs {}",
                user, balance, token, amount
            ))
        })
    }

    /// Debit a validated withdrawal and mark its leaf spent
    pub(crate) fn apply_withdrawal(
        &mut self,
        user: Identity,
        amount: u64,
        token: TokenId,
        commitment: CommitmentKey,
        leaf: Hash32,
    ) {
        let balance = self.balances.entry((user, token)).or_insert(0);
        *balance = balance.saturating_sub(amount);
        let withdrawn = self.withdrawn.entry(token).or_insert(0);
        *withdrawn = withdrawn.saturating_add(amount);
        self.spent_leaves.insert((commitment, leaf));

        info!(
            "Withdrawal: {} of token {} for {} against block {} leaf {}",
            amount,
            token,
            user,
            commitment.0,
            short_hex(&leaf)
        );
    }

    /// Move `amount` of `token` from `from` to `to`. Both balances change or
    /// neither does.
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        from: &Identity,
        to: &Identity,
        amount: u64,
        token: TokenId,
    ) -> RollupResult<()> {
        self.check_amount_and_token(amount, token)?;
        self.check_principal(from)?;
        self.check_principal(to)?;
        require(
            from != to,
            RollupError::InvalidInput("sender and recipient must differ".to_string()),
        )?;
        require(
            ctx.caller == *from,
            RollupError::Unauthorized(format!("{} cannot move funds of {}", ctx.caller, from)),
        )?;

        let from_balance = self.check_debit(from, amount, token)?;
        let to_balance = self
            .get_balance(to, token)
            .checked_add(amount)
            .ok_or_else(|| RollupError::InvalidInput(format!("balance of {} would overflow", to)))?;

        self.balances.insert((*from, token), from_balance);
        self.balances.insert((*to, token), to_balance);

        info!("Transfer: {} of token {} from {} to {}", amount, token, from, to);

        Ok(())
    }
}
