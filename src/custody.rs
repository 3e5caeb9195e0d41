// src/custody.rs
//! Base-chain custody primitive
//!
//! The core never moves base-chain value itself. Bond escrow, deposits,
//! withdrawals and bond releases all go through the [`Custody`] trait, and
//! every caller checks the result before committing any state.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::types::{Identity, TokenId};

/// Failure of a custody transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// Source account cannot cover the transfer
    #[error("account {account} holds {available} of token {token}, needs {required}")]
    InsufficientFunds {
        account: Identity,
        token: TokenId,
        available: u64,
        required: u64,
    },

    /// Destination balance would overflow
    #[error("balance of {account} for token {token} would overflow")]
    Overflow { account: Identity, token: TokenId },
}

/// Atomic base-chain value transfer
pub trait Custody {
    /// Move `amount` of `token` from `from` to `to`. Either the whole amount
    /// moves or nothing does.
    fn transfer(
        &mut self,
        token: TokenId,
        amount: u64,
        from: &Identity,
        to: &Identity,
    ) -> Result<(), CustodyError>;
}

/// Map-backed custody used by tests and local simulations
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustody {
    /// Base-chain balances by (account, token)
    balances: HashMap<(Identity, TokenId), u64>,
}

impl InMemoryCustody {
    /// Create an empty custody
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `account` out of thin air
    pub fn fund(&mut self, account: Identity, token: TokenId, amount: u64) {
        let balance = self.balances.entry((account, token)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Base-chain balance of `account` for `token`
    pub fn balance_of(&self, account: &Identity, token: TokenId) -> u64 {
        self.balances.get(&(*account, token)).copied().unwrap_or(0)
    }
}

impl Custody for InMemoryCustody {
    fn transfer(
        &mut self,
        token: TokenId,
        amount: u64,
        from: &Identity,
        to: &Identity,
    ) -> Result<(), CustodyError> {
        if from == to {
            return Ok(());
        }

        let available = self.balance_of(from, token);
        let from_balance = available
            .checked_sub(amount)
            .ok_or(CustodyError::InsufficientFunds {
                account: *from,
                token,
                available,
                required: amount,
            })?;
        let to_balance = self
            .balance_of(to, token)
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { account: *to, token })?;

        self.balances.insert((*from, token), from_balance);
        self.balances.insert((*to, token), to_balance);

        debug!("custody moved {} of token {} from {} to {}", amount, token, from, to);

        Ok(())
    }
}
