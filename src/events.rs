// src/events.rs
//! Audit journal of committed state changes

use crate::types::{Hash32, Identity, TokenId};

/// A committed state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupEvent {
    /// Owner registered an operator
    OperatorRegistered { operator: Identity },

    /// Operator lost the right to submit; `slashed` marks proven fraud
    OperatorDeactivated { operator: Identity, slashed: bool },

    /// Operator published a commitment and escrowed its bond
    CommitmentSubmitted {
        block: u64,
        hash: Hash32,
        operator: Identity,
        bond: u64,
    },

    /// Commitment accepted; bond returned to the operator
    CommitmentFinalized {
        block: u64,
        hash: Hash32,
        operator: Identity,
        bond_returned: u64,
    },

    /// Challenger disputed a commitment and escrowed a bond
    ChallengeOpened {
        block: u64,
        hash: Hash32,
        challenger: Identity,
        bond: u64,
    },

    /// Fraud proven; `payout` went to the challenger
    ChallengeUpheld {
        block: u64,
        hash: Hash32,
        challenger: Identity,
        payout: u64,
    },

    /// Challenge failed; the bond went to `forfeited_to`
    ChallengeRejected {
        block: u64,
        hash: Hash32,
        challenger: Identity,
        forfeited_to: Identity,
        bond: u64,
    },

    /// Base-chain funds locked and credited
    Deposited {
        user: Identity,
        token: TokenId,
        amount: u64,
    },

    /// Balance debited and funds released against a finalized root
    Withdrawn {
        user: Identity,
        token: TokenId,
        amount: u64,
        block: u64,
        hash: Hash32,
    },

    /// Internal transfer between rollup accounts
    Transferred {
        from: Identity,
        to: Identity,
        token: TokenId,
        amount: u64,
    },
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Block height of the call that produced the event
    pub height: u64,

    /// The event
    pub event: RollupEvent,
}
