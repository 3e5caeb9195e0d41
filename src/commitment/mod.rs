// src/commitment/mod.rs
//! Commitment Store
//!
//! Append-only record of the state roots operators publish. Each commitment
//! is keyed by `(block, hash)` and escrows an operator bond until it is
//! finalized or slashed. A block holds at most one live commitment: another
//! hash for the same block is accepted only once every earlier one was
//! slashed, so exactly one commitment per block can reach `Finalized`.

use std::collections::HashMap;

use log::info;

use crate::error::{require, RollupError, RollupResult};
use crate::types::{short_hex, Hash32, Identity, ZERO_HASH};

/// Key of a commitment: `(block, hash)`
pub type CommitmentKey = (u64, Hash32);

/// Commitment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitmentStatus {
    /// Inside its dispute window, unchallenged
    Pending,

    /// At least one challenge was opened against it
    Challenged,

    /// Irreversibly accepted
    Finalized,

    /// Proven fraudulent
    Slashed,
}

impl CommitmentStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(self) -> bool {
        matches!(self, CommitmentStatus::Finalized | CommitmentStatus::Slashed)
    }

    /// Whether `next` is a forward move from this status
    pub fn can_transition_to(self, next: CommitmentStatus) -> bool {
        use CommitmentStatus::*;
        matches!(
            (self, next),
            (Pending, Challenged)
                | (Pending, Finalized)
                | (Challenged, Finalized)
                | (Challenged, Slashed)
        )
    }
}

/// A published state commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCommitment {
    /// Rollup block the commitment covers
    pub block: u64,

    /// Batch hash
    pub hash: Hash32,

    /// Number of rolled-up transactions
    pub tx_count: u64,

    /// Aggregate value moved by the batch
    pub total_value: u64,

    /// State root after the batch
    pub root: Hash32,

    /// Lifecycle status
    pub status: CommitmentStatus,

    /// Operator that published the commitment
    pub submitted_by: Identity,

    /// Escrowed operator bond
    pub bond: u64,

    /// First block height at which the dispute window is closed
    pub deadline: u64,
}

impl StateCommitment {
    /// Key of the commitment
    pub fn key(&self) -> CommitmentKey {
        (self.block, self.hash)
    }

    /// Whether the dispute window has closed at `height`
    pub fn window_elapsed(&self, height: u64) -> bool {
        height >= self.deadline
    }
}

/// Parameters of a commitment submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentSubmission {
    /// Rollup block
    pub block: u64,

    /// Batch hash
    pub hash: Hash32,

    /// Number of rolled-up transactions
    pub tx_count: u64,

    /// Aggregate value moved by the batch
    pub total_value: u64,

    /// State root after the batch
    pub root: Hash32,

    /// Bond to escrow
    pub bond: u64,
}

/// Store of state commitments
#[derive(Debug, Clone)]
pub struct CommitmentStore {
    /// Commitments by key
    commitments: HashMap<CommitmentKey, StateCommitment>,

    /// Dispute window in blocks
    dispute_window: u64,

    /// Minimum operator bond
    min_bond: u64,
}

impl CommitmentStore {
    /// Create an empty store
    pub fn new(dispute_window: u64, min_bond: u64) -> Self {
        Self {
            commitments: HashMap::new(),
            dispute_window,
            min_bond,
        }
    }

    /// Validate a submission made at `height`. Operator authorization and
    /// the bond transfer are checked by the caller.
    pub fn check_submission(&self, submission: &CommitmentSubmission, height: u64) -> RollupResult<()> {
        require(
            submission.block > 0 && submission.tx_count > 0 && submission.total_value > 0,
            RollupError::InvalidInput("block, tx count and total value must be positive".to_string()),
        )?;
        require(
            submission.hash != ZERO_HASH && submission.root != ZERO_HASH,
            RollupError::InvalidInput("hash and root must be non-empty digests".to_string()),
        )?;
        // The window opens at the later of `block` and the submission height.
        submission.block.max(height).checked_add(self.dispute_window).ok_or_else(|| {
            RollupError::InvalidInput(format!("block {} overflows the dispute window", submission.block))
        })?;
        require(
            !self.commitments.contains_key(&(submission.block, submission.hash)),
            RollupError::InvalidCommitment(format!(
                "duplicate commitment for block {} hash {}",
                submission.block,
                short_hex(&submission.hash)
            )),
        )?;
        if let Some(live) = self
            .commitments_for_block(submission.block)
            .into_iter()
            .find(|commitment| commitment.status != CommitmentStatus::Slashed)
        {
            return Err(RollupError::InvalidCommitment(format!(
                "block {} already has {:?} commitment {}",
                submission.block,
                live.status,
                short_hex(&live.hash)
            )));
        }
        require(
            submission.bond >= self.min_bond,
            RollupError::InsufficientFunds(format!(
                "bond {} is below the minimum {}",
                submission.bond, self.min_bond
            )),
        )?;
        Ok(())
    }

    /// Record a validated submission made at `height` as `Pending`
    pub(crate) fn insert(
        &mut self,
        operator: Identity,
        submission: &CommitmentSubmission,
        height: u64,
    ) -> &StateCommitment {
        let commitment = StateCommitment {
            block: submission.block,
            hash: submission.hash,
            tx_count: submission.tx_count,
            total_value: submission.total_value,
            root: submission.root,
            status: CommitmentStatus::Pending,
            submitted_by: operator,
            bond: submission.bond,
            deadline: submission.block.max(height).saturating_add(self.dispute_window),
        };

        info!(
            "Commitment submitted: block {} hash {} by {}",
            commitment.block,
            short_hex(&commitment.hash),
            operator
        );

        self.commitments
            .entry(commitment.key())
            .or_insert(commitment)
    }

    /// Get a commitment
    pub fn get(&self, block: u64, hash: &Hash32) -> Option<&StateCommitment> {
        self.commitments.get(&(block, *hash))
    }

    /// Get a commitment or fail with `InvalidCommitment`
    pub fn get_or_err(&self, block: u64, hash: &Hash32) -> RollupResult<&StateCommitment> {
        self.get(block, hash).ok_or_else(|| {
            RollupError::InvalidCommitment(format!(
                "no commitment for block {} hash {}",
                block,
                short_hex(hash)
            ))
        })
    }

    /// Get every commitment recorded for a block
    pub fn commitments_for_block(&self, block: u64) -> Vec<&StateCommitment> {
        self.commitments
            .values()
            .filter(|commitment| commitment.block == block)
            .collect()
    }

    /// Highest block with a finalized commitment
    pub fn latest_finalized_block(&self) -> Option<u64> {
        self.commitments
            .values()
            .filter(|commitment| commitment.status == CommitmentStatus::Finalized)
            .map(|commitment| commitment.block)
            .max()
    }

    /// Check that the commitment can be finalized at `height` given the
    /// number of challenges still open against it
    pub fn check_finalize(
        &self,
        block: u64,
        hash: &Hash32,
        height: u64,
        open_challenges: usize,
    ) -> RollupResult<()> {
        let commitment = self.get_or_err(block, hash)?;

        require(
            !commitment.status.is_terminal(),
            RollupError::InvalidCommitment(format!(
                "commitment for block {} is already {:?}",
                block, commitment.status
            )),
        )?;
        require(
            commitment.window_elapsed(height),
            RollupError::ChallengePeriod(format!(
                "dispute window for block {} closes at height {}, now {}",
                block, commitment.deadline, height
            )),
        )?;
        require(
            open_challenges == 0,
            RollupError::InvalidCommitment(format!(
                "commitment for block {} has {} open challenges",
                block, open_challenges
            )),
        )
    }

    /// Move a commitment forward. Callers validate the transition first.
    pub(crate) fn transition(&mut self, key: &CommitmentKey, next: CommitmentStatus) {
        if let Some(commitment) = self.commitments.get_mut(key) {
            debug_assert!(commitment.status.can_transition_to(next));
            if commitment.status.can_transition_to(next) {
                commitment.status = next;
            }
        }
    }
}
