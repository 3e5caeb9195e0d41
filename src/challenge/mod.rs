// src/challenge/mod.rs
//! Challenge Manager
//!
//! Manages bonded disputes against pending commitments:
//! - Challenge creation within the dispute window
//! - Adjudication through the proof verifier
//! - Challenge status tracking and history
//!
//! Each challenger holds at most one challenge per block, so several
//! independent challengers can dispute the same commitment. The manager only
//! decides outcomes; bond movements are carried out by the orchestrator.

use std::collections::HashMap;

use log::{debug, info};

use crate::commitment::{CommitmentStatus, StateCommitment};
use crate::error::{require, RollupError, RollupResult};
use crate::proof::ProofVerifier;
use crate::types::{is_valid_principal, short_hex, CallContext, Hash32, Identity};

/// Key of a challenge: `(block, challenger)`
pub type ChallengeKey = (u64, Identity);

/// Challenge status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeStatus {
    /// Challenge is awaiting resolution
    Open,

    /// Fraud was demonstrated
    Upheld,

    /// No valid fraud witness was produced
    Rejected,
}

/// Challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Block of the disputed commitment
    pub block: u64,

    /// Challenger public key
    pub challenger: Identity,

    /// Hash of the disputed commitment
    pub commitment_hash: Hash32,

    /// Bond amount
    pub bond: u64,

    /// Challenge status
    pub status: ChallengeStatus,

    /// Witness supplied at resolution, if any
    pub witness: Option<Vec<u8>>,

    /// Block height at which the challenge was opened
    pub opened_at: u64,
}

/// Outcome of adjudicating an open challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The witness proves fraud; the commitment is slashed
    Upheld,

    /// The commitment was already slashed by another challenger
    UpheldAfterSlash,

    /// No valid witness; the challenger's bond is forfeited
    Rejected,
}

/// Challenge manager
#[derive(Debug, Clone)]
pub struct ChallengeManager {
    /// Challenges by key
    challenges: HashMap<ChallengeKey, Challenge>,

    /// Minimum challenger bond
    min_bond: u64,

    /// Custody address, never a valid challenger
    custody_address: Identity,
}

impl ChallengeManager {
    /// Create an empty challenge manager
    pub fn new(min_bond: u64, custody_address: Identity) -> Self {
        Self {
            challenges: HashMap::new(),
            min_bond,
            custody_address,
        }
    }

    /// Validate opening a challenge by `ctx.caller` against `commitment`
    pub fn check_open(&self, ctx: &CallContext, commitment: &StateCommitment, bond: u64) -> RollupResult<()> {
        require(
            matches!(
                commitment.status,
                CommitmentStatus::Pending | CommitmentStatus::Challenged
            ),
            RollupError::InvalidCommitment(format!(
                "commitment for block {} is {:?}",
                commitment.block, commitment.status
            )),
        )?;
        require(
            !commitment.window_elapsed(ctx.height),
            RollupError::ChallengePeriod(format!(
                "dispute window for block {} closed at height {}",
                commitment.block, commitment.deadline
            )),
        )?;
        require(
            is_valid_principal(&ctx.caller, &self.custody_address),
            RollupError::InvalidInput(format!("{} cannot challenge", ctx.caller)),
        )?;
        require(
            !self.challenges.contains_key(&(commitment.block, ctx.caller)),
            RollupError::InvalidInput(format!(
                "{} already challenged block {}",
                ctx.caller, commitment.block
            )),
        )?;
        require(
            bond >= self.min_bond,
            RollupError::InsufficientFunds(format!(
                "bond {} is below the minimum {}",
                bond, self.min_bond
            )),
        )?;
        Ok(())
    }

    /// Record a validated challenge as `Open`
    pub(crate) fn insert(&mut self, ctx: &CallContext, commitment: &StateCommitment, bond: u64) -> &Challenge {
        let challenge = Challenge {
            block: commitment.block,
            challenger: ctx.caller,
            commitment_hash: commitment.hash,
            bond,
            status: ChallengeStatus::Open,
            witness: None,
            opened_at: ctx.height,
        };

        info!(
            "Challenge opened: block {} hash {} by {}",
            challenge.block,
            short_hex(&challenge.commitment_hash),
            challenge.challenger
        );

        self.challenges
            .entry((challenge.block, challenge.challenger))
            .or_insert(challenge)
    }

    /// Get a challenge
    pub fn get(&self, block: u64, challenger: &Identity) -> Option<&Challenge> {
        self.challenges.get(&(block, *challenger))
    }

    /// Get an open challenge or fail with `InvalidCommitment`
    pub fn get_open(&self, block: u64, challenger: &Identity) -> RollupResult<&Challenge> {
        let challenge = self.get(block, challenger).ok_or_else(|| {
            RollupError::InvalidCommitment(format!(
                "no challenge by {} for block {}",
                challenger, block
            ))
        })?;
        require(
            challenge.status == ChallengeStatus::Open,
            RollupError::InvalidCommitment(format!(
                "challenge by {} for block {} is already {:?}",
                challenger, block, challenge.status
            )),
        )?;
        Ok(challenge)
    }

    /// Number of open challenges against the commitment `(block, hash)`
    pub fn open_count(&self, block: u64, hash: &Hash32) -> usize {
        self.challenges
            .values()
            .filter(|challenge| {
                challenge.block == block
                    && challenge.commitment_hash == *hash
                    && challenge.status == ChallengeStatus::Open
            })
            .count()
    }

    /// Get every challenge against the commitment `(block, hash)`
    pub fn challenges_for(&self, block: u64, hash: &Hash32) -> Vec<&Challenge> {
        self.challenges
            .values()
            .filter(|challenge| challenge.block == block && challenge.commitment_hash == *hash)
            .collect()
    }

    /// Decide the outcome of `challenge` against `commitment`. Nothing is
    /// mutated; a malformed witness or an early call without witness is an
    /// error.
    pub fn adjudicate<V: ProofVerifier>(
        &self,
        ctx: &CallContext,
        challenge: &Challenge,
        commitment: &StateCommitment,
        witness: Option<&[u8]>,
        verifier: &V,
    ) -> RollupResult<Verdict> {
        require(
            challenge.status == ChallengeStatus::Open,
            RollupError::InvalidCommitment(format!(
                "challenge for block {} is already {:?}",
                challenge.block, challenge.status
            )),
        )?;

        match commitment.status {
            CommitmentStatus::Slashed => return Ok(Verdict::UpheldAfterSlash),
            CommitmentStatus::Challenged => {}
            status => {
                return Err(RollupError::InvalidCommitment(format!(
                    "challenged commitment for block {} is {:?}",
                    commitment.block, status
                )))
            }
        }

        match witness {
            Some(witness) => {
                verifier.check_witness(witness)?;
                if verifier.verify_fraud(&commitment.root, witness) {
                    Ok(Verdict::Upheld)
                } else {
                    debug!(
                        "witness against block {} root {} does not prove fraud",
                        commitment.block,
                        short_hex(&commitment.root)
                    );
                    Ok(Verdict::Rejected)
                }
            }
            None => {
                require(
                    commitment.window_elapsed(ctx.height),
                    RollupError::ChallengePeriod(format!(
                        "no witness and the window for block {} closes at height {}",
                        commitment.block, commitment.deadline
                    )),
                )?;
                Ok(Verdict::Rejected)
            }
        }
    }

    /// Close an open challenge with `status`
    pub(crate) fn close(&mut self, key: &ChallengeKey, status: ChallengeStatus, witness: Option<Vec<u8>>) {
        if let Some(challenge) = self.challenges.get_mut(key) {
            debug_assert_eq!(challenge.status, ChallengeStatus::Open);
            if challenge.status == ChallengeStatus::Open {
                challenge.status = status;
                challenge.witness = witness;
                info!(
                    "Challenge closed: block {} by {}, status: {:?}",
                    challenge.block, challenge.challenger, status
                );
            }
        }
    }

    /// Get challenge statistics: (total, open, upheld, rejected)
    pub fn get_statistics(&self) -> (usize, usize, usize, usize) {
        let total = self.challenges.len();
        let count = |status: ChallengeStatus| {
            self.challenges
                .values()
                .filter(|challenge| challenge.status == status)
                .count()
        };

        (
            total,
            count(ChallengeStatus::Open),
            count(ChallengeStatus::Upheld),
            count(ChallengeStatus::Rejected),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{FraudWitness, LeafOpening, MerkleProofVerifier, MerkleTree};
    use solana_program::pubkey::Pubkey;

    fn commitment(root: Hash32, status: CommitmentStatus) -> StateCommitment {
        StateCommitment {
            block: 100,
            hash: [1; 32],
            tx_count: 3,
            total_value: 1000,
            root,
            status,
            submitted_by: Pubkey::new_unique(),
            bond: 1000,
            deadline: 200,
        }
    }

    fn manager() -> ChallengeManager {
        ChallengeManager::new(500, Pubkey::new_unique())
    }

    #[test]
    fn test_open_checks() {
        let mut manager = manager();
        let challenger = CallContext::new(Pubkey::new_unique(), 150);
        let pending = commitment([2; 32], CommitmentStatus::Pending);

        assert!(matches!(
            manager.check_open(&challenger, &pending, 499),
            Err(RollupError::InsufficientFunds(_))
        ));
        assert!(matches!(
            manager.check_open(&CallContext::new(challenger.caller, 200), &pending, 500),
            Err(RollupError::ChallengePeriod(_))
        ));
        assert!(matches!(
            manager.check_open(&challenger, &commitment([2; 32], CommitmentStatus::Finalized), 500),
            Err(RollupError::InvalidCommitment(_))
        ));

        manager.check_open(&challenger, &pending, 500).unwrap();
        manager.insert(&challenger, &pending, 500);

        assert_eq!(manager.open_count(100, &[1; 32]), 1);
        assert!(matches!(
            manager.check_open(&challenger, &pending, 500),
            Err(RollupError::InvalidInput(_))
        ));

        let second = CallContext::new(Pubkey::new_unique(), 151);
        assert!(manager.check_open(&second, &pending, 500).is_ok());
    }

    #[test]
    fn test_adjudicate_without_witness_waits_for_window() {
        let mut manager = manager();
        let ctx = CallContext::new(Pubkey::new_unique(), 150);
        let challenged = commitment([2; 32], CommitmentStatus::Challenged);
        let challenge = manager.insert(&ctx, &challenged, 500).clone();
        let verifier = MerkleProofVerifier::new();

        assert!(matches!(
            manager.adjudicate(&ctx, &challenge, &challenged, None, &verifier),
            Err(RollupError::ChallengePeriod(_))
        ));

        let late = CallContext::new(ctx.caller, 200);
        assert_eq!(
            manager.adjudicate(&late, &challenge, &challenged, None, &verifier),
            Ok(Verdict::Rejected)
        );
    }

    #[test]
    fn test_adjudicate_with_witness() {
        let alice = Pubkey::new_unique();
        let tree = MerkleTree::from_balances(&[(alice, 1, 10), (alice, 1, 20)]);
        let witness = FraudWitness::ConflictingLeaves {
            first: LeafOpening {
                user: alice.to_bytes(),
                token: 1,
                amount: 10,
                proof: tree.generate_proof(0).unwrap(),
            },
            second: LeafOpening {
                user: alice.to_bytes(),
                token: 1,
                amount: 20,
                proof: tree.generate_proof(1).unwrap(),
            },
        }
        .to_bytes();

        let mut manager = manager();
        let ctx = CallContext::new(Pubkey::new_unique(), 120);
        let fraudulent = commitment(tree.root(), CommitmentStatus::Challenged);
        let challenge = manager.insert(&ctx, &fraudulent, 500).clone();
        let verifier = MerkleProofVerifier::new();

        assert_eq!(
            manager.adjudicate(&ctx, &challenge, &fraudulent, Some(&witness), &verifier),
            Ok(Verdict::Upheld)
        );

        let honest = commitment([3; 32], CommitmentStatus::Challenged);
        assert_eq!(
            manager.adjudicate(&ctx, &challenge, &honest, Some(&witness), &verifier),
            Ok(Verdict::Rejected)
        );
        assert!(matches!(
            manager.adjudicate(&ctx, &challenge, &honest, Some(&[]), &verifier),
            Err(RollupError::InvalidProof(_))
        ));
        assert_eq!(
            manager.adjudicate(
                &ctx,
                &challenge,
                &commitment([3; 32], CommitmentStatus::Slashed),
                None,
                &verifier
            ),
            Ok(Verdict::UpheldAfterSlash)
        );
    }

    #[test]
    fn test_close_is_final() {
        let mut manager = manager();
        let ctx = CallContext::new(Pubkey::new_unique(), 150);
        let challenged = commitment([2; 32], CommitmentStatus::Challenged);
        manager.insert(&ctx, &challenged, 500);

        manager.close(&(100, ctx.caller), ChallengeStatus::Rejected, None);

        assert!(matches!(
            manager.get_open(100, &ctx.caller),
            Err(RollupError::InvalidCommitment(_))
        ));
        assert_eq!(manager.open_count(100, &[1; 32]), 0);
        assert_eq!(manager.get_statistics(), (1, 0, 0, 1));
        assert_eq!(manager.challenges_for(100, &[1; 32]).len(), 1);
    }
}
