// src/rollup.rs
//! Rollup custody core
//!
//! [`RollupCore`] composes the operator registry, commitment store,
//! challenge manager and balance ledger behind one call surface. Every
//! operation validates all of its preconditions first, then performs the
//! single custody transfer it authorizes, and only after that transfer
//! succeeds commits its state changes. A failed call leaves no trace.

use log::{info, warn};

use crate::challenge::{Challenge, ChallengeManager, ChallengeStatus, Verdict};
use crate::commitment::{
    CommitmentKey, CommitmentStatus, CommitmentStore, CommitmentSubmission, StateCommitment,
};
use crate::config::{ForfeitPolicy, RollupConfig};
use crate::custody::Custody;
use crate::error::{require, RollupError, RollupResult};
use crate::events::{EventRecord, RollupEvent};
use crate::ledger::BalanceLedger;
use crate::proof::{balance_leaf, MerkleProofVerifier, ProofVerifier};
use crate::registry::{Operator, OperatorRegistry};
use crate::types::{short_hex, CallContext, Hash32, Identity, TokenId, NATIVE_TOKEN};

fn rejected(operation: &str, error: RollupError) -> RollupError {
    warn!("{} rejected: {}", operation, error);
    error
}

/// Custody and dispute core of the rollup bridge
pub struct RollupCore<C: Custody, V: ProofVerifier = MerkleProofVerifier> {
    /// Configuration
    config: RollupConfig,

    /// Operator registry
    registry: OperatorRegistry,

    /// Commitment store
    commitments: CommitmentStore,

    /// Challenge manager
    challenges: ChallengeManager,

    /// Balance ledger
    ledger: BalanceLedger,

    /// Base-chain custody primitive
    custody: C,

    /// Proof verifier
    verifier: V,

    /// Native value escrowed for outstanding commitments and challenges
    bond_pool: u64,

    /// Audit journal
    events: Vec<EventRecord>,
}

impl<C: Custody> RollupCore<C, MerkleProofVerifier> {
    /// Create a core using the keccak Merkle verifier
    pub fn new(config: RollupConfig, custody: C) -> RollupResult<Self> {
        Self::with_verifier(config, custody, MerkleProofVerifier::new())
    }
}

impl<C: Custody, V: ProofVerifier> RollupCore<C, V> {
    /// Create a core with a custom proof verifier
    pub fn with_verifier(config: RollupConfig, custody: C, verifier: V) -> RollupResult<Self> {
        config.validate()?;

        info!(
            "Rollup core initialized: owner {}, custody {}, dispute window {} blocks",
            config.owner, config.custody_address, config.dispute_window
        );

        Ok(Self {
            registry: OperatorRegistry::new(config.owner, config.custody_address),
            commitments: CommitmentStore::new(config.dispute_window, config.min_commitment_bond),
            challenges: ChallengeManager::new(config.min_challenge_bond, config.custody_address),
            ledger: BalanceLedger::new(config.custody_address),
            custody,
            verifier,
            bond_pool: 0,
            events: Vec::new(),
            config,
        })
    }

    fn record(&mut self, ctx: &CallContext, event: RollupEvent) {
        self.events.push(EventRecord {
            height: ctx.height,
            event,
        });
    }

    fn escrow(&mut self, from: &Identity, token: TokenId, amount: u64) -> RollupResult<()> {
        let custody_address = self.config.custody_address;
        self.custody.transfer(token, amount, from, &custody_address)?;
        Ok(())
    }

    fn release(&mut self, token: TokenId, amount: u64, to: &Identity) -> RollupResult<()> {
        let custody_address = self.config.custody_address;
        self.custody.transfer(token, amount, &custody_address, to)?;
        Ok(())
    }

    fn grown_bond_pool(&self, bond: u64) -> RollupResult<u64> {
        self.bond_pool
            .checked_add(bond)
            .ok_or_else(|| RollupError::InvalidInput(format!("bond {} overflows the bond pool", bond)))
    }

    /// Register an operator (owner only)
    pub fn register_operator(&mut self, ctx: &CallContext, operator: Identity) -> RollupResult<()> {
        self.registry
            .register(ctx, operator)
            .map_err(|e| rejected("register_operator", e))?;
        self.record(ctx, RollupEvent::OperatorRegistered { operator });
        Ok(())
    }

    /// Deactivate an operator (owner only)
    pub fn deactivate_operator(&mut self, ctx: &CallContext, operator: Identity) -> RollupResult<()> {
        self.registry
            .deactivate(ctx, &operator)
            .map_err(|e| rejected("deactivate_operator", e))?;
        self.record(
            ctx,
            RollupEvent::OperatorDeactivated {
                operator,
                slashed: false,
            },
        );
        Ok(())
    }

    /// Publish a state commitment and escrow its bond
    pub fn submit_commitment(
        &mut self,
        ctx: &CallContext,
        submission: CommitmentSubmission,
    ) -> RollupResult<()> {
        self.try_submit_commitment(ctx, &submission)
            .map_err(|e| rejected("submit_commitment", e))
    }

    fn try_submit_commitment(
        &mut self,
        ctx: &CallContext,
        submission: &CommitmentSubmission,
    ) -> RollupResult<()> {
        self.registry.ensure_active(&ctx.caller)?;
        self.commitments.check_submission(submission, ctx.height)?;
        let bond_pool = self.grown_bond_pool(submission.bond)?;

        self.escrow(&ctx.caller, NATIVE_TOKEN, submission.bond)?;

        self.bond_pool = bond_pool;
        self.commitments.insert(ctx.caller, submission, ctx.height);
        self.record(
            ctx,
            RollupEvent::CommitmentSubmitted {
                block: submission.block,
                hash: submission.hash,
                operator: ctx.caller,
                bond: submission.bond,
            },
        );
        Ok(())
    }

    /// Finalize a commitment whose dispute window closed with no open
    /// challenge and return the operator's bond. Callable by anyone.
    pub fn finalize(&mut self, ctx: &CallContext, block: u64, hash: Hash32) -> RollupResult<()> {
        self.try_finalize(ctx, block, hash)
            .map_err(|e| rejected("finalize", e))
    }

    fn try_finalize(&mut self, ctx: &CallContext, block: u64, hash: Hash32) -> RollupResult<()> {
        let open = self.challenges.open_count(block, &hash);
        self.commitments.check_finalize(block, &hash, ctx.height, open)?;
        let commitment = self.commitments.get_or_err(block, &hash)?.clone();

        self.release(NATIVE_TOKEN, commitment.bond, &commitment.submitted_by)?;

        self.bond_pool = self.bond_pool.saturating_sub(commitment.bond);
        self.commitments
            .transition(&commitment.key(), CommitmentStatus::Finalized);
        info!("Commitment finalized: block {} hash {}", block, short_hex(&hash));
        self.record(
            ctx,
            RollupEvent::CommitmentFinalized {
                block,
                hash,
                operator: commitment.submitted_by,
                bond_returned: commitment.bond,
            },
        );
        Ok(())
    }

    /// Open a bonded challenge against a pending or challenged commitment
    pub fn open_challenge(
        &mut self,
        ctx: &CallContext,
        block: u64,
        hash: Hash32,
        bond: u64,
    ) -> RollupResult<()> {
        self.try_open_challenge(ctx, block, hash, bond)
            .map_err(|e| rejected("open_challenge", e))
    }

    fn try_open_challenge(
        &mut self,
        ctx: &CallContext,
        block: u64,
        hash: Hash32,
        bond: u64,
    ) -> RollupResult<()> {
        let commitment = self.commitments.get_or_err(block, &hash)?.clone();
        self.challenges.check_open(ctx, &commitment, bond)?;
        let bond_pool = self.grown_bond_pool(bond)?;

        self.escrow(&ctx.caller, NATIVE_TOKEN, bond)?;

        self.bond_pool = bond_pool;
        self.challenges.insert(ctx, &commitment, bond);
        if commitment.status == CommitmentStatus::Pending {
            self.commitments
                .transition(&commitment.key(), CommitmentStatus::Challenged);
        }
        self.record(
            ctx,
            RollupEvent::ChallengeOpened {
                block,
                hash,
                challenger: ctx.caller,
                bond,
            },
        );
        Ok(())
    }

    /// Resolve an open challenge, with a fraud witness or after the dispute
    /// window elapsed. Callable by anyone.
    pub fn resolve_challenge(
        &mut self,
        ctx: &CallContext,
        block: u64,
        challenger: Identity,
        witness: Option<Vec<u8>>,
    ) -> RollupResult<Verdict> {
        self.try_resolve_challenge(ctx, block, challenger, witness)
            .map_err(|e| rejected("resolve_challenge", e))
    }

    fn try_resolve_challenge(
        &mut self,
        ctx: &CallContext,
        block: u64,
        challenger: Identity,
        witness: Option<Vec<u8>>,
    ) -> RollupResult<Verdict> {
        let challenge = self.challenges.get_open(block, &challenger)?.clone();
        let commitment = self
            .commitments
            .get_or_err(block, &challenge.commitment_hash)?
            .clone();
        let verdict = self.challenges.adjudicate(
            ctx,
            &challenge,
            &commitment,
            witness.as_deref(),
            &self.verifier,
        )?;

        match verdict {
            Verdict::Upheld => self.uphold(ctx, &challenge, &commitment, witness)?,
            Verdict::UpheldAfterSlash => self.refund(ctx, &challenge, witness)?,
            Verdict::Rejected => self.forfeit(ctx, &challenge, &commitment, witness)?,
        }

        Ok(verdict)
    }

    fn uphold(
        &mut self,
        ctx: &CallContext,
        challenge: &Challenge,
        commitment: &StateCommitment,
        witness: Option<Vec<u8>>,
    ) -> RollupResult<()> {
        let payout = challenge.bond.checked_add(commitment.bond).ok_or_else(|| {
            RollupError::InvalidInput("challenge payout overflows".to_string())
        })?;

        self.release(NATIVE_TOKEN, payout, &challenge.challenger)?;

        self.bond_pool = self.bond_pool.saturating_sub(payout);
        self.challenges.close(
            &(challenge.block, challenge.challenger),
            ChallengeStatus::Upheld,
            witness,
        );
        self.commitments
            .transition(&commitment.key(), CommitmentStatus::Slashed);
        let was_active = self.registry.slash(&commitment.submitted_by);

        self.record(
            ctx,
            RollupEvent::ChallengeUpheld {
                block: challenge.block,
                hash: challenge.commitment_hash,
                challenger: challenge.challenger,
                payout,
            },
        );
        if was_active {
            self.record(
                ctx,
                RollupEvent::OperatorDeactivated {
                    operator: commitment.submitted_by,
                    slashed: true,
                },
            );
        }
        Ok(())
    }

    fn refund(
        &mut self,
        ctx: &CallContext,
        challenge: &Challenge,
        witness: Option<Vec<u8>>,
    ) -> RollupResult<()> {
        self.release(NATIVE_TOKEN, challenge.bond, &challenge.challenger)?;

        self.bond_pool = self.bond_pool.saturating_sub(challenge.bond);
        self.challenges.close(
            &(challenge.block, challenge.challenger),
            ChallengeStatus::Upheld,
            witness,
        );
        self.record(
            ctx,
            RollupEvent::ChallengeUpheld {
                block: challenge.block,
                hash: challenge.commitment_hash,
                challenger: challenge.challenger,
                payout: challenge.bond,
            },
        );
        Ok(())
    }

    fn forfeit(
        &mut self,
        ctx: &CallContext,
        challenge: &Challenge,
        commitment: &StateCommitment,
        witness: Option<Vec<u8>>,
    ) -> RollupResult<()> {
        let recipient = match self.config.forfeit_policy {
            ForfeitPolicy::Operator => commitment.submitted_by,
            ForfeitPolicy::Treasury => self.config.treasury,
        };

        self.release(NATIVE_TOKEN, challenge.bond, &recipient)?;

        self.bond_pool = self.bond_pool.saturating_sub(challenge.bond);
        self.challenges.close(
            &(challenge.block, challenge.challenger),
            ChallengeStatus::Rejected,
            witness,
        );
        self.record(
            ctx,
            RollupEvent::ChallengeRejected {
                block: challenge.block,
                hash: challenge.commitment_hash,
                challenger: challenge.challenger,
                forfeited_to: recipient,
                bond: challenge.bond,
            },
        );
        Ok(())
    }

    /// Lock base-chain funds in custody and credit the caller's balance
    pub fn deposit(&mut self, ctx: &CallContext, amount: u64, token: TokenId) -> RollupResult<()> {
        self.try_deposit(ctx, amount, token)
            .map_err(|e| rejected("deposit", e))
    }

    fn try_deposit(&mut self, ctx: &CallContext, amount: u64, token: TokenId) -> RollupResult<()> {
        self.ledger.check_deposit(ctx, amount, token)?;

        self.escrow(&ctx.caller, token, amount)?;

        self.ledger.apply_deposit(ctx.caller, amount, token);
        self.record(
            ctx,
            RollupEvent::Deposited {
                user: ctx.caller,
                token,
                amount,
            },
        );
        Ok(())
    }

    /// Withdraw against a finalized commitment, proving the leaf
    /// `(caller, token, amount)` is included in its root
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        amount: u64,
        token: TokenId,
        inclusion_proof: &[u8],
        commitment: CommitmentKey,
    ) -> RollupResult<()> {
        self.try_withdraw(ctx, amount, token, inclusion_proof, commitment)
            .map_err(|e| rejected("withdraw", e))
    }

    fn try_withdraw(
        &mut self,
        ctx: &CallContext,
        amount: u64,
        token: TokenId,
        inclusion_proof: &[u8],
        commitment: CommitmentKey,
    ) -> RollupResult<()> {
        let (block, hash) = commitment;
        self.ledger.check_withdrawal_input(ctx, amount, token)?;

        let committed = self.commitments.get_or_err(block, &hash)?;
        require(
            committed.status == CommitmentStatus::Finalized,
            RollupError::InvalidCommitment(format!(
                "commitment for block {} is {:?}, not finalized",
                block, committed.status
            )),
        )?;
        let root = committed.root;

        let leaf = balance_leaf(&ctx.caller, token, amount);
        require(
            !self.ledger.is_spent(&commitment, &leaf),
            RollupError::InvalidProof(format!(
                "leaf {} already withdrawn against block {}",
                short_hex(&leaf),
                block
            )),
        )?;
        require(
            self.verifier.verify_inclusion(&root, inclusion_proof, &leaf),
            RollupError::InvalidProof(format!(
                "leaf {} is not included in root {}",
                short_hex(&leaf),
                short_hex(&root)
            )),
        )?;
        self.ledger.check_debit(&ctx.caller, amount, token)?;

        self.release(token, amount, &ctx.caller)?;

        self.ledger
            .apply_withdrawal(ctx.caller, amount, token, commitment, leaf);
        self.record(
            ctx,
            RollupEvent::Withdrawn {
                user: ctx.caller,
                token,
                amount,
                block,
                hash,
            },
        );
        Ok(())
    }

    /// Move funds between two rollup accounts
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        from: Identity,
        to: Identity,
        amount: u64,
        token: TokenId,
    ) -> RollupResult<()> {
        self.ledger
            .transfer(ctx, &from, &to, amount, token)
            .map_err(|e| rejected("transfer", e))?;
        self.record(
            ctx,
            RollupEvent::Transferred {
                from,
                to,
                token,
                amount,
            },
        );
        Ok(())
    }

    /// Get the balance of `user` for `token`
    pub fn get_balance(&self, user: &Identity, token: TokenId) -> u64 {
        self.ledger.get_balance(user, token)
    }

    /// Get a commitment
    pub fn get_commitment(&self, block: u64, hash: &Hash32) -> Option<&StateCommitment> {
        self.commitments.get(block, hash)
    }

    /// Get a challenge
    pub fn get_challenge(&self, block: u64, challenger: &Identity) -> Option<&Challenge> {
        self.challenges.get(block, challenger)
    }

    /// Get an operator
    pub fn get_operator(&self, address: &Identity) -> Option<&Operator> {
        self.registry.get_operator(address)
    }

    /// Number of open challenges against a commitment
    pub fn open_challenges(&self, block: u64, hash: &Hash32) -> usize {
        self.challenges.open_count(block, hash)
    }

    /// Every commitment recorded for a block
    pub fn commitments_for_block(&self, block: u64) -> Vec<&StateCommitment> {
        self.commitments.commitments_for_block(block)
    }

    /// Every challenge against the commitment `(block, hash)`
    pub fn challenges_for(&self, block: u64, hash: &Hash32) -> Vec<&Challenge> {
        self.challenges.challenges_for(block, hash)
    }

    /// Operators currently allowed to submit
    pub fn active_operators(&self) -> Vec<&Operator> {
        self.registry.active_operators()
    }

    /// Highest block with a finalized commitment
    pub fn latest_finalized_block(&self) -> Option<u64> {
        self.commitments.latest_finalized_block()
    }

    /// Challenge statistics: (total, open, upheld, rejected)
    pub fn challenge_statistics(&self) -> (usize, usize, usize, usize) {
        self.challenges.get_statistics()
    }

    /// Total deposited for `token`
    pub fn deposited(&self, token: TokenId) -> u64 {
        self.ledger.deposited(token)
    }

    /// Total withdrawn for `token`
    pub fn withdrawn(&self, token: TokenId) -> u64 {
        self.ledger.withdrawn(token)
    }

    /// Sum of all rollup balances for `token`
    pub fn total_balance(&self, token: TokenId) -> u128 {
        self.ledger.total_balance(token)
    }

    /// Whether balances of `token` are covered by deposits minus withdrawals
    pub fn is_conserved(&self, token: TokenId) -> bool {
        self.ledger.is_conserved(token)
    }

    /// Native value escrowed for outstanding commitments and challenges
    pub fn bond_pool(&self) -> u64 {
        self.bond_pool
    }

    /// Audit journal
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Configuration
    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Custody primitive
    pub fn custody(&self) -> &C {
        &self.custody
    }

    /// Mutable custody primitive, for environments that fund accounts
    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::InMemoryCustody;
    use solana_program::pubkey::Pubkey;

    /// Verifier that accepts every proof and witness
    struct PermissiveVerifier;

    impl ProofVerifier for PermissiveVerifier {
        fn verify_inclusion(&self, _root: &Hash32, proof: &[u8], _leaf: &Hash32) -> bool {
            !proof.is_empty()
        }

        fn verify_fraud(&self, _root: &Hash32, _witness: &[u8]) -> bool {
            true
        }

        fn check_witness(&self, witness: &[u8]) -> RollupResult<()> {
            require(!witness.is_empty(), RollupError::InvalidProof("empty".to_string()))
        }
    }

    fn submission(block: u64) -> CommitmentSubmission {
        CommitmentSubmission {
            block,
            hash: [block as u8; 32],
            tx_count: 1,
            total_value: 1,
            root: [0xaa; 32],
            bond: 1000,
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let owner = Pubkey::new_unique();
        let config = RollupConfig::new(owner, owner, Pubkey::new_unique());
        assert!(RollupCore::new(config, InMemoryCustody::new()).is_err());
    }

    #[test]
    fn test_custom_verifier_drives_resolution() {
        let owner = Pubkey::new_unique();
        let custody_address = Pubkey::new_unique();
        let operator = Pubkey::new_unique();
        let challenger = Pubkey::new_unique();
        let config = RollupConfig::new(owner, custody_address, Pubkey::new_unique());

        let mut custody = InMemoryCustody::new();
        custody.fund(operator, NATIVE_TOKEN, 1000);
        custody.fund(challenger, NATIVE_TOKEN, 500);

        let mut core = RollupCore::with_verifier(config, custody, PermissiveVerifier).unwrap();
        core.register_operator(&CallContext::new(owner, 1), operator).unwrap();
        core.submit_commitment(&CallContext::new(operator, 10), submission(10))
            .unwrap();
        core.open_challenge(&CallContext::new(challenger, 20), 10, [10; 32], 500)
            .unwrap();
        assert_eq!(core.bond_pool(), 1500);

        let verdict = core
            .resolve_challenge(&CallContext::new(challenger, 21), 10, challenger, Some(vec![1]))
            .unwrap();

        assert_eq!(verdict, Verdict::Upheld);
        assert_eq!(core.bond_pool(), 0);
        assert_eq!(core.custody().balance_of(&challenger, NATIVE_TOKEN), 1500);
        assert!(!core.get_operator(&operator).unwrap().active);
    }

    #[test]
    fn test_failed_escrow_leaves_no_trace() {
        let owner = Pubkey::new_unique();
        let operator = Pubkey::new_unique();
        let config = RollupConfig::new(owner, Pubkey::new_unique(), Pubkey::new_unique());
        let mut core = RollupCore::new(config, InMemoryCustody::new()).unwrap();
        core.register_operator(&CallContext::new(owner, 1), operator).unwrap();
        let events_before = core.events().len();

        let result = core.submit_commitment(&CallContext::new(operator, 10), submission(10));

        assert!(matches!(result, Err(RollupError::InsufficientFunds(_))));
        assert!(core.get_commitment(10, &[10; 32]).is_none());
        assert_eq!(core.bond_pool(), 0);
        assert_eq!(core.events().len(), events_before);
    }
}
