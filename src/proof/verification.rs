// src/proof/verification.rs
//! Verification hooks binding withdrawals and challenge outcomes to
//! committed state roots.
//!
//! Both checks are deterministic and side-effect free, and both fail closed:
//! empty, truncated or undecodable input is rejected, never treated as
//! success.

use std::collections::HashSet;

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;

use super::merkle_tree::{balance_leaf_from_bytes, InclusionProof, MerkleTree};
use crate::error::{RollupError, RollupResult};
use crate::types::{short_hex, Hash32, TokenId};

/// Most leaf openings a single fraud witness may carry
pub const MAX_WITNESS_OPENINGS: usize = 256;

/// Verification primitive consumed by the ledger and the challenge manager
pub trait ProofVerifier {
    /// Check that `leaf` is committed under `root`
    fn verify_inclusion(&self, root: &Hash32, proof: &[u8], leaf: &Hash32) -> bool;

    /// Check that `witness` demonstrates `root` is inconsistent
    fn verify_fraud(&self, root: &Hash32, witness: &[u8]) -> bool;

    /// Structural check of a witness, independent of any root
    fn check_witness(&self, witness: &[u8]) -> RollupResult<()>;
}

/// An opened balance leaf: its preimage plus the path to the root
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LeafOpening {
    /// Raw 32-byte account key
    pub user: [u8; 32],

    /// Token of the balance
    pub token: TokenId,

    /// Claimed amount
    pub amount: u64,

    /// Path from the leaf to the root
    pub proof: InclusionProof,
}

impl LeafOpening {
    /// Leaf hash of this opening
    pub fn leaf(&self) -> Hash32 {
        balance_leaf_from_bytes(&self.user, self.token, self.amount)
    }

    fn opens_under(&self, root: &Hash32) -> bool {
        MerkleTree::verify_proof(root, &self.leaf(), &self.proof)
    }
}

/// Evidence that a committed root describes an impossible state
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum FraudWitness {
    /// The root commits two different balances for the same account and token
    ConflictingLeaves {
        first: LeafOpening,
        second: LeafOpening,
    },

    /// The root commits balances of one token whose sum exceeds the supply
    /// any custody could hold
    OverflowingLeaves {
        token: TokenId,
        openings: Vec<LeafOpening>,
    },
}

impl FraudWitness {
    /// Borsh encoding of the witness, as carried in resolve calls
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing into a Vec cannot fail.
        self.try_to_vec().unwrap_or_default()
    }

    /// Decode and structurally validate a witness
    pub fn decode(bytes: &[u8]) -> RollupResult<Self> {
        if bytes.is_empty() {
            return Err(RollupError::InvalidProof("empty fraud witness".to_string()));
        }

        let witness = Self::try_from_slice(bytes)
            .map_err(|e| RollupError::InvalidProof(format!("undecodable fraud witness: {}", e)))?;

        match &witness {
            FraudWitness::ConflictingLeaves { .. } => {}
            FraudWitness::OverflowingLeaves { openings, .. } => {
                if openings.len() < 2 || openings.len() > MAX_WITNESS_OPENINGS {
                    return Err(RollupError::InvalidProof(format!(
                        "overflow witness needs 2..={} openings, got {}",
                        MAX_WITNESS_OPENINGS,
                        openings.len()
                    )));
                }
            }
        }

        Ok(witness)
    }

    /// Evaluate the witness against `root`
    pub fn demonstrates_fraud(&self, root: &Hash32) -> bool {
        match self {
            FraudWitness::ConflictingLeaves { first, second } => {
                // Same key, different leaf: an honest tree holds one leaf per key.
                first.user == second.user
                    && first.token == second.token
                    && first.amount != second.amount
                    && first.opens_under(root)
                    && second.opens_under(root)
            }
            FraudWitness::OverflowingLeaves { token, openings } => {
                let mut seen = HashSet::new();
                let mut total: u64 = 0;
                let mut overflowed = false;

                for opening in openings {
                    // Duplicated padding nodes repeat a leaf; count each leaf once.
                    if opening.token != *token || !seen.insert(opening.leaf()) {
                        return false;
                    }
                    if !opening.opens_under(root) {
                        return false;
                    }
                    match total.checked_add(opening.amount) {
                        Some(sum) => total = sum,
                        None => overflowed = true,
                    }
                }

                overflowed
            }
        }
    }
}

/// Keccak Merkle verifier over balance leaves
#[derive(Debug, Default, Clone, Copy)]
pub struct MerkleProofVerifier;

impl MerkleProofVerifier {
    /// Create a new verifier
    pub fn new() -> Self {
        Self
    }
}

impl ProofVerifier for MerkleProofVerifier {
    fn verify_inclusion(&self, root: &Hash32, proof: &[u8], leaf: &Hash32) -> bool {
        let proof = match InclusionProof::from_bytes(proof) {
            Some(proof) => proof,
            None => {
                debug!("inclusion proof for root {} is undecodable", short_hex(root));
                return false;
            }
        };

        let valid = MerkleTree::verify_proof(root, leaf, &proof);
        debug!(
            "inclusion of leaf {} under root {} at index {}: {}",
            short_hex(leaf),
            short_hex(root),
            proof.index,
            valid
        );
        valid
    }

    fn verify_fraud(&self, root: &Hash32, witness: &[u8]) -> bool {
        match FraudWitness::decode(witness) {
            Ok(witness) => {
                let fraud = witness.demonstrates_fraud(root);
                debug!("fraud witness against root {}: {}", short_hex(root), fraud);
                fraud
            }
            Err(e) => {
                debug!("fraud witness against root {} rejected: {}", short_hex(root), e);
                false
            }
        }
    }

    fn check_witness(&self, witness: &[u8]) -> RollupResult<()> {
        FraudWitness::decode(witness).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::merkle_tree::balance_leaf;
    use solana_program::pubkey::Pubkey;

    fn opening(tree: &MerkleTree, index: usize, user: &Pubkey, token: TokenId, amount: u64) -> LeafOpening {
        LeafOpening {
            user: user.to_bytes(),
            token,
            amount,
            proof: tree.generate_proof(index).unwrap(),
        }
    }

    #[test]
    fn test_verify_inclusion() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let tree = MerkleTree::from_balances(&[(alice, 1, 100), (bob, 1, 50), (alice, 2, 7)]);
        let verifier = MerkleProofVerifier::new();

        let proof = tree.generate_proof(1).unwrap().to_bytes();
        assert!(verifier.verify_inclusion(&tree.root(), &proof, &balance_leaf(&bob, 1, 50)));
        assert!(!verifier.verify_inclusion(&tree.root(), &proof, &balance_leaf(&bob, 1, 51)));
        assert!(!verifier.verify_inclusion(&tree.root(), &[], &balance_leaf(&bob, 1, 50)));
        assert!(!verifier.verify_inclusion(&tree.root(), &proof[..10], &balance_leaf(&bob, 1, 50)));
    }

    #[test]
    fn test_conflicting_leaves_prove_fraud() {
        let alice = Pubkey::new_unique();
        let tree = MerkleTree::from_balances(&[(alice, 1, 100), (alice, 1, 900)]);
        let witness = FraudWitness::ConflictingLeaves {
            first: opening(&tree, 0, &alice, 1, 100),
            second: opening(&tree, 1, &alice, 1, 900),
        };

        let verifier = MerkleProofVerifier::new();
        assert!(verifier.verify_fraud(&tree.root(), &witness.to_bytes()));

        let other_root = MerkleTree::from_balances(&[(alice, 1, 100)]).root();
        assert!(!verifier.verify_fraud(&other_root, &witness.to_bytes()));
    }

    #[test]
    fn test_honest_tree_has_no_conflict() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let tree = MerkleTree::from_balances(&[(alice, 1, 100), (bob, 1, 100), (alice, 2, 5)]);

        // Index 3 is the padded copy of index 2; the same leaf is not a conflict.
        let padded = LeafOpening {
            user: alice.to_bytes(),
            token: 2,
            amount: 5,
            proof: InclusionProof {
                index: 3,
                siblings: tree.generate_proof(2).unwrap().siblings,
            },
        };
        assert!(padded.opens_under(&tree.root()));

        let witness = FraudWitness::ConflictingLeaves {
            first: opening(&tree, 2, &alice, 2, 5),
            second: padded,
        };
        assert!(!MerkleProofVerifier::new().verify_fraud(&tree.root(), &witness.to_bytes()));
    }

    #[test]
    fn test_overflowing_leaves_prove_fraud() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let tree = MerkleTree::from_balances(&[(alice, 3, u64::MAX - 1), (bob, 3, 2)]);
        let witness = FraudWitness::OverflowingLeaves {
            token: 3,
            openings: vec![
                opening(&tree, 0, &alice, 3, u64::MAX - 1),
                opening(&tree, 1, &bob, 3, 2),
            ],
        };

        assert!(MerkleProofVerifier::new().verify_fraud(&tree.root(), &witness.to_bytes()));
    }

    #[test]
    fn test_overflow_witness_rejects_repeated_leaf() {
        let alice = Pubkey::new_unique();
        let tree = MerkleTree::from_balances(&[(alice, 3, u64::MAX / 2 + 1)]);
        let first = opening(&tree, 0, &alice, 3, u64::MAX / 2 + 1);
        let witness = FraudWitness::OverflowingLeaves {
            token: 3,
            openings: vec![first.clone(), first],
        };

        assert!(!MerkleProofVerifier::new().verify_fraud(&tree.root(), &witness.to_bytes()));
    }

    #[test]
    fn test_check_witness_rejects_malformed_input() {
        let verifier = MerkleProofVerifier::new();

        assert!(matches!(verifier.check_witness(&[]), Err(RollupError::InvalidProof(_))));
        assert!(matches!(verifier.check_witness(&[7, 1, 2]), Err(RollupError::InvalidProof(_))));

        let lonely = FraudWitness::OverflowingLeaves {
            token: 1,
            openings: Vec::new(),
        };
        assert!(matches!(
            verifier.check_witness(&lonely.to_bytes()),
            Err(RollupError::InvalidProof(_))
        ));
        assert!(!verifier.verify_fraud(&[1; 32], &lonely.to_bytes()));
    }
}
