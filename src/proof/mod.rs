// src/proof/mod.rs
//! Proof Verifier
//!
//! Inclusion proofs gate withdrawals and fraud witnesses decide challenges.
//! The [`ProofVerifier`] trait is the seam; [`MerkleProofVerifier`] is the
//! keccak Merkle implementation shipped with the core.

mod merkle_tree;
mod verification;

pub use merkle_tree::{
    balance_leaf, balance_leaf_from_bytes, hash_nodes, InclusionProof, MerkleTree,
    MAX_PROOF_DEPTH,
};
pub use verification::{
    FraudWitness, LeafOpening, MerkleProofVerifier, ProofVerifier, MAX_WITNESS_OPENINGS,
};
