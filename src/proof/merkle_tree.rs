// src/proof/merkle_tree.rs
//! Merkle Tree over rollup balance leaves
//!
//! Leaves and inner nodes are hashed with keccak under distinct one-byte
//! prefixes, so a leaf can never be replayed as an inner node. Odd levels
//! duplicate their last node, and a single leaf is paired with itself, which
//! gives every inclusion proof at least one sibling.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::keccak;

use crate::types::{Hash32, Identity, TokenId, ZERO_HASH};

const LEAF_PREFIX: &[u8] = &[0x00];
const NODE_PREFIX: &[u8] = &[0x01];

/// Deepest proof accepted by the verifier
pub const MAX_PROOF_DEPTH: usize = 64;

/// Hash of a balance leaf `(user, token, amount)`
pub fn balance_leaf(user: &Identity, token: TokenId, amount: u64) -> Hash32 {
    balance_leaf_from_bytes(&user.to_bytes(), token, amount)
}

/// Hash of a balance leaf from a raw 32-byte user key
pub fn balance_leaf_from_bytes(user: &[u8; 32], token: TokenId, amount: u64) -> Hash32 {
    keccak::hashv(&[
        LEAF_PREFIX,
        &user[..],
        &token.to_le_bytes()[..],
        &amount.to_le_bytes()[..],
    ])
    .to_bytes()
}

/// Hash two nodes together
pub fn hash_nodes(left: &Hash32, right: &Hash32) -> Hash32 {
    keccak::hashv(&[NODE_PREFIX, &left[..], &right[..]]).to_bytes()
}

/// Sibling path from a leaf to the root
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct InclusionProof {
    /// Position of the leaf in the tree
    pub index: u64,

    /// Siblings from the leaf level upwards
    pub siblings: Vec<Hash32>,
}

impl InclusionProof {
    /// Borsh encoding of the proof, as carried in withdrawal calls
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing into a Vec cannot fail.
        self.try_to_vec().unwrap_or_default()
    }

    /// Decode a proof; any trailing or missing byte is an error
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::try_from_slice(bytes).ok()
    }
}

/// Merkle tree implementation
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Leaves of the tree
    leaves: Vec<Hash32>,

    /// Root of the tree
    root: Hash32,
}

impl MerkleTree {
    /// Create a new Merkle tree from leaves
    pub fn new(leaves: Vec<Hash32>) -> Self {
        let root = Self::calculate_root(&leaves);
        Self { leaves, root }
    }

    /// Build a tree over `(user, token, amount)` balance entries
    pub fn from_balances(entries: &[(Identity, TokenId, u64)]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|(user, token, amount)| balance_leaf(user, *token, *amount))
                .collect(),
        )
    }

    /// Get the root of the tree
    pub fn root(&self) -> Hash32 {
        self.root
    }

    fn calculate_root(leaves: &[Hash32]) -> Hash32 {
        if leaves.is_empty() {
            return ZERO_HASH;
        }

        let mut level = leaves.to_vec();
        loop {
            level = Self::next_level(&level);
            if level.len() == 1 {
                return level[0];
            }
        }
    }

    fn next_level(level: &[Hash32]) -> Vec<Hash32> {
        level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                hash_nodes(&left, &right)
            })
            .collect()
    }

    /// Generate an inclusion proof for the leaf at `index`
    pub fn generate_proof(&self, index: usize) -> Option<InclusionProof> {
        if index >= self.leaves.len() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut position = index;
        let mut level = self.leaves.clone();

        loop {
            let sibling = level.get(position ^ 1).copied().unwrap_or(level[position]);
            siblings.push(sibling);

            level = Self::next_level(&level);
            position /= 2;
            if level.len() == 1 {
                break;
            }
        }

        Some(InclusionProof {
            index: index as u64,
            siblings,
        })
    }

    /// Verify an inclusion proof against `root`.
    ///
    /// Fails closed: an empty or over-deep path, or an index that does not
    /// fit the path length, is rejected before any hashing.
    pub fn verify_proof(root: &Hash32, leaf: &Hash32, proof: &InclusionProof) -> bool {
        let depth = proof.siblings.len();
        if depth == 0 || depth > MAX_PROOF_DEPTH {
            return false;
        }
        if depth < 64 && proof.index >> depth != 0 {
            return false;
        }

        let mut current = *leaf;
        let mut position = proof.index;
        for sibling in &proof.siblings {
            current = if position & 1 == 0 {
                hash_nodes(&current, sibling)
            } else {
                hash_nodes(sibling, &current)
            };
            position >>= 1;
        }

        current == *root
    }

    /// Get the number of leaves in the tree
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}
