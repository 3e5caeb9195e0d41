// src/lib.rs
//! Rollup Custody Core
//!
//! Custody and dispute core of an optimistic rollup bridge:
//! - Operator Registry: who may publish state commitments
//! - Commitment Store: bonded state roots with a block-height dispute window
//! - Challenge Manager: bonded disputes resolved through fraud witnesses
//! - Balance Ledger: deposits, proof-gated withdrawals and internal transfers
//! - Proof Verifier: keccak Merkle inclusion and fraud checks
//!
//! The execution environment supplies the caller identity and block height
//! per call ([`CallContext`]) and the base-chain transfer primitive
//! ([`Custody`]). Calls run one at a time and each either commits fully or
//! fails without effects.

pub mod challenge;
pub mod commitment;
pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod ledger;
pub mod proof;
pub mod registry;
pub mod rollup;
pub mod types;

pub use challenge::{Challenge, ChallengeStatus, Verdict};
pub use commitment::{CommitmentKey, CommitmentStatus, CommitmentSubmission, StateCommitment};
pub use config::{ForfeitPolicy, RollupConfig};
pub use custody::{Custody, CustodyError, InMemoryCustody};
pub use error::{RollupError, RollupResult};
pub use events::{EventRecord, RollupEvent};
pub use proof::{
    balance_leaf, FraudWitness, InclusionProof, LeafOpening, MerkleProofVerifier, MerkleTree,
    ProofVerifier,
};
pub use registry::Operator;
pub use rollup::RollupCore;
pub use types::{CallContext, Hash32, Identity, TokenId, NATIVE_TOKEN};
