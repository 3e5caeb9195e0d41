// src/types.rs
//! Primitive types shared by every component

use solana_program::pubkey::Pubkey;

/// Identity of a caller, operator or account holder
pub type Identity = Pubkey;

/// Fixed-width digest (state roots, batch hashes, Merkle nodes)
pub type Hash32 = [u8; 32];

/// Token identifier
pub type TokenId = u64;

/// Token used for operator and challenger bonds
pub const NATIVE_TOKEN: TokenId = 0;

/// The all-zero digest, treated as "no digest"
pub const ZERO_HASH: Hash32 = [0; 32];

/// Per-call data supplied by the execution environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Invoking party, trusted as authentic
    pub caller: Identity,

    /// Current base-chain block height
    pub height: u64,
}

impl CallContext {
    /// Create a new call context
    pub fn new(caller: Identity, height: u64) -> Self {
        Self { caller, height }
    }
}

/// Check that `address` may act as a principal: it must be a real key and
/// must not be the custody address that holds escrowed funds.
pub fn is_valid_principal(address: &Identity, custody_address: &Identity) -> bool {
    *address != Pubkey::default() && address != custody_address
}

/// Short hex rendering of a digest for log lines
pub fn short_hex(hash: &Hash32) -> String {
    hex::encode(&hash[..8])
}
