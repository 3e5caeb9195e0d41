// src/error.rs
//! Error types for the rollup custody core
//!
//! Every public operation reports failures through [`RollupError`]. The seven
//! categories are stable: callers and on-chain wrappers match on them, and each
//! one maps to a fixed numeric code so it can travel as a
//! `ProgramError::Custom` value.

use solana_program::program_error::ProgramError;
use thiserror::Error;

use crate::custody::CustodyError;

/// Categorical errors of the custody core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollupError {
    /// Caller is not a registered, active operator
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Commitment or challenge is missing, duplicated or in the wrong status
    #[error("Invalid commitment: {0}")]
    InvalidCommitment(String),

    /// Dispute window has not elapsed yet, or has already closed
    #[error("Challenge period: {0}")]
    ChallengePeriod(String),

    /// Proof or witness is malformed, does not verify or was already consumed
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Balance too low, bond below minimum or a custody transfer failed
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Argument outside its domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller lacks the privilege for this operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl RollupError {
    /// Stable numeric code of the error category
    pub fn error_code(&self) -> u32 {
        match self {
            RollupError::InvalidOperator(_) => 6000,
            RollupError::InvalidCommitment(_) => 6001,
            RollupError::ChallengePeriod(_) => 6002,
            RollupError::InvalidProof(_) => 6003,
            RollupError::InsufficientFunds(_) => 6004,
            RollupError::InvalidInput(_) => 6005,
            RollupError::Unauthorized(_) => 6006,
        }
    }
}

impl From<RollupError> for ProgramError {
    fn from(e: RollupError) -> Self {
        ProgramError::Custom(e.error_code())
    }
}

impl From<CustodyError> for RollupError {
    fn from(e: CustodyError) -> Self {
        RollupError::InsufficientFunds(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type RollupResult<T> = Result<T, RollupError>;

/// Return `error` unless `condition` holds
pub fn require(condition: bool, error: RollupError) -> RollupResult<()> {
    if !condition {
        Err(error)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::pubkey::Pubkey;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = vec![
            RollupError::InvalidOperator(String::new()),
            RollupError::InvalidCommitment(String::new()),
            RollupError::ChallengePeriod(String::new()),
            RollupError::InvalidProof(String::new()),
            RollupError::InsufficientFunds(String::new()),
            RollupError::InvalidInput(String::new()),
            RollupError::Unauthorized(String::new()),
        ];

        let mut codes: Vec<u32> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_program_error_conversion() {
        let program_error: ProgramError = RollupError::ChallengePeriod("early".to_string()).into();
        assert_eq!(program_error, ProgramError::Custom(6002));
    }

    #[test]
    fn test_custody_error_maps_to_insufficient_funds() {
        let custody_error = CustodyError::InsufficientFunds {
            account: Pubkey::new_unique(),
            token: 1,
            available: 10,
            required: 20,
        };

        let error: RollupError = custody_error.into();
        assert!(matches!(error, RollupError::InsufficientFunds(_)));
    }

    #[test]
    fn test_require_function() {
        assert!(require(true, RollupError::InvalidInput("unused".to_string())).is_ok());

        let result = require(false, RollupError::InvalidInput("zero amount".to_string()));
        assert_eq!(result, Err(RollupError::InvalidInput("zero amount".to_string())));
    }
}
