// src/config.rs
//! Configuration for the rollup custody core
//!
//! The registry owner and the custody address are injected here at
//! initialization and checked per privileged call.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_program::pubkey::Pubkey;

use crate::error::{require, RollupError, RollupResult};
use crate::types::Identity;

/// Default dispute window, in base-chain blocks
pub const DEFAULT_DISPUTE_WINDOW: u64 = 100;

/// Default minimum operator bond, in native units
pub const DEFAULT_MIN_COMMITMENT_BOND: u64 = 1000;

/// Default minimum challenger bond, in native units
pub const DEFAULT_MIN_CHALLENGE_BOND: u64 = 500;

/// Recipient of a bond forfeited by a rejected challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForfeitPolicy {
    /// The operator whose commitment was wrongly challenged
    Operator,

    /// The protocol treasury
    Treasury,
}

impl Default for ForfeitPolicy {
    fn default() -> Self {
        ForfeitPolicy::Operator
    }
}

/// Rollup custody configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Registry owner, the only identity allowed to register operators
    #[serde(with = "pubkey_string")]
    pub owner: Identity,

    /// Account holding escrowed bonds and deposited funds
    #[serde(with = "pubkey_string")]
    pub custody_address: Identity,

    /// Protocol treasury receiving forfeited challenge bonds under `ForfeitPolicy::Treasury`
    #[serde(with = "pubkey_string")]
    pub treasury: Identity,

    /// Dispute window in blocks, counted from the commitment's block
    #[serde(default = "default_dispute_window")]
    pub dispute_window: u64,

    /// Minimum bond posted with a commitment
    #[serde(default = "default_min_commitment_bond")]
    pub min_commitment_bond: u64,

    /// Minimum bond posted with a challenge
    #[serde(default = "default_min_challenge_bond")]
    pub min_challenge_bond: u64,

    /// Who receives the bond of a rejected challenge
    #[serde(default)]
    pub forfeit_policy: ForfeitPolicy,
}

fn default_dispute_window() -> u64 {
    DEFAULT_DISPUTE_WINDOW
}

fn default_min_commitment_bond() -> u64 {
    DEFAULT_MIN_COMMITMENT_BOND
}

fn default_min_challenge_bond() -> u64 {
    DEFAULT_MIN_CHALLENGE_BOND
}

impl RollupConfig {
    /// Create a configuration with default windows and bonds
    pub fn new(owner: Identity, custody_address: Identity, treasury: Identity) -> Self {
        Self {
            owner,
            custody_address,
            treasury,
            dispute_window: DEFAULT_DISPUTE_WINDOW,
            min_commitment_bond: DEFAULT_MIN_COMMITMENT_BOND,
            min_challenge_bond: DEFAULT_MIN_CHALLENGE_BOND,
            forfeit_policy: ForfeitPolicy::default(),
        }
    }

    /// Create a configuration with the specified dispute window
    pub fn with_dispute_window(mut self, dispute_window: u64) -> Self {
        self.dispute_window = dispute_window;
        self
    }

    /// Create a configuration with the specified forfeit policy
    pub fn with_forfeit_policy(mut self, forfeit_policy: ForfeitPolicy) -> Self {
        self.forfeit_policy = forfeit_policy;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> RollupResult<Self> {
        let config: RollupConfig = serde_json::from_str(json)
            .map_err(|e| RollupError::InvalidInput(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> RollupResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RollupError::InvalidInput(format!("config serialization failed: {}", e)))
    }

    /// Check the configuration for values the core cannot run with
    pub fn validate(&self) -> RollupResult<()> {
        require(
            self.owner != Pubkey::default(),
            RollupError::InvalidInput("owner must be a non-zero identity".to_string()),
        )?;
        require(
            self.custody_address != Pubkey::default(),
            RollupError::InvalidInput("custody address must be a non-zero identity".to_string()),
        )?;
        require(
            self.custody_address != self.owner,
            RollupError::InvalidInput("custody address must differ from the owner".to_string()),
        )?;
        require(
            self.treasury != Pubkey::default() && self.treasury != self.custody_address,
            RollupError::InvalidInput("treasury must be a principal distinct from custody".to_string()),
        )?;
        require(
            self.dispute_window > 0,
            RollupError::InvalidInput("dispute window must be positive".to_string()),
        )?;
        Ok(())
    }
}

/// Serde adapter rendering identities as base58 strings
mod pubkey_string {
    use super::*;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Pubkey::from_str(&encoded).map_err(serde::de::Error::custom)
    }
}
