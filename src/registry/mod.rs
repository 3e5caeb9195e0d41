// src/registry/mod.rs
//! Operator Registry
//!
//! Tracks which identities may publish state commitments. Only the configured
//! owner registers or deactivates operators, and entries are never deleted so
//! the operator history stays auditable.

use std::collections::HashMap;

use log::info;

use crate::error::{require, RollupError, RollupResult};
use crate::types::{is_valid_principal, CallContext, Identity};

/// Registered operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Operator identity
    pub address: Identity,

    /// Whether the operator may submit commitments
    pub active: bool,

    /// Block height of registration
    pub registered_at: u64,
}

/// Registry of commitment operators
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    /// Identity allowed to register and deactivate operators
    owner: Identity,

    /// Custody address, never a valid operator
    custody_address: Identity,

    /// Operators by address
    operators: HashMap<Identity, Operator>,
}

impl OperatorRegistry {
    /// Create an empty registry owned by `owner`
    pub fn new(owner: Identity, custody_address: Identity) -> Self {
        Self {
            owner,
            custody_address,
            operators: HashMap::new(),
        }
    }

    fn ensure_owner(&self, ctx: &CallContext) -> RollupResult<()> {
        require(
            ctx.caller == self.owner,
            RollupError::Unauthorized(format!("{} is not the registry owner", ctx.caller)),
        )
    }

    /// Register `address` as an active operator
    pub fn register(&mut self, ctx: &CallContext, address: Identity) -> RollupResult<&Operator> {
        self.ensure_owner(ctx)?;
        require(
            is_valid_principal(&address, &self.custody_address),
            RollupError::InvalidInput(format!("{} cannot be an operator", address)),
        )?;
        require(
            !self.operators.contains_key(&address),
            RollupError::InvalidOperator(format!("operator {} is already registered", address)),
        )?;

        info!("Operator registered: {}", address);

        Ok(self.operators.entry(address).or_insert(Operator {
            address,
            active: true,
            registered_at: ctx.height,
        }))
    }

    /// Deactivate `address` on behalf of the owner
    pub fn deactivate(&mut self, ctx: &CallContext, address: &Identity) -> RollupResult<()> {
        self.ensure_owner(ctx)?;
        let operator = self
            .operators
            .get_mut(address)
            .ok_or_else(|| RollupError::InvalidOperator(format!("operator {} is not registered", address)))?;

        operator.active = false;
        info!("Operator deactivated by owner: {}", address);

        Ok(())
    }

    /// Deactivate an operator whose commitment was proven fraudulent.
    /// Returns whether the operator was active before the call.
    pub(crate) fn slash(&mut self, address: &Identity) -> bool {
        match self.operators.get_mut(address) {
            Some(operator) => {
                let was_active = operator.active;
                operator.active = false;
                info!("Operator slashed: {}", address);
                was_active
            }
            None => false,
        }
    }

    /// Fail with `InvalidOperator` unless `address` is registered and active
    pub fn ensure_active(&self, address: &Identity) -> RollupResult<()> {
        match self.operators.get(address) {
            Some(operator) if operator.active => Ok(()),
            Some(_) => Err(RollupError::InvalidOperator(format!(
                "operator {} is inactive",
                address
            ))),
            None => Err(RollupError::InvalidOperator(format!(
                "operator {} is not registered",
                address
            ))),
        }
    }

    /// Get an operator
    pub fn get_operator(&self, address: &Identity) -> Option<&Operator> {
        self.operators.get(address)
    }

    /// Get active operators
    pub fn active_operators(&self) -> Vec<&Operator> {
        self.operators
            .values()
            .filter(|operator| operator.active)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::pubkey::Pubkey;

    fn registry() -> (OperatorRegistry, CallContext) {
        let owner = Pubkey::new_unique();
        let custody = Pubkey::new_unique();
        (OperatorRegistry::new(owner, custody), CallContext::new(owner, 1))
    }

    #[test]
    fn test_register_and_query() {
        let (mut registry, owner_ctx) = registry();
        let operator = Pubkey::new_unique();

        registry.register(&owner_ctx, operator).unwrap();

        let entry = registry.get_operator(&operator).unwrap();
        assert!(entry.active);
        assert_eq!(entry.registered_at, 1);
        assert!(registry.ensure_active(&operator).is_ok());
        assert_eq!(registry.active_operators().len(), 1);
    }

    #[test]
    fn test_only_owner_registers() {
        let (mut registry, _) = registry();
        let operator = Pubkey::new_unique();

        // An operator registering itself is still not the owner.
        let self_ctx = CallContext::new(operator, 1);
        assert!(matches!(
            registry.register(&self_ctx, operator),
            Err(RollupError::Unauthorized(_))
        ));
        assert!(registry.get_operator(&operator).is_none());
    }

    #[test]
    fn test_duplicate_and_invalid_registration() {
        let (mut registry, owner_ctx) = registry();
        let operator = Pubkey::new_unique();

        registry.register(&owner_ctx, operator).unwrap();
        assert!(matches!(
            registry.register(&owner_ctx, operator),
            Err(RollupError::InvalidOperator(_))
        ));
        assert!(matches!(
            registry.register(&owner_ctx, Pubkey::default()),
            Err(RollupError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_deactivation_keeps_history() {
        let (mut registry, owner_ctx) = registry();
        let operator = Pubkey::new_unique();
        registry.register(&owner_ctx, operator).unwrap();

        let stranger = CallContext::new(Pubkey::new_unique(), 2);
        assert!(matches!(
            registry.deactivate(&stranger, &operator),
            Err(RollupError::Unauthorized(_))
        ));

        registry.deactivate(&owner_ctx, &operator).unwrap();

        assert!(!registry.get_operator(&operator).unwrap().active);
        assert!(matches!(
            registry.ensure_active(&operator),
            Err(RollupError::InvalidOperator(_))
        ));
        assert!(matches!(
            registry.register(&owner_ctx, operator),
            Err(RollupError::InvalidOperator(_))
        ));
    }

    #[test]
    fn test_slash_deactivates_once() {
        let (mut registry, owner_ctx) = registry();
        let operator = Pubkey::new_unique();
        registry.register(&owner_ctx, operator).unwrap();

        assert!(registry.slash(&operator));
        assert!(!registry.slash(&operator));
        assert!(!registry.slash(&Pubkey::new_unique()));
    }
}
