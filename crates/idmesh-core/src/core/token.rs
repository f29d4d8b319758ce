// crates/idmesh-core/src/core/token.rs
// ============================================================================
// Module: idmesh Token Ledger
// Description: Per-node token balances with atomic check-and-debit.
// Purpose: Enforce one token per created request without creation races.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Node token balances are a shared mutable counter per node. Request
//! creation consumes exactly one token; the insufficiency check and the
//! debit happen under one lock so concurrent creations against a low balance
//! can never both succeed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::errors::PlatformError;
use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Token Ledger
// ============================================================================

/// In-memory token ledger.
///
/// # Invariants
/// - Balances never underflow; a failed debit leaves the balance unchanged.
#[derive(Debug, Default)]
pub struct TokenLedger {
    /// Balances keyed by node.
    balances: Mutex<BTreeMap<NodeId, u64>>,
}

impl TokenLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the balance for a node, creating the account when missing.
    pub fn set_balance(&self, node_id: &NodeId, amount: u64) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(node_id.clone(), amount);
        }
    }

    /// Adds tokens to an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::TokenAccountNotFound`] when no account
    /// exists.
    pub fn add_tokens(&self, node_id: &NodeId, amount: u64) -> Result<u64, PlatformError> {
        let Ok(mut balances) = self.balances.lock() else {
            return Err(PlatformError::TokenAccountNotFound);
        };
        let balance = balances.get_mut(node_id).ok_or(PlatformError::TokenAccountNotFound)?;
        *balance = balance.saturating_add(amount);
        Ok(*balance)
    }

    /// Returns the balance for a node.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::TokenAccountNotFound`] when no account
    /// exists.
    pub fn balance(&self, node_id: &NodeId) -> Result<u64, PlatformError> {
        let Ok(balances) = self.balances.lock() else {
            return Err(PlatformError::TokenAccountNotFound);
        };
        balances.get(node_id).copied().ok_or(PlatformError::TokenAccountNotFound)
    }

    /// Debits one token from the node's account.
    ///
    /// The check and the decrement happen under one lock, so two concurrent
    /// debits against a balance of one cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::TokenAccountNotFound`] when no account
    /// exists and [`PlatformError::InsufficientToken`] for a zero balance.
    pub fn debit_one(&self, node_id: &NodeId) -> Result<u64, PlatformError> {
        let Ok(mut balances) = self.balances.lock() else {
            return Err(PlatformError::TokenAccountNotFound);
        };
        let balance = balances.get_mut(node_id).ok_or(PlatformError::TokenAccountNotFound)?;
        if *balance == 0 {
            return Err(PlatformError::InsufficientToken);
        }
        *balance -= 1;
        Ok(*balance)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_fails_on_zero_balance_and_preserves_account() {
        let ledger = TokenLedger::new();
        let node = NodeId::new("rp1");
        ledger.set_balance(&node, 1);
        assert_eq!(ledger.debit_one(&node), Ok(0));
        assert_eq!(ledger.debit_one(&node), Err(PlatformError::InsufficientToken));
        assert_eq!(ledger.balance(&node), Ok(0));
    }

    #[test]
    fn add_requires_existing_account() {
        let ledger = TokenLedger::new();
        let node = NodeId::new("rp1");
        assert_eq!(ledger.add_tokens(&node, 5), Err(PlatformError::TokenAccountNotFound));
        ledger.set_balance(&node, 2);
        assert_eq!(ledger.add_tokens(&node, 3), Ok(5));
    }
}
