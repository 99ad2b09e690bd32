//! Token balances consulted for submission and sponsorship gating.

use carecoop_types::Address;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read-only view of token balances.
///
/// Must be synchronous, side-effect free and infallible for any identity.
pub trait BalanceOracle: Send + Sync {
    fn balance_of(&self, account: &Address) -> u128;
}

/// In-memory balance table.
#[derive(Debug, Default)]
pub struct TokenBalances {
    balances: RwLock<HashMap<Address, u128>>,
}

impl TokenBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set account balance
    pub fn set_balance(&self, account: Address, balance: u128) {
        self.balances.write().insert(account, balance);
    }
}

impl FromIterator<(Address, u128)> for TokenBalances {
    fn from_iter<I: IntoIterator<Item = (Address, u128)>>(iter: I) -> Self {
        Self {
            balances: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl BalanceOracle for TokenBalances {
    fn balance_of(&self, account: &Address) -> u128 {
        self.balances.read().get(account).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_account_has_zero_balance() {
        let balances = TokenBalances::new();
        assert_eq!(balances.balance_of(&Address::from_label("nobody")), 0);
    }

    #[test]
    fn test_set_balance_overwrites() {
        let alice = Address::from_label("alice");
        let balances = TokenBalances::new();
        balances.set_balance(alice, 100);
        balances.set_balance(alice, 40);
        assert_eq!(balances.balance_of(&alice), 40);
    }

    #[test]
    fn test_collect() {
        let alice = Address::from_label("alice");
        let balances: TokenBalances = [(alice, 500)].into_iter().collect();
        assert_eq!(balances.balance_of(&alice), 500);
    }
}
