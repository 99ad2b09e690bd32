//! Voting power per mechanism.
//!
//! - simple majority: one member, one vote
//! - quadratic: floor(sqrt(base power))
//! - role-weighted: sum of the proposal's weights for the member's roles

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use carecoop_types::Address;
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;
use crate::membership::{MembershipRegistry, RoleId};

/// Weight applied to roles missing from a proposal's weight table.
pub const DEFAULT_ROLE_WEIGHT: u64 = 1;

/// How a voting proposal turns membership into voting power.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum VotingMechanism {
    SimpleMajority,
    Quadratic,
    RoleWeighted,
}

impl VotingMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMechanism::SimpleMajority => "simple-majority",
            VotingMechanism::Quadratic => "quadratic",
            VotingMechanism::RoleWeighted => "role-weighted",
        }
    }
}

impl fmt::Display for VotingMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingMechanism {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "simple-majority" | "simple" => Ok(VotingMechanism::SimpleMajority),
            "quadratic" => Ok(VotingMechanism::Quadratic),
            "role-weighted" | "weighted" => Ok(VotingMechanism::RoleWeighted),
            _ => Err(GovernanceError::InvalidVotingMechanism(s.to_string())),
        }
    }
}

/// Integer square root using Newton's method.
/// Returns floor(sqrt(n)).
pub fn integer_sqrt(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }

    // Work in u128 so `x + n / x` cannot overflow near u64::MAX.
    let n = u128::from(n);
    let mut x = n;
    let mut y = (x + 1) / 2;

    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }

    x as u64
}

/// Sum of the weights for `roles`, defaulting missing roles to [`DEFAULT_ROLE_WEIGHT`].
pub fn role_weighted_power(roles: &[RoleId], weights: &BTreeMap<RoleId, u64>) -> u64 {
    roles.iter().fold(0u64, |acc, role| {
        acc.saturating_add(weights.get(role).copied().unwrap_or(DEFAULT_ROLE_WEIGHT))
    })
}

/// Computes a member's power for a given mechanism from registry state.
pub struct VotingPowerCalculator<'a> {
    registry: &'a MembershipRegistry,
}

impl<'a> VotingPowerCalculator<'a> {
    pub fn new(registry: &'a MembershipRegistry) -> Self {
        Self { registry }
    }

    /// Power of `voter`. Zero means the vote must be refused.
    pub fn power_of(
        &self,
        voter: &Address,
        mechanism: VotingMechanism,
        role_weights: &BTreeMap<RoleId, u64>,
    ) -> Result<u64, GovernanceError> {
        let power = match mechanism {
            VotingMechanism::SimpleMajority => 1,
            VotingMechanism::Quadratic => integer_sqrt(self.registry.get_voting_power(voter)?),
            VotingMechanism::RoleWeighted => {
                role_weighted_power(&self.registry.get_member_roles(voter)?, role_weights)
            }
        };
        Ok(power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_sqrt() {
        assert_eq!(integer_sqrt(0), 0);
        assert_eq!(integer_sqrt(1), 1);
        assert_eq!(integer_sqrt(4), 2);
        assert_eq!(integer_sqrt(99), 9);
        assert_eq!(integer_sqrt(100), 10);
        assert_eq!(integer_sqrt(101), 10);
        assert_eq!(integer_sqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn test_role_weights_default_to_one() {
        let mut weights = BTreeMap::new();
        weights.insert("board".to_string(), 5);
        weights.insert("nurse".to_string(), 2);

        let roles = vec!["board".to_string(), "nurse".to_string(), "volunteer".to_string()];
        assert_eq!(role_weighted_power(&roles, &weights), 8);
        assert_eq!(role_weighted_power(&[], &weights), 0);
    }

    #[test]
    fn test_role_weights_saturate() {
        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), u64::MAX);
        weights.insert("b".to_string(), u64::MAX);
        assert_eq!(role_weighted_power(&["a".to_string(), "b".to_string()], &weights), u64::MAX);
    }

    #[test]
    fn test_mechanism_parsing() {
        assert_eq!("quadratic".parse::<VotingMechanism>().unwrap(), VotingMechanism::Quadratic);
        assert_eq!("Simple_Majority".parse::<VotingMechanism>().unwrap(), VotingMechanism::SimpleMajority);
        assert_eq!("role-weighted".parse::<VotingMechanism>().unwrap(), VotingMechanism::RoleWeighted);
        assert_eq!(
            "conviction".parse::<VotingMechanism>(),
            Err(GovernanceError::InvalidVotingMechanism("conviction".to_string()))
        );
    }
}
