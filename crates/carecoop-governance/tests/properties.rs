//! Property tests for voting power and delegation.

use std::collections::BTreeMap;
use std::sync::Arc;

use carecoop_core::{CallContext, ManualClock, TokenBalances};
use carecoop_governance::power::role_weighted_power;
use carecoop_governance::{integer_sqrt, AdminConfig, Governance, GovernanceConfig, GovernanceError};
use carecoop_storage::MemoryLedger;
use carecoop_types::Address;
use proptest::prelude::*;

fn member(i: usize) -> Address {
    Address::from_label(format!("member-{}", i))
}

fn governance_with(members: usize) -> Governance {
    let governance = Governance::new(
        Arc::new(MemoryLedger::new()),
        GovernanceConfig::default(),
        AdminConfig::new(Address::from_label("admin")),
        Arc::new(TokenBalances::new()),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    let admin = CallContext::new(Address::from_label("admin"), 0);
    for i in 0..members {
        governance
            .registry()
            .register_member(&admin, member(i), vec![], 1)
            .unwrap();
    }
    governance
}

proptest! {
    #[test]
    fn integer_sqrt_is_floor_of_root(n in any::<u64>()) {
        let root = integer_sqrt(n);
        prop_assert!(u128::from(root) * u128::from(root) <= u128::from(n));
        prop_assert!((u128::from(root) + 1) * (u128::from(root) + 1) > u128::from(n));
    }

    #[test]
    fn role_weight_sum_ignores_unknown_roles_beyond_default(
        weights in proptest::collection::btree_map("[a-e]", 0u64..1_000, 0..5),
        roles in proptest::collection::btree_set("[a-h]", 0..5),
    ) {
        let roles: Vec<String> = roles.into_iter().collect();
        let expected: u64 = roles.iter().map(|r| weights.get(r).copied().unwrap_or(1)).sum();
        prop_assert_eq!(role_weighted_power(&roles, &weights), expected);
    }

    /// Random edge insertions never produce a cycle, and every resolution
    /// ends at a member without an outgoing edge.
    #[test]
    fn delegation_graph_stays_acyclic(edges in proptest::collection::vec((0usize..8, 0usize..8), 0..40)) {
        let governance = governance_with(8);
        let delegation = governance.delegation();

        for (from, to) in edges {
            let ctx = CallContext::new(member(from), 1);
            match delegation.set_delegation(&ctx, member(to)) {
                Ok(()) => {}
                Err(GovernanceError::DelegationCycle) | Err(GovernanceError::InvalidDelegate(_)) => {}
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        for i in 0..8 {
            let effective = delegation.resolve(&member(i)).unwrap();
            prop_assert_eq!(delegation.get_delegation(&effective).unwrap(), None);
        }
    }
}

#[test]
fn role_weights_are_per_proposal() {
    let mut heavy = BTreeMap::new();
    heavy.insert("board".to_string(), 10);
    let roles = vec!["board".to_string()];
    assert_eq!(role_weighted_power(&roles, &heavy), 10);
    assert_eq!(role_weighted_power(&roles, &BTreeMap::new()), 1);
}
