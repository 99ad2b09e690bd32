//! Wiring of the governance components over one ledger.

use std::sync::Arc;

use carecoop_core::{BalanceOracle, CallContext, Clock};
use carecoop_storage::Ledger;
use carecoop_types::Address;
use tracing::info;

use crate::config::{AdminConfig, GovernanceConfig};
use crate::delegation::DelegationResolver;
use crate::error::GovernanceError;
use crate::membership::MembershipRegistry;
use crate::proposal::ProposalLifecycle;
use crate::store::StateStore;
use crate::voting::VotingEngine;

/// The governance engine: registry, delegation, lifecycle and voting sharing
/// one ledger, one configuration and one clock.
pub struct Governance {
    config: Arc<GovernanceConfig>,
    clock: Arc<dyn Clock>,
    registry: Arc<MembershipRegistry>,
    delegation: Arc<DelegationResolver>,
    lifecycle: Arc<ProposalLifecycle>,
    voting: VotingEngine,
}

impl Governance {
    /// Validate `config` and build every component.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        config: GovernanceConfig,
        admin: AdminConfig,
        balances: Arc<dyn BalanceOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;
        let config = Arc::new(config);
        let store = StateStore::new(ledger);

        let registry = Arc::new(MembershipRegistry::new(store.clone(), config.clone(), admin)?);
        let delegation = Arc::new(DelegationResolver::new(store.clone(), config.clone(), registry.clone()));
        let lifecycle = Arc::new(ProposalLifecycle::new(store.clone(), config.clone(), balances));
        let voting = VotingEngine::new(
            store,
            config.clone(),
            registry.clone(),
            delegation.clone(),
            lifecycle.clone(),
        );

        info!(
            height = clock.current_height(),
            voting_engine = %config.voting_engine,
            "Governance engine ready"
        );

        Ok(Self {
            config,
            clock,
            registry,
            delegation,
            lifecycle,
            voting,
        })
    }

    /// Context for a call by `caller` at the clock's current height.
    pub fn context(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.clock.current_height())
    }

    /// Context carrying the voting engine identity.
    pub fn engine_context(&self) -> CallContext {
        self.context(self.config.voting_engine)
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn registry(&self) -> &MembershipRegistry {
        &self.registry
    }

    pub fn delegation(&self) -> &DelegationResolver {
        &self.delegation
    }

    pub fn lifecycle(&self) -> &ProposalLifecycle {
        &self.lifecycle
    }

    pub fn voting(&self) -> &VotingEngine {
        &self.voting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carecoop_core::{ManualClock, TokenBalances};
    use carecoop_storage::MemoryLedger;

    #[test]
    fn test_rejects_invalid_config() {
        let config = GovernanceConfig {
            activation_sponsor_count: 0,
            ..Default::default()
        };
        let result = Governance::new(
            Arc::new(MemoryLedger::new()),
            config,
            AdminConfig::new(Address::from_label("admin")),
            Arc::new(TokenBalances::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(GovernanceError::InvalidParameter(_))));
    }

    #[test]
    fn test_context_follows_clock() {
        let clock = Arc::new(ManualClock::new(7));
        let governance = Governance::new(
            Arc::new(MemoryLedger::new()),
            GovernanceConfig::default(),
            AdminConfig::new(Address::from_label("admin")),
            Arc::new(TokenBalances::new()),
            clock.clone(),
        )
        .unwrap();

        assert_eq!(governance.context(Address::from_label("alice")).height, 7);
        clock.advance(3);
        let ctx = governance.engine_context();
        assert_eq!(ctx.height, 10);
        assert_eq!(ctx.caller, Address::system(1));
        assert!(governance.registry().is_admin(&Address::from_label("admin")).unwrap());
    }
}
