//! Liquid delegation of votes.
//!
//! Every member has at most one outgoing edge. Cycles are refused when an
//! edge is created, so resolution only has to bound the walk, never break it.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use carecoop_core::CallContext;
use carecoop_storage::Column;
use carecoop_types::{Address, BlockHeight};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::membership::MembershipRegistry;
use crate::store::StateStore;

/// Delegation record, keyed by the delegator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Delegation {
    /// Delegate (who receives the vote)
    pub delegate: Address,
    /// Height when the edge was written
    pub since: BlockHeight,
}

/// Owns the delegation graph and resolves effective voters.
pub struct DelegationResolver {
    store: StateStore,
    config: Arc<GovernanceConfig>,
    registry: Arc<MembershipRegistry>,
    // Cycle checks can read arbitrary chains, so all edge writes share one lock.
    graph_lock: Mutex<()>,
}

impl DelegationResolver {
    pub fn new(store: StateStore, config: Arc<GovernanceConfig>, registry: Arc<MembershipRegistry>) -> Self {
        Self {
            store,
            config,
            registry,
            graph_lock: Mutex::new(()),
        }
    }

    /// Delegate the caller's vote to `delegate_to`, replacing any existing edge.
    ///
    /// # Errors
    /// - `NotMember` if the caller is not registered
    /// - `InvalidDelegate` on self-delegation or an unregistered delegate
    /// - `DelegationCycle` if the chain from `delegate_to` leads back to the caller
    pub fn set_delegation(&self, ctx: &CallContext, delegate_to: Address) -> Result<(), GovernanceError> {
        let delegator = ctx.caller;
        self.registry.require_member(&delegator)?;

        if delegate_to == delegator {
            return Err(GovernanceError::InvalidDelegate("cannot delegate to self".to_string()));
        }
        if !self.registry.is_member(&delegate_to)? {
            return Err(GovernanceError::InvalidDelegate(format!("{} is not a member", delegate_to)));
        }

        let _guard = self.graph_lock.lock();

        // Checks `delegate_to` and every member up to `max_delegation_hops` past it.
        let mut current = delegate_to;
        for hop in 0..=self.config.max_delegation_hops {
            if current == delegator {
                warn!(%delegator, %delegate_to, hop, "Rejected delegation cycle");
                return Err(GovernanceError::DelegationCycle);
            }
            match self.get_delegation(&current)? {
                Some(next) => current = next,
                None => break,
            }
        }

        let mut txn = self.store.begin();
        txn.put(
            Column::Delegations,
            delegator.as_bytes(),
            &Delegation {
                delegate: delegate_to,
                since: ctx.height,
            },
        )?;
        txn.commit()?;

        info!(%delegator, delegate = %delegate_to, "Delegation set");
        Ok(())
    }

    /// Drop the caller's outgoing edge.
    pub fn remove_delegation(&self, ctx: &CallContext) -> Result<(), GovernanceError> {
        let delegator = ctx.caller;
        let _guard = self.graph_lock.lock();

        let Some(previous) = self.get_delegation(&delegator)? else {
            return Err(GovernanceError::InvalidDelegate("no delegation to remove".to_string()));
        };

        let mut txn = self.store.begin();
        txn.delete(Column::Delegations, delegator.as_bytes());
        txn.commit()?;

        info!(%delegator, delegate = %previous, "Delegation removed");
        Ok(())
    }

    /// Direct delegate of `member`, if any.
    pub fn get_delegation(&self, member: &Address) -> Result<Option<Address>, GovernanceError> {
        let record: Option<Delegation> = self.store.get(Column::Delegations, member.as_bytes())?;
        Ok(record.map(|d| d.delegate))
    }

    /// Members delegating directly to `member`.
    pub fn get_delegators(&self, member: &Address) -> Result<Vec<Address>, GovernanceError> {
        let edges: Vec<(Vec<u8>, Delegation)> = self.store.scan(Column::Delegations, &[])?;
        let mut delegators = Vec::new();
        for (key, edge) in edges {
            if edge.delegate == *member {
                let delegator = Address::from_slice(&key)
                    .map_err(|e| GovernanceError::InvalidParameter(format!("corrupt delegation key: {}", e)))?;
                delegators.push(delegator);
            }
        }
        Ok(delegators)
    }

    /// Follow delegation edges from `member` to the effective voter.
    ///
    /// Stops at a member with no outgoing edge, on revisiting a member, or
    /// after `max_delegation_hops` hops, returning the member reached.
    pub fn resolve(&self, member: &Address) -> Result<Address, GovernanceError> {
        let mut visited = Vec::with_capacity(4);
        let mut current = *member;

        for _ in 0..self.config.max_delegation_hops {
            visited.push(current);
            match self.get_delegation(&current)? {
                Some(next) if !visited.contains(&next) => current = next,
                _ => break,
            }
        }

        debug!(%member, effective = %current, hops = visited.len().saturating_sub(1), "Resolved delegation");
        Ok(current)
    }
}
