//! Membership registry: roles and base voting power per member.
//!
//! Every mutation is restricted to the current admin. There is exactly one
//! admin identity at a time; rotating it is itself an admin-only call.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use carecoop_core::CallContext;
use carecoop_storage::Column;
use carecoop_types::{Address, BlockHeight};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bounded::BoundedSet;
use crate::config::{AdminConfig, GovernanceConfig};
use crate::error::GovernanceError;
use crate::store::{meta, StateStore};

/// Role identifier, e.g. `"nurse"` or `"board"`.
pub type RoleId = String;

const MAX_ROLE_LEN: usize = 32;

/// Registered member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize, BorshDeserialize)]
pub struct MemberRecord {
    pub roles: BoundedSet<RoleId>,
    /// Height at registration
    pub joined_at: BlockHeight,
    /// Height of the last role change
    pub updated_at: BlockHeight,
}

/// Registry of members, roles and voting power.
pub struct MembershipRegistry {
    store: StateStore,
    config: Arc<GovernanceConfig>,
    // Serializes every admin-gated mutation, including admin rotation.
    admin_lock: Mutex<()>,
}

impl MembershipRegistry {
    /// Create the registry. Seeds the admin from `admin` if the ledger has none.
    pub fn new(store: StateStore, config: Arc<GovernanceConfig>, admin: AdminConfig) -> Result<Self, GovernanceError> {
        if admin.admin.is_zero() {
            return Err(GovernanceError::InvalidParameter(
                "admin identity cannot be the zero address".to_string(),
            ));
        }
        if !store.contains(Column::Metadata, meta::ADMIN)? {
            let mut txn = store.begin();
            txn.put(Column::Metadata, meta::ADMIN, &admin.admin)?;
            txn.commit()?;
            info!(admin = %admin.admin, "Seeded registry admin");
        }
        Ok(Self {
            store,
            config,
            admin_lock: Mutex::new(()),
        })
    }

    /// Current admin identity.
    pub fn admin(&self) -> Result<Address, GovernanceError> {
        self.store
            .get(Column::Metadata, meta::ADMIN)?
            .ok_or_else(|| GovernanceError::InvalidParameter("registry admin is not set".to_string()))
    }

    pub fn is_admin(&self, who: &Address) -> Result<bool, GovernanceError> {
        Ok(self.admin()? == *who)
    }

    fn require_admin(&self, ctx: &CallContext, action: &str) -> Result<(), GovernanceError> {
        if !self.is_admin(&ctx.caller)? {
            warn!(caller = %ctx.caller, action, "Rejected non-admin registry call");
            return Err(GovernanceError::NotAuthorized(format!("only the admin can {}", action)));
        }
        Ok(())
    }

    fn validate_roles(&self, roles: Vec<RoleId>) -> Result<BoundedSet<RoleId>, GovernanceError> {
        if let Some(bad) = roles.iter().find(|r| r.is_empty() || r.len() > MAX_ROLE_LEN) {
            return Err(GovernanceError::InvalidParameter(format!(
                "role '{}' must be 1..={} characters",
                bad, MAX_ROLE_LEN
            )));
        }
        BoundedSet::try_from_iter(roles, self.config.max_member_roles, "member roles")
    }

    /// Register a new member with roles and base voting power.
    pub fn register_member(
        &self,
        ctx: &CallContext,
        member: Address,
        roles: Vec<RoleId>,
        voting_power: u64,
    ) -> Result<(), GovernanceError> {
        let _guard = self.admin_lock.lock();
        self.require_admin(ctx, "register members")?;

        if member.is_zero() {
            return Err(GovernanceError::InvalidParameter("member cannot be the zero address".to_string()));
        }
        let key = member.as_bytes();
        if self.store.contains(Column::Members, key)? {
            return Err(GovernanceError::AlreadyMember(member));
        }

        let record = MemberRecord {
            roles: self.validate_roles(roles)?,
            joined_at: ctx.height,
            updated_at: ctx.height,
        };

        let mut txn = self.store.begin();
        txn.put(Column::Members, key, &record)?;
        txn.put(Column::VotingPower, key, &voting_power)?;
        txn.commit()?;

        info!(%member, roles = record.roles.len(), voting_power, "Registered member");
        Ok(())
    }

    /// Replace a member's roles.
    pub fn update_roles(&self, ctx: &CallContext, member: Address, roles: Vec<RoleId>) -> Result<(), GovernanceError> {
        let _guard = self.admin_lock.lock();
        self.require_admin(ctx, "update roles")?;

        let key = member.as_bytes();
        let mut record: MemberRecord = self
            .store
            .get(Column::Members, key)?
            .ok_or(GovernanceError::NotMember(member))?;
        record.roles = self.validate_roles(roles)?;
        record.updated_at = ctx.height;

        let mut txn = self.store.begin();
        txn.put(Column::Members, key, &record)?;
        txn.commit()?;

        info!(%member, roles = ?record.roles.as_slice(), "Updated member roles");
        Ok(())
    }

    /// Set a member's base voting power (used by quadratic voting).
    pub fn update_voting_power(&self, ctx: &CallContext, member: Address, power: u64) -> Result<(), GovernanceError> {
        let _guard = self.admin_lock.lock();
        self.require_admin(ctx, "update voting power")?;

        let key = member.as_bytes();
        if !self.store.contains(Column::Members, key)? {
            return Err(GovernanceError::NotMember(member));
        }

        let mut txn = self.store.begin();
        txn.put(Column::VotingPower, key, &power)?;
        txn.commit()?;

        info!(%member, power, "Updated voting power");
        Ok(())
    }

    /// Hand the admin role to `new_admin`.
    pub fn transfer_admin(&self, ctx: &CallContext, new_admin: Address) -> Result<(), GovernanceError> {
        let _guard = self.admin_lock.lock();
        self.require_admin(ctx, "transfer admin")?;

        if new_admin.is_zero() {
            return Err(GovernanceError::InvalidParameter("admin cannot be the zero address".to_string()));
        }

        let mut txn = self.store.begin();
        txn.put(Column::Metadata, meta::ADMIN, &new_admin)?;
        txn.commit()?;

        info!(from = %ctx.caller, to = %new_admin, "Transferred registry admin");
        Ok(())
    }

    pub fn is_member(&self, who: &Address) -> Result<bool, GovernanceError> {
        Ok(self.store.contains(Column::Members, who.as_bytes())?)
    }

    pub fn get_member(&self, who: &Address) -> Result<Option<MemberRecord>, GovernanceError> {
        Ok(self.store.get(Column::Members, who.as_bytes())?)
    }

    /// Roles held by `who`; empty for non-members.
    pub fn get_member_roles(&self, who: &Address) -> Result<Vec<RoleId>, GovernanceError> {
        let roles = self
            .get_member(who)?
            .map(|m| m.roles.as_slice().to_vec())
            .unwrap_or_default();
        debug!(member = %who, ?roles, "Looked up member roles");
        Ok(roles)
    }

    /// Base voting power of `who`; zero when unset.
    pub fn get_voting_power(&self, who: &Address) -> Result<u64, GovernanceError> {
        Ok(self.store.get(Column::VotingPower, who.as_bytes())?.unwrap_or(0))
    }

    pub(crate) fn require_member(&self, who: &Address) -> Result<(), GovernanceError> {
        if !self.is_member(who)? {
            return Err(GovernanceError::NotMember(*who));
        }
        Ok(())
    }
}
