//! Proposal lifecycle management.
//!
//! Proposals go through states: Draft -> Pending -> Active -> Passed/Rejected -> Executed.
//! A proposal enters `Active` only by collecting enough sponsors; the outcome
//! of an active proposal is decided by the voting engine.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use carecoop_core::{BalanceOracle, CallContext};
use carecoop_storage::{codec, Column};
use carecoop_types::{Address, BlockHeight};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bounded::BoundedSet;
use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::locks::LockTable;
use crate::store::{meta, StateStore, StateTxn};

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_LINK_LEN: usize = 512;
pub const MAX_EXECUTION_PARAMS_LEN: usize = 4096;

/// Proposal status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, BorshSerialize, BorshDeserialize)]
pub enum ProposalStatus {
    /// Created, editable by the proposer
    Draft,
    /// Submitted, collecting sponsors
    Pending,
    /// Fully sponsored, under vote
    Active,
    Passed,
    Rejected,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 7] = [
        ProposalStatus::Draft,
        ProposalStatus::Pending,
        ProposalStatus::Active,
        ProposalStatus::Passed,
        ProposalStatus::Rejected,
        ProposalStatus::Executed,
        ProposalStatus::Cancelled,
    ];

    /// Whether the lifecycle graph has an edge from `self` to `to`.
    pub fn can_transition_to(&self, to: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, to),
            (Draft, Pending)
                | (Pending, Active)
                | (Active, Passed)
                | (Active, Rejected)
                | (Passed, Executed)
                | (Draft | Pending | Active | Passed | Rejected, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Executed | ProposalStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Pending => "pending",
            ProposalStatus::Active => "active",
            ProposalStatus::Passed => "passed",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| GovernanceError::InvalidParameter(format!("unknown proposal status '{}'", s)))
    }
}

/// Area of the cooperative a proposal concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, BorshSerialize, BorshDeserialize)]
pub enum ProposalCategory {
    FacilityImprovement,
    CareProtocol,
    PractitionerHiring,
    BudgetAllocation,
    EquipmentPurchase,
    PolicyChange,
    Other,
}

impl ProposalCategory {
    pub const ALL: [ProposalCategory; 7] = [
        ProposalCategory::FacilityImprovement,
        ProposalCategory::CareProtocol,
        ProposalCategory::PractitionerHiring,
        ProposalCategory::BudgetAllocation,
        ProposalCategory::EquipmentPurchase,
        ProposalCategory::PolicyChange,
        ProposalCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalCategory::FacilityImprovement => "facility-improvement",
            ProposalCategory::CareProtocol => "care-protocol",
            ProposalCategory::PractitionerHiring => "practitioner-hiring",
            ProposalCategory::BudgetAllocation => "budget-allocation",
            ProposalCategory::EquipmentPurchase => "equipment-purchase",
            ProposalCategory::PolicyChange => "policy-change",
            ProposalCategory::Other => "other",
        }
    }

    /// Numeric wire code.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, GovernanceError> {
        ProposalCategory::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| GovernanceError::InvalidCategory(code.to_string()))
    }
}

impl fmt::Display for ProposalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalCategory {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('_', "-");
        ProposalCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| GovernanceError::InvalidCategory(s.to_string()))
    }
}

/// Lifecycle proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize, BorshDeserialize)]
pub struct Proposal {
    /// Unique proposal ID
    pub id: u64,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub category: ProposalCategory,
    /// Proposer address
    pub proposer: Address,
    /// Height at creation
    pub created_at: BlockHeight,
    pub status: ProposalStatus,
    /// Sponsors in order of sponsorship; the proposer is always first
    pub sponsors: BoundedSet<Address>,
    pub contains_sensitive_info: bool,
    pub execution_params: Option<String>,
    /// Height of the last mutation
    pub last_updated: BlockHeight,
}

impl Proposal {
    fn touch(&mut self, height: BlockHeight) {
        self.last_updated = self.last_updated.max(height);
    }

    fn transition(&mut self, to: ProposalStatus, height: BlockHeight) -> Result<(), GovernanceError> {
        if !self.status.can_transition_to(to) {
            return Err(GovernanceError::InvalidStateTransition { from: self.status, to });
        }
        self.status = to;
        self.touch(height);
        Ok(())
    }

    pub fn is_sponsor(&self, who: &Address) -> bool {
        self.sponsors.contains(who)
    }

    /// Copy with sensitive content replaced.
    pub fn redacted(&self, placeholder: &str) -> Self {
        Self {
            description: placeholder.to_string(),
            execution_params: None,
            ..self.clone()
        }
    }
}

/// Fields supplied when creating a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDraft {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub category: ProposalCategory,
    pub contains_sensitive_info: bool,
    pub execution_params: Option<String>,
}

/// Changes applied to a draft. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub category: Option<ProposalCategory>,
    pub execution_params: Option<String>,
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), GovernanceError> {
    if value.len() > max {
        return Err(GovernanceError::InvalidParameter(format!(
            "{} is {} bytes, limit is {}",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}

pub(crate) fn validate_fields(
    title: &str,
    description: &str,
    link: Option<&str>,
    execution_params: Option<&str>,
) -> Result<(), GovernanceError> {
    if title.trim().is_empty() {
        return Err(GovernanceError::InvalidParameter("title cannot be empty".to_string()));
    }
    check_len("title", title, MAX_TITLE_LEN)?;
    check_len("description", description, MAX_DESCRIPTION_LEN)?;
    if let Some(link) = link {
        check_len("link", link, MAX_LINK_LEN)?;
    }
    if let Some(params) = execution_params {
        check_len("execution params", params, MAX_EXECUTION_PARAMS_LEN)?;
    }
    Ok(())
}

/// Owns lifecycle proposals and their authorized viewers.
pub struct ProposalLifecycle {
    store: StateStore,
    config: Arc<GovernanceConfig>,
    balances: Arc<dyn BalanceOracle>,
    locks: LockTable,
    id_lock: Mutex<()>,
}

impl ProposalLifecycle {
    pub fn new(store: StateStore, config: Arc<GovernanceConfig>, balances: Arc<dyn BalanceOracle>) -> Self {
        Self {
            store,
            config,
            balances,
            locks: LockTable::new(),
            id_lock: Mutex::new(()),
        }
    }

    pub(crate) fn lock_for(&self, id: u64) -> Arc<Mutex<()>> {
        self.locks.for_id(id)
    }

    fn require_balance(&self, who: &Address, threshold: u64) -> Result<(), GovernanceError> {
        let balance = self.balances.balance_of(who);
        let required = u128::from(threshold);
        if balance < required {
            return Err(GovernanceError::InsufficientThreshold { balance, required });
        }
        Ok(())
    }

    fn load(txn: &StateTxn<'_>, id: u64) -> Result<Proposal, GovernanceError> {
        txn.get(Column::Proposals, &codec::id_key(id))?
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn load_owned(txn: &StateTxn<'_>, ctx: &CallContext, id: u64, action: &str) -> Result<Proposal, GovernanceError> {
        let proposal = Self::load(txn, id)?;
        if proposal.proposer != ctx.caller {
            warn!(id, caller = %ctx.caller, action, "Rejected call from non-proposer");
            return Err(GovernanceError::NotAuthorized(format!("only the proposer can {}", action)));
        }
        Ok(proposal)
    }

    fn save(txn: &mut StateTxn<'_>, proposal: &Proposal) -> Result<(), GovernanceError> {
        txn.put(Column::Proposals, &codec::id_key(proposal.id), proposal)?;
        Ok(())
    }

    fn viewers(txn: &StateTxn<'_>, id: u64) -> Result<BoundedSet<Address>, GovernanceError> {
        Ok(txn.get(Column::Viewers, &codec::id_key(id))?.unwrap_or_default())
    }

    /// Create a draft proposal owned by the caller.
    ///
    /// # Errors
    /// - `InsufficientThreshold` if the caller holds less than the submission threshold
    /// - `InvalidParameter` for empty or oversized fields
    /// - `ProposalAlreadyExists` if the allocated id is already taken
    pub fn create(&self, ctx: &CallContext, draft: ProposalDraft) -> Result<u64, GovernanceError> {
        self.require_balance(&ctx.caller, self.config.submission_threshold)?;
        validate_fields(
            &draft.title,
            &draft.description,
            draft.link.as_deref(),
            draft.execution_params.as_deref(),
        )?;

        let _guard = self.id_lock.lock();
        let mut txn = self.store.begin();

        let id: u64 = txn.get(Column::Metadata, meta::NEXT_PROPOSAL_ID)?.unwrap_or(1);
        let key = codec::id_key(id);
        if txn.contains(Column::Proposals, &key)? {
            return Err(GovernanceError::ProposalAlreadyExists(id));
        }

        let proposal = Proposal {
            id,
            title: draft.title,
            description: draft.description,
            link: draft.link,
            category: draft.category,
            proposer: ctx.caller,
            created_at: ctx.height,
            status: ProposalStatus::Draft,
            sponsors: BoundedSet::try_from_iter([ctx.caller], self.config.max_sponsors, "sponsors")?,
            contains_sensitive_info: draft.contains_sensitive_info,
            execution_params: draft.execution_params,
            last_updated: ctx.height,
        };

        Self::save(&mut txn, &proposal)?;
        if proposal.contains_sensitive_info {
            let viewers =
                BoundedSet::try_from_iter([ctx.caller], self.config.max_authorized_viewers, "authorized viewers")?;
            txn.put(Column::Viewers, &key, &viewers)?;
        }
        txn.put(Column::Metadata, meta::NEXT_PROPOSAL_ID, &(id + 1))?;
        txn.commit()?;

        info!(
            id,
            proposer = %ctx.caller,
            category = %proposal.category,
            sensitive = proposal.contains_sensitive_info,
            "Proposal created"
        );
        Ok(id)
    }

    /// Move a draft to `Pending` so it can collect sponsors.
    pub fn submit(&self, ctx: &CallContext, id: u64) -> Result<(), GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load_owned(&txn, ctx, id, "submit")?;
        proposal.transition(ProposalStatus::Pending, ctx.height)?;
        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, "Proposal submitted");
        Ok(())
    }

    /// Add the caller as a sponsor. Returns the status after sponsoring.
    ///
    /// Reaching the activation sponsor count moves a pending proposal to
    /// `Active`. Further sponsors are accepted up to the sponsor cap without
    /// another transition.
    pub fn sponsor(&self, ctx: &CallContext, id: u64) -> Result<ProposalStatus, GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load(&txn, id)?;
        if !matches!(proposal.status, ProposalStatus::Pending | ProposalStatus::Active) {
            return Err(GovernanceError::ProposalNotActive(id));
        }
        if proposal.is_sponsor(&ctx.caller) {
            return Err(GovernanceError::AlreadySponsored);
        }
        self.require_balance(&ctx.caller, self.config.sponsorship_threshold)?;

        proposal
            .sponsors
            .try_insert(ctx.caller, self.config.max_sponsors, "sponsors")?;
        proposal.touch(ctx.height);

        if proposal.status == ProposalStatus::Pending
            && proposal.sponsors.len() >= self.config.activation_sponsor_count
        {
            proposal.transition(ProposalStatus::Active, ctx.height)?;
            info!(id, sponsors = proposal.sponsors.len(), "Proposal activated");
        }

        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, sponsor = %ctx.caller, count = proposal.sponsors.len(), "Proposal sponsored");
        Ok(proposal.status)
    }

    /// Edit a draft. The sensitivity flag is fixed at creation.
    pub fn update(&self, ctx: &CallContext, id: u64, update: ProposalUpdate) -> Result<(), GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load_owned(&txn, ctx, id, "update")?;
        if proposal.status != ProposalStatus::Draft {
            return Err(GovernanceError::InvalidStateTransition {
                from: proposal.status,
                to: ProposalStatus::Draft,
            });
        }

        if let Some(title) = update.title {
            proposal.title = title;
        }
        if let Some(description) = update.description {
            proposal.description = description;
        }
        if let Some(link) = update.link {
            proposal.link = Some(link);
        }
        if let Some(category) = update.category {
            proposal.category = category;
        }
        if let Some(params) = update.execution_params {
            proposal.execution_params = Some(params);
        }
        validate_fields(
            &proposal.title,
            &proposal.description,
            proposal.link.as_deref(),
            proposal.execution_params.as_deref(),
        )?;
        proposal.touch(ctx.height);

        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, "Proposal updated");
        Ok(())
    }

    /// Cancel a proposal that has not been executed.
    pub fn cancel(&self, ctx: &CallContext, id: u64) -> Result<(), GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load_owned(&txn, ctx, id, "cancel")?;
        let from = proposal.status;
        proposal.transition(ProposalStatus::Cancelled, ctx.height)?;
        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, %from, "Proposal cancelled");
        Ok(())
    }

    /// Execute a passed proposal.
    pub fn execute(&self, ctx: &CallContext, id: u64) -> Result<(), GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load_owned(&txn, ctx, id, "execute")?;
        proposal.transition(ProposalStatus::Executed, ctx.height)?;
        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, "Proposal executed");
        Ok(())
    }

    pub fn mark_passed(&self, ctx: &CallContext, id: u64) -> Result<(), GovernanceError> {
        self.mark(ctx, id, ProposalStatus::Passed)
    }

    pub fn mark_rejected(&self, ctx: &CallContext, id: u64) -> Result<(), GovernanceError> {
        self.mark(ctx, id, ProposalStatus::Rejected)
    }

    fn mark(&self, ctx: &CallContext, id: u64, to: ProposalStatus) -> Result<(), GovernanceError> {
        if ctx.caller != self.config.voting_engine {
            warn!(id, caller = %ctx.caller, %to, "Rejected outcome from non-engine caller");
            return Err(GovernanceError::NotAuthorized(
                "only the voting engine can settle proposals".to_string(),
            ));
        }

        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load(&txn, id)?;
        proposal.transition(to, ctx.height)?;
        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, status = %to, "Proposal settled");
        Ok(())
    }

    /// Stage the voting outcome of a linked proposal into `txn`.
    ///
    /// The caller must hold the proposal's lock. Returns `false` without
    /// staging anything when the proposal is no longer `Active`.
    pub(crate) fn stage_outcome(
        &self,
        txn: &mut StateTxn<'_>,
        id: u64,
        passed: bool,
        height: BlockHeight,
    ) -> Result<bool, GovernanceError> {
        let mut proposal = Self::load(txn, id)?;
        if proposal.status != ProposalStatus::Active {
            warn!(id, status = %proposal.status, "Linked proposal is no longer active, outcome not applied");
            return Ok(false);
        }
        let to = if passed { ProposalStatus::Passed } else { ProposalStatus::Rejected };
        proposal.transition(to, height)?;
        Self::save(txn, &proposal)?;
        debug!(id, status = %to, "Staged linked outcome");
        Ok(true)
    }

    /// Grant `viewer` access to a sensitive proposal.
    pub fn authorize_viewer(&self, ctx: &CallContext, id: u64, viewer: Address) -> Result<(), GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load_owned(&txn, ctx, id, "authorize viewers")?;
        if !proposal.contains_sensitive_info {
            return Err(GovernanceError::ProposalNotSensitive(id));
        }
        let mut viewers = Self::viewers(&txn, id)?;
        if !viewers.try_insert(viewer, self.config.max_authorized_viewers, "authorized viewers")? {
            return Err(GovernanceError::AlreadyAuthorized(viewer));
        }
        proposal.touch(ctx.height);

        txn.put(Column::Viewers, &codec::id_key(id), &viewers)?;
        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, %viewer, "Viewer authorized");
        Ok(())
    }

    /// Withdraw `viewer`'s access to a sensitive proposal.
    pub fn revoke_authorization(&self, ctx: &CallContext, id: u64, viewer: Address) -> Result<(), GovernanceError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load_owned(&txn, ctx, id, "revoke viewers")?;
        if !proposal.contains_sensitive_info {
            return Err(GovernanceError::ProposalNotSensitive(id));
        }
        let mut viewers = Self::viewers(&txn, id)?;
        if !viewers.remove(&viewer) {
            return Err(GovernanceError::ViewerNotAuthorized(viewer));
        }
        proposal.touch(ctx.height);

        txn.put(Column::Viewers, &codec::id_key(id), &viewers)?;
        Self::save(&mut txn, &proposal)?;
        txn.commit()?;

        info!(id, %viewer, "Viewer authorization revoked");
        Ok(())
    }

    /// Fetch a proposal as `caller` is allowed to see it.
    ///
    /// Unauthorized readers of a sensitive proposal get a redacted copy
    /// instead of an error.
    pub fn get(&self, caller: &Address, id: u64) -> Result<Proposal, GovernanceError> {
        let txn = self.store.begin();
        let proposal = Self::load(&txn, id)?;
        if self.can_see(&txn, &proposal, caller)? {
            return Ok(proposal);
        }
        debug!(id, %caller, "Serving redacted proposal");
        Ok(proposal.redacted(&self.config.redaction_placeholder))
    }

    fn can_see(&self, txn: &StateTxn<'_>, proposal: &Proposal, viewer: &Address) -> Result<bool, GovernanceError> {
        if !proposal.contains_sensitive_info || proposal.proposer == *viewer {
            return Ok(true);
        }
        Ok(Self::viewers(txn, proposal.id)?.contains(viewer))
    }

    /// Whether `viewer` may see the full content of proposal `id`.
    pub fn check_sensitive_access(&self, id: u64, viewer: &Address) -> Result<bool, GovernanceError> {
        let txn = self.store.begin();
        let proposal = Self::load(&txn, id)?;
        self.can_see(&txn, &proposal, viewer)
    }

    /// Authorized viewers of a sensitive proposal. Only visible to those with access.
    pub fn get_authorized_viewers(&self, caller: &Address, id: u64) -> Result<Vec<Address>, GovernanceError> {
        let txn = self.store.begin();
        let proposal = Self::load(&txn, id)?;
        if !proposal.contains_sensitive_info {
            return Err(GovernanceError::ProposalNotSensitive(id));
        }
        if !self.can_see(&txn, &proposal, caller)? {
            return Err(GovernanceError::SensitiveInfoAccessDenied);
        }
        Ok(Self::viewers(&txn, id)?.as_slice().to_vec())
    }

    /// Number of proposals created so far.
    pub fn proposal_count(&self) -> Result<u64, GovernanceError> {
        let next: u64 = self.store.get(Column::Metadata, meta::NEXT_PROPOSAL_ID)?.unwrap_or(1);
        Ok(next - 1)
    }

    pub fn list_by_status(&self, status: ProposalStatus) -> Result<Vec<u64>, GovernanceError> {
        self.list_where(|p| p.status == status)
    }

    pub fn list_by_category(&self, category: ProposalCategory) -> Result<Vec<u64>, GovernanceError> {
        self.list_where(|p| p.category == category)
    }

    /// Proposals `member` proposed or sponsored.
    pub fn list_for_member(&self, member: &Address) -> Result<Vec<u64>, GovernanceError> {
        self.list_where(|p| p.is_sponsor(member))
    }

    /// Ids of matching proposals, ascending, at most `max_list_results` of them.
    fn list_where<F>(&self, filter: F) -> Result<Vec<u64>, GovernanceError>
    where
        F: Fn(&Proposal) -> bool,
    {
        let txn = self.store.begin();
        let count = self.proposal_count()?;
        let mut ids = Vec::new();

        let mut id = 1;
        while id <= count && ids.len() < self.config.max_list_results {
            if let Some(proposal) = txn.get::<Proposal>(Column::Proposals, &codec::id_key(id))? {
                if filter(&proposal) {
                    ids.push(id);
                }
            }
            id += 1;
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carecoop_core::TokenBalances;
    use carecoop_storage::MemoryLedger;

    fn addr(name: &str) -> Address {
        Address::from_label(name)
    }

    fn at(name: &str, height: BlockHeight) -> CallContext {
        CallContext::new(addr(name), height)
    }

    fn lifecycle() -> ProposalLifecycle {
        let balances = TokenBalances::new();
        balances.set_balance(addr("alice"), 1_000);
        balances.set_balance(addr("poor"), 99);
        for i in 0..12 {
            balances.set_balance(addr(&format!("s{}", i)), 500);
        }
        balances.set_balance(addr("small"), 499);
        ProposalLifecycle::new(
            StateStore::new(Arc::new(MemoryLedger::new())),
            Arc::new(GovernanceConfig::default()),
            Arc::new(balances),
        )
    }

    fn draft(sensitive: bool) -> ProposalDraft {
        ProposalDraft {
            title: "New infusion pumps".to_string(),
            description: "Replace the ward's pumps".to_string(),
            link: None,
            category: ProposalCategory::EquipmentPurchase,
            contains_sensitive_info: sensitive,
            execution_params: Some("budget=12000".to_string()),
        }
    }

    fn pending(lifecycle: &ProposalLifecycle) -> u64 {
        let id = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        lifecycle.submit(&at("alice", 2), id).unwrap();
        id
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let lifecycle = lifecycle();
        let first = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        let second = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        assert_eq!((first, second), (1, 2));

        let proposal = lifecycle.get(&addr("alice"), first).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Draft);
        assert_eq!(proposal.sponsors.as_slice(), &[addr("alice")]);
        assert_eq!(lifecycle.proposal_count().unwrap(), 2);
    }

    #[test]
    fn test_create_requires_submission_threshold() {
        let lifecycle = lifecycle();
        assert_eq!(
            lifecycle.create(&at("poor", 1), draft(false)),
            Err(GovernanceError::InsufficientThreshold { balance: 99, required: 100 })
        );
        assert_eq!(lifecycle.proposal_count().unwrap(), 0);
    }

    #[test]
    fn test_create_validates_fields() {
        let lifecycle = lifecycle();
        let mut bad = draft(false);
        bad.title = "  ".to_string();
        assert!(matches!(
            lifecycle.create(&at("alice", 1), bad),
            Err(GovernanceError::InvalidParameter(_))
        ));

        let mut long = draft(false);
        long.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(lifecycle.create(&at("alice", 1), long).is_err());
    }

    #[test]
    fn test_submit_is_proposer_only_and_draft_only() {
        let lifecycle = lifecycle();
        let id = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        assert!(matches!(
            lifecycle.submit(&at("s0", 2), id),
            Err(GovernanceError::NotAuthorized(_))
        ));
        lifecycle.submit(&at("alice", 2), id).unwrap();
        assert_eq!(
            lifecycle.submit(&at("alice", 3), id),
            Err(GovernanceError::InvalidStateTransition {
                from: ProposalStatus::Pending,
                to: ProposalStatus::Pending,
            })
        );
    }

    #[test]
    fn test_fifth_sponsor_activates() {
        let lifecycle = lifecycle();
        let id = pending(&lifecycle);

        for i in 0..3 {
            assert_eq!(lifecycle.sponsor(&at(&format!("s{}", i), 3), id).unwrap(), ProposalStatus::Pending);
        }
        assert_eq!(lifecycle.sponsor(&at("s3", 4), id).unwrap(), ProposalStatus::Active);

        // A sixth sponsor is recorded without another transition
        assert_eq!(lifecycle.sponsor(&at("s4", 5), id).unwrap(), ProposalStatus::Active);
        let proposal = lifecycle.get(&addr("alice"), id).unwrap();
        assert_eq!(proposal.sponsors.len(), 6);
        assert_eq!(proposal.last_updated, 5);
    }

    #[test]
    fn test_sponsor_checks() {
        let lifecycle = lifecycle();
        let draft_id = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        assert_eq!(
            lifecycle.sponsor(&at("s0", 2), draft_id),
            Err(GovernanceError::ProposalNotActive(draft_id))
        );

        let id = pending(&lifecycle);
        assert_eq!(lifecycle.sponsor(&at("alice", 3), id), Err(GovernanceError::AlreadySponsored));
        lifecycle.sponsor(&at("s0", 3), id).unwrap();
        assert_eq!(lifecycle.sponsor(&at("s0", 4), id), Err(GovernanceError::AlreadySponsored));
        assert_eq!(
            lifecycle.sponsor(&at("small", 4), id),
            Err(GovernanceError::InsufficientThreshold { balance: 499, required: 500 })
        );
        assert_eq!(lifecycle.sponsor(&at("missing", 4), 99), Err(GovernanceError::ProposalNotFound(99)));
    }

    #[test]
    fn test_sponsor_cap() {
        let lifecycle = lifecycle();
        let id = pending(&lifecycle);
        for i in 0..9 {
            lifecycle.sponsor(&at(&format!("s{}", i), 3), id).unwrap();
        }
        assert_eq!(
            lifecycle.sponsor(&at("s9", 3), id),
            Err(GovernanceError::CapacityExceeded { what: "sponsors", cap: 10 })
        );
    }

    #[test]
    fn test_update_only_in_draft() {
        let lifecycle = lifecycle();
        let id = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        let update = ProposalUpdate {
            title: Some("Pumps, revised".to_string()),
            category: Some(ProposalCategory::BudgetAllocation),
            ..Default::default()
        };
        lifecycle.update(&at("alice", 2), id, update.clone()).unwrap();

        let proposal = lifecycle.get(&addr("alice"), id).unwrap();
        assert_eq!(proposal.title, "Pumps, revised");
        assert_eq!(proposal.category, ProposalCategory::BudgetAllocation);
        assert_eq!(proposal.last_updated, 2);

        lifecycle.submit(&at("alice", 3), id).unwrap();
        assert!(matches!(
            lifecycle.update(&at("alice", 4), id, update),
            Err(GovernanceError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_and_execute() {
        let lifecycle = lifecycle();
        let id = pending(&lifecycle);
        assert!(matches!(
            lifecycle.cancel(&at("s0", 3), id),
            Err(GovernanceError::NotAuthorized(_))
        ));
        assert_eq!(
            lifecycle.execute(&at("alice", 3), id),
            Err(GovernanceError::InvalidStateTransition {
                from: ProposalStatus::Pending,
                to: ProposalStatus::Executed,
            })
        );
        lifecycle.cancel(&at("alice", 3), id).unwrap();
        assert!(lifecycle.cancel(&at("alice", 4), id).is_err());
    }

    #[test]
    fn test_mark_requires_engine_identity() {
        let lifecycle = lifecycle();
        let id = pending(&lifecycle);
        for i in 0..4 {
            lifecycle.sponsor(&at(&format!("s{}", i), 3), id).unwrap();
        }

        assert!(matches!(
            lifecycle.mark_passed(&at("alice", 10), id),
            Err(GovernanceError::NotAuthorized(_))
        ));

        let engine = CallContext::new(Address::system(1), 10);
        lifecycle.mark_passed(&engine, id).unwrap();
        assert_eq!(
            lifecycle.mark_rejected(&engine, id),
            Err(GovernanceError::InvalidStateTransition {
                from: ProposalStatus::Passed,
                to: ProposalStatus::Rejected,
            })
        );

        lifecycle.execute(&at("alice", 11), id).unwrap();
        assert!(lifecycle.cancel(&at("alice", 12), id).is_err());
    }

    #[test]
    fn test_redaction() {
        let lifecycle = lifecycle();
        let id = lifecycle.create(&at("alice", 1), draft(true)).unwrap();

        let outsider = lifecycle.get(&addr("bob"), id).unwrap();
        assert_eq!(outsider.description, REDACTED);
        assert_eq!(outsider.execution_params, None);
        assert_eq!(outsider.title, "New infusion pumps");

        lifecycle.authorize_viewer(&at("alice", 2), id, addr("bob")).unwrap();
        let bob = lifecycle.get(&addr("bob"), id).unwrap();
        assert_eq!(bob.description, "Replace the ward's pumps");
        assert_eq!(bob.execution_params.as_deref(), Some("budget=12000"));

        lifecycle.revoke_authorization(&at("alice", 3), id, addr("bob")).unwrap();
        assert!(!lifecycle.check_sensitive_access(id, &addr("bob")).unwrap());
        assert!(lifecycle.check_sensitive_access(id, &addr("alice")).unwrap());
    }

    const REDACTED: &str = crate::config::REDACTED_DESCRIPTION;

    #[test]
    fn test_viewer_management_errors() {
        let lifecycle = lifecycle();
        let public = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        assert_eq!(
            lifecycle.authorize_viewer(&at("alice", 2), public, addr("bob")),
            Err(GovernanceError::ProposalNotSensitive(public))
        );
        assert!(lifecycle.check_sensitive_access(public, &addr("bob")).unwrap());

        let id = lifecycle.create(&at("alice", 1), draft(true)).unwrap();
        assert!(matches!(
            lifecycle.authorize_viewer(&at("bob", 2), id, addr("bob")),
            Err(GovernanceError::NotAuthorized(_))
        ));
        lifecycle.authorize_viewer(&at("alice", 2), id, addr("bob")).unwrap();
        assert_eq!(
            lifecycle.authorize_viewer(&at("alice", 3), id, addr("bob")),
            Err(GovernanceError::AlreadyAuthorized(addr("bob")))
        );
        assert_eq!(
            lifecycle.revoke_authorization(&at("alice", 3), id, addr("carol")),
            Err(GovernanceError::ViewerNotAuthorized(addr("carol")))
        );

        assert_eq!(
            lifecycle.get_authorized_viewers(&addr("carol"), id),
            Err(GovernanceError::SensitiveInfoAccessDenied)
        );
        assert_eq!(
            lifecycle.get_authorized_viewers(&addr("bob"), id).unwrap(),
            vec![addr("alice"), addr("bob")]
        );
    }

    #[test]
    fn test_listing() {
        let lifecycle = lifecycle();
        let a = lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        let b = pending(&lifecycle);
        lifecycle.sponsor(&at("s0", 3), b).unwrap();

        assert_eq!(lifecycle.list_by_status(ProposalStatus::Draft).unwrap(), vec![a]);
        assert_eq!(lifecycle.list_by_status(ProposalStatus::Pending).unwrap(), vec![b]);
        assert_eq!(
            lifecycle.list_by_category(ProposalCategory::EquipmentPurchase).unwrap(),
            vec![a, b]
        );
        assert!(lifecycle.list_by_category(ProposalCategory::Other).unwrap().is_empty());
        assert_eq!(lifecycle.list_for_member(&addr("s0")).unwrap(), vec![b]);
        assert_eq!(lifecycle.list_for_member(&addr("alice")).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_listing_is_capped() {
        let lifecycle = lifecycle();
        for _ in 0..55 {
            lifecycle.create(&at("alice", 1), draft(false)).unwrap();
        }
        let ids = lifecycle.list_by_status(ProposalStatus::Draft).unwrap();
        assert_eq!(ids.len(), 49);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&49));
    }

    #[test]
    fn test_transition_graph() {
        use ProposalStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(!Draft.can_transition_to(Active));
        assert!(!Pending.can_transition_to(Draft));
        assert!(Rejected.can_transition_to(Cancelled));
        assert!(!Executed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Draft));
        for status in ProposalStatus::ALL {
            assert!(!status.can_transition_to(Draft));
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("care-protocol".parse::<ProposalCategory>().unwrap(), ProposalCategory::CareProtocol);
        assert_eq!("POLICY_CHANGE".parse::<ProposalCategory>().unwrap(), ProposalCategory::PolicyChange);
        assert_eq!(
            "snacks".parse::<ProposalCategory>(),
            Err(GovernanceError::InvalidCategory("snacks".to_string()))
        );
        assert_eq!(ProposalCategory::from_code(6).unwrap(), ProposalCategory::Other);
        assert!(ProposalCategory::from_code(7).is_err());
    }
}
