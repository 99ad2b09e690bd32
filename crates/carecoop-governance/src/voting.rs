//! Voting engine.
//!
//! A voting proposal is open for votes from its creation height until its
//! end height (exclusive). Votes are recorded under the effective voter, so
//! a delegator and its delegate share one ballot. Finalization settles the
//! outcome exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use carecoop_core::CallContext;
use carecoop_storage::{codec, Column};
use carecoop_types::{Address, BlockHeight};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::GovernanceConfig;
use crate::delegation::DelegationResolver;
use crate::error::GovernanceError;
use crate::locks::LockTable;
use crate::membership::{MembershipRegistry, RoleId};
use crate::power::{VotingMechanism, VotingPowerCalculator};
use crate::proposal::{validate_fields, ProposalLifecycle, ProposalStatus};
use crate::store::{meta, vote_key, StateStore, StateTxn};

/// Vote direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, BorshSerialize, BorshDeserialize)]
pub enum VoteDirection {
    For,
    Against,
    Abstain,
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoteDirection::For => "for",
            VoteDirection::Against => "against",
            VoteDirection::Abstain => "abstain",
        })
    }
}

impl FromStr for VoteDirection {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "for" | "yes" => Ok(VoteDirection::For),
            "against" | "no" => Ok(VoteDirection::Against),
            "abstain" => Ok(VoteDirection::Abstain),
            _ => Err(GovernanceError::InvalidVote(format!("unknown direction '{}'", s))),
        }
    }
}

/// Who may read individual votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, BorshSerialize, BorshDeserialize)]
pub enum PrivacyLevel {
    #[default]
    Public,
    /// Votes readable only by the voter and the proposal creator
    Private,
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Private => "private",
        })
    }
}

impl FromStr for PrivacyLevel {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(PrivacyLevel::Public),
            "private" => Ok(PrivacyLevel::Private),
            _ => Err(GovernanceError::InvalidParameter(format!("unknown privacy level '{}'", s))),
        }
    }
}

/// Voting proposal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, BorshSerialize, BorshDeserialize)]
pub enum VotingStatus {
    Active,
    Passed,
    Failed,
    /// Never assigned by `finalize`; kept for records that lapse unsettled
    Expired,
}

impl VotingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingStatus::Active => "active",
            VotingStatus::Passed => "passed",
            VotingStatus::Failed => "failed",
            VotingStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for VotingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingStatus {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(VotingStatus::Active),
            "passed" => Ok(VotingStatus::Passed),
            "failed" => Ok(VotingStatus::Failed),
            "expired" => Ok(VotingStatus::Expired),
            _ => Err(GovernanceError::InvalidParameter(format!("unknown voting status '{}'", s))),
        }
    }
}

/// Proposal put to a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize, BorshDeserialize)]
pub struct VotingProposal {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub creator: Address,
    pub mechanism: VotingMechanism,
    pub privacy: PrivacyLevel,
    /// First height at which votes are accepted
    pub start_height: BlockHeight,
    /// First height at which votes are refused and finalization is allowed
    pub end_height: BlockHeight,
    pub quorum_requirement: u64,
    pub status: VotingStatus,
    /// Per-role weights for role-weighted voting
    pub role_weights: BTreeMap<RoleId, u64>,
    pub votes_for: u64,
    pub votes_against: u64,
    pub votes_abstain: u64,
    pub total_voting_power_used: u64,
    /// Lifecycle proposal settled by this vote
    pub lifecycle_id: Option<u64>,
}

impl VotingProposal {
    /// Whether votes are accepted at `height`.
    pub fn is_open(&self, height: BlockHeight) -> bool {
        self.status == VotingStatus::Active && self.start_height <= height && height < self.end_height
    }

    /// Total power counted towards quorum.
    pub fn total_votes(&self) -> u64 {
        self.votes_for
            .saturating_add(self.votes_against)
            .saturating_add(self.votes_abstain)
    }

    fn record(&mut self, direction: VoteDirection, power: u64) {
        let tally = match direction {
            VoteDirection::For => &mut self.votes_for,
            VoteDirection::Against => &mut self.votes_against,
            VoteDirection::Abstain => &mut self.votes_abstain,
        };
        *tally = tally.saturating_add(power);
        self.total_voting_power_used = self.total_voting_power_used.saturating_add(power);
    }
}

/// A ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize, BorshDeserialize)]
pub struct Vote {
    /// Effective voter the ballot is counted for
    pub voter: Address,
    /// Member who submitted it, differs from `voter` under delegation
    pub cast_by: Address,
    pub direction: VoteDirection,
    pub power: u64,
    pub cast_at: BlockHeight,
}

/// Parameters for a new voting proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingProposalParams {
    pub title: String,
    pub description: String,
    pub mechanism: VotingMechanism,
    pub privacy: PrivacyLevel,
    /// Voting period in blocks
    pub duration: u64,
    pub quorum_requirement: u64,
    pub role_weights: BTreeMap<RoleId, u64>,
    pub lifecycle_id: Option<u64>,
}

/// Result of finalizing a voting proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    pub id: u64,
    pub status: VotingStatus,
    pub quorum_met: bool,
    pub total_votes: u64,
    pub quorum_requirement: u64,
    pub votes_for: u64,
    pub votes_against: u64,
    pub votes_abstain: u64,
    /// New status of the linked lifecycle proposal, if one was settled
    pub lifecycle_status: Option<ProposalStatus>,
}

impl FinalizeOutcome {
    /// The quorum shortfall as an error, for callers that report it.
    pub fn quorum_error(&self) -> Option<GovernanceError> {
        (!self.quorum_met).then_some(GovernanceError::QuorumNotMet {
            actual: self.total_votes,
            required: self.quorum_requirement,
        })
    }
}

/// Owns voting proposals and votes.
pub struct VotingEngine {
    store: StateStore,
    config: Arc<GovernanceConfig>,
    registry: Arc<MembershipRegistry>,
    delegation: Arc<DelegationResolver>,
    lifecycle: Arc<ProposalLifecycle>,
    locks: LockTable,
    id_lock: Mutex<()>,
}

impl VotingEngine {
    pub fn new(
        store: StateStore,
        config: Arc<GovernanceConfig>,
        registry: Arc<MembershipRegistry>,
        delegation: Arc<DelegationResolver>,
        lifecycle: Arc<ProposalLifecycle>,
    ) -> Self {
        Self {
            store,
            config,
            registry,
            delegation,
            lifecycle,
            locks: LockTable::new(),
            id_lock: Mutex::new(()),
        }
    }

    fn load(txn: &StateTxn<'_>, id: u64) -> Result<VotingProposal, GovernanceError> {
        txn.get(Column::VotingProposals, &codec::id_key(id))?
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// Open a vote. Voting starts at the current height.
    ///
    /// # Errors
    /// - `NotMember` if the caller is not registered
    /// - `InvalidDuration` for a zero or overflowing duration
    /// - `ProposalNotFound` / `ProposalNotActive` for a bad lifecycle link
    pub fn create_proposal(&self, ctx: &CallContext, params: VotingProposalParams) -> Result<u64, GovernanceError> {
        self.registry.require_member(&ctx.caller)?;
        validate_fields(&params.title, &params.description, None, None)?;

        if params.duration == 0 {
            return Err(GovernanceError::InvalidDuration);
        }
        let end_height = ctx
            .height
            .checked_add(params.duration)
            .ok_or(GovernanceError::InvalidDuration)?;

        if let Some(lifecycle_id) = params.lifecycle_id {
            let linked = self.lifecycle.get(&ctx.caller, lifecycle_id)?;
            if linked.status != ProposalStatus::Active {
                return Err(GovernanceError::ProposalNotActive(lifecycle_id));
            }
        }

        let _guard = self.id_lock.lock();
        let mut txn = self.store.begin();

        let id: u64 = txn.get(Column::Metadata, meta::NEXT_VOTING_ID)?.unwrap_or(1);
        let key = codec::id_key(id);
        if txn.contains(Column::VotingProposals, &key)? {
            return Err(GovernanceError::ProposalAlreadyExists(id));
        }

        let proposal = VotingProposal {
            id,
            title: params.title,
            description: params.description,
            creator: ctx.caller,
            mechanism: params.mechanism,
            privacy: params.privacy,
            start_height: ctx.height,
            end_height,
            quorum_requirement: params.quorum_requirement,
            status: VotingStatus::Active,
            role_weights: params.role_weights,
            votes_for: 0,
            votes_against: 0,
            votes_abstain: 0,
            total_voting_power_used: 0,
            lifecycle_id: params.lifecycle_id,
        };

        txn.put(Column::VotingProposals, &key, &proposal)?;
        txn.put(Column::Metadata, meta::NEXT_VOTING_ID, &(id + 1))?;
        txn.commit()?;

        info!(
            id,
            creator = %ctx.caller,
            mechanism = %proposal.mechanism,
            end = end_height,
            quorum = proposal.quorum_requirement,
            "Voting proposal created"
        );
        Ok(id)
    }

    /// Cast the caller's ballot, counted for its effective voter.
    pub fn cast_vote(&self, ctx: &CallContext, id: u64, direction: VoteDirection) -> Result<Vote, GovernanceError> {
        self.registry.require_member(&ctx.caller)?;

        let lock = self.locks.for_id(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load(&txn, id)?;
        if !proposal.is_open(ctx.height) {
            return Err(GovernanceError::ProposalNotActive(id));
        }

        let voter = self.delegation.resolve(&ctx.caller)?;
        let key = vote_key(id, &voter);
        if txn.contains(Column::Votes, &key)? {
            return Err(GovernanceError::AlreadyVoted);
        }

        let power = VotingPowerCalculator::new(&self.registry).power_of(
            &voter,
            proposal.mechanism,
            &proposal.role_weights,
        )?;
        if power == 0 {
            warn!(id, %voter, mechanism = %proposal.mechanism, "Rejected vote with zero power");
            return Err(GovernanceError::InvalidVotingPower);
        }

        let vote = Vote {
            voter,
            cast_by: ctx.caller,
            direction,
            power,
            cast_at: ctx.height,
        };
        proposal.record(direction, power);

        txn.put(Column::Votes, &key, &vote)?;
        txn.put(Column::VotingProposals, &codec::id_key(id), &proposal)?;
        txn.commit()?;

        info!(id, %voter, cast_by = %ctx.caller, %direction, power, "Vote cast");
        Ok(vote)
    }

    /// Settle a vote whose period has ended.
    ///
    /// Passes only when quorum is met and `for` strictly exceeds `against`.
    /// A linked lifecycle proposal that is still `Active` is marked in the
    /// same commit.
    pub fn finalize(&self, ctx: &CallContext, id: u64) -> Result<FinalizeOutcome, GovernanceError> {
        let lock = self.locks.for_id(id);
        let _guard = lock.lock();
        let mut txn = self.store.begin();

        let mut proposal = Self::load(&txn, id)?;
        if proposal.status != VotingStatus::Active {
            return Err(GovernanceError::ProposalNotActive(id));
        }
        if ctx.height < proposal.end_height {
            return Err(GovernanceError::VotingNotEnded {
                current: ctx.height,
                end: proposal.end_height,
            });
        }

        let total_votes = proposal.total_votes();
        let quorum_met = total_votes >= proposal.quorum_requirement;
        let passed = quorum_met && proposal.votes_for > proposal.votes_against;
        proposal.status = if passed { VotingStatus::Passed } else { VotingStatus::Failed };
        txn.put(Column::VotingProposals, &codec::id_key(id), &proposal)?;

        // Lock order is always voting proposal, then lifecycle proposal.
        let linked_lock = proposal.lifecycle_id.map(|lid| self.lifecycle.lock_for(lid));
        let _linked_guard = linked_lock.as_ref().map(|l| l.lock());

        let mut lifecycle_status = None;
        if let Some(lifecycle_id) = proposal.lifecycle_id {
            if self.lifecycle.stage_outcome(&mut txn, lifecycle_id, passed, ctx.height)? {
                let status = if passed { ProposalStatus::Passed } else { ProposalStatus::Rejected };
                info!(id, lifecycle_id, %status, engine = %self.config.voting_engine, "Settling linked proposal");
                lifecycle_status = Some(status);
            }
        }

        txn.commit()?;

        let outcome = FinalizeOutcome {
            id,
            status: proposal.status,
            quorum_met,
            total_votes,
            quorum_requirement: proposal.quorum_requirement,
            votes_for: proposal.votes_for,
            votes_against: proposal.votes_against,
            votes_abstain: proposal.votes_abstain,
            lifecycle_status,
        };
        if quorum_met {
            info!(id, status = %outcome.status, total_votes, "Voting finalized");
        } else {
            info!(id, total_votes, required = outcome.quorum_requirement, "Voting finalized without quorum");
        }
        Ok(outcome)
    }

    pub fn get_proposal(&self, id: u64) -> Result<VotingProposal, GovernanceError> {
        Self::load(&self.store.begin(), id)
    }

    /// Ballot recorded for `voter` on proposal `id`.
    ///
    /// Ballots on private proposals are visible only to the voter and the
    /// proposal creator.
    pub fn get_vote(&self, caller: &Address, id: u64, voter: &Address) -> Result<Option<Vote>, GovernanceError> {
        let txn = self.store.begin();
        let proposal = Self::load(&txn, id)?;
        if proposal.privacy == PrivacyLevel::Private && caller != voter && *caller != proposal.creator {
            return Err(GovernanceError::NotAuthorized(
                "votes on private proposals are visible to the voter and creator only".to_string(),
            ));
        }
        let vote = txn.get(Column::Votes, &vote_key(id, voter))?;
        debug!(id, %voter, found = vote.is_some(), "Looked up vote");
        Ok(vote)
    }

    /// Whether `member`'s effective voter has a ballot on proposal `id`.
    pub fn has_voted(&self, id: u64, member: &Address) -> Result<bool, GovernanceError> {
        let voter = self.delegation.resolve(member)?;
        Ok(self.store.contains(Column::Votes, &vote_key(id, &voter))?)
    }

    pub fn proposal_count(&self) -> Result<u64, GovernanceError> {
        let next: u64 = self.store.get(Column::Metadata, meta::NEXT_VOTING_ID)?.unwrap_or(1);
        Ok(next - 1)
    }

    /// Ids with `status`, ascending, at most `max_list_results` of them.
    pub fn list_by_status(&self, status: VotingStatus) -> Result<Vec<u64>, GovernanceError> {
        let txn = self.store.begin();
        let count = self.proposal_count()?;
        let mut ids = Vec::new();

        let mut id = 1;
        while id <= count && ids.len() < self.config.max_list_results {
            if let Some(proposal) = txn.get::<VotingProposal>(Column::VotingProposals, &codec::id_key(id))? {
                if proposal.status == status {
                    ids.push(id);
                }
            }
            id += 1;
        }
        Ok(ids)
    }
}
